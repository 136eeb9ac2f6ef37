//! Process-wide tracing. Logs go to stdout; spans are exported over OTLP
//! when an endpoint is configured.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

/// Filter used when neither the config nor `RUST_LOG` names one.
pub const DEFAULT_FILTER: &str = "info,tower_http=warn,sqlx=warn";

#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "hr-server",
            env_filter: None,
            otlp_endpoint: None,
        }
    }
}

impl ObsConfig {
    /// Explicit settings win over `RUST_LOG` / `OTLP_ENDPOINT`.
    fn resolve(self) -> (String, Option<String>) {
        let filter = non_blank(self.env_filter)
            .or_else(|| non_blank(std::env::var("RUST_LOG").ok()))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let endpoint =
            non_blank(self.otlp_endpoint).or_else(|| non_blank(std::env::var("OTLP_ENDPOINT").ok()));
        (filter, endpoint)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let service_name = config.service_name;
    let (filter, otlp_endpoint) = config.resolve();

    let env_filter = EnvFilter::try_new(filter)?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(endpoint) = otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint)
            .build()?;

        let resource = Resource::builder().with_service_name(service_name).build();

        let provider = sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        let tracer = provider.tracer(service_name);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        registry.try_init()?;
    }

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    tracing::debug!(service = service_name, "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = ObsConfig {
            env_filter: Some("debug".into()),
            otlp_endpoint: Some("http://collector:4318/v1/traces".into()),
            ..ObsConfig::default()
        };
        let (filter, endpoint) = config.resolve();
        assert_eq!(filter, "debug");
        assert_eq!(endpoint.as_deref(), Some("http://collector:4318/v1/traces"));
    }

    #[test]
    fn blank_settings_are_ignored() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("info".into())).as_deref(), Some("info"));
    }

    #[test]
    fn second_init_is_a_no_op() {
        let config = ObsConfig {
            env_filter: Some("warn".into()),
            otlp_endpoint: None,
            ..ObsConfig::default()
        };
        init_tracing(config.clone()).unwrap();
        init_tracing(config).unwrap();
    }
}
