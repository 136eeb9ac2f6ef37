use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::State,
    http::{self, HeaderMap, HeaderName, HeaderValue, Method},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use platform_db::DbPool;
use products_hr::Actor;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    graphql::{RequestActor, SchemaType},
};

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct AppState {
    /// `None` when serving from the in-memory store.
    pub pool: Option<DbPool>,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "hr server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([
            http::header::CONTENT_TYPE,
            HeaderName::from_static(ACTOR_HEADER),
        ])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/graphql", post(graphql_handler))
        .route("/graphiql", get(graphiql))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Header value first, then the configured default actor.
fn request_actor(headers: &HeaderMap, config: &AppConfig) -> RequestActor {
    let from_header = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    RequestActor(
        from_header
            .or_else(|| config.default_actor_id.clone())
            .map(Actor::new),
    )
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let actor = request_actor(&headers, &state.config);
    let req = request.into_inner().data(actor);
    state.schema.execute(req).await.into()
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = match &state.pool {
        Some(pool) => match pool.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "database ping failed");
                false
            }
        },
        None => true,
    };
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}
