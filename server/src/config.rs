use anyhow::{Result, anyhow};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cors_allowed_origins: Vec<String>,
    /// Actor used when a request carries no `x-actor-id` header.
    pub default_actor_id: Option<String>,
    pub repair_on_mismatch: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let default_actor_id = lookup("DEFAULT_ACTOR_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let repair_on_mismatch = match lookup("REPAIR_ON_MISMATCH") {
            Some(raw) => parse_bool("REPAIR_ON_MISMATCH", &raw)?,
            None => false,
        };

        Ok(Self {
            cors_allowed_origins,
            default_actor_id,
            repair_on_mismatch,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(anyhow!("invalid boolean for {key}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.default_actor_id, None);
        assert!(!config.repair_on_mismatch);
    }

    #[test]
    fn reads_origins_actor_and_repair_flag() {
        let config = load(&[
            ("CORS_ALLOWED_ORIGINS", "https://hr.example, ,https://admin.example"),
            ("DEFAULT_ACTOR_ID", " ops-bot "),
            ("REPAIR_ON_MISMATCH", "yes"),
        ])
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://hr.example", "https://admin.example"]
        );
        assert_eq!(config.default_actor_id.as_deref(), Some("ops-bot"));
        assert!(config.repair_on_mismatch);
    }

    #[test]
    fn rejects_garbage_booleans() {
        let err = load(&[("REPAIR_ON_MISMATCH", "sometimes")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid boolean for REPAIR_ON_MISMATCH: sometimes"
        );
    }
}
