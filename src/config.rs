use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::DEFAULT_MARGIN_THRESHOLD;

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Prefix of every pub/sub channel this gateway publishes to or relays.
    pub redis_namespace: String,
    pub google_api_key: Option<String>,
    pub vision_base_url: String,
    pub allowed_origin: String,
    pub margin_threshold_percent: f64,
    pub search_cache_ttl: Duration,
    pub collaborator_timeout: Duration,
    /// Cost per ounce assumed for ingredients missing from the cost table.
    /// Unset means unknown ingredients fail the evaluation.
    pub missing_cost_fallback: Option<f64>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret)
    }

    /// Builds the config from a variable lookup and a secret lookup. Secrets
    /// take precedence over variables of the same name.
    pub fn from_lookup<V, S>(var: V, secret: S) -> Result<Self, ConfigError>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let sensitive = |key: &str| secret(key).or_else(|| var(key));

        let margin_threshold_percent: f64 = try_load(
            &var,
            "MARGIN_THRESHOLD_PERCENT",
            &DEFAULT_MARGIN_THRESHOLD.to_string(),
        )?;
        if !margin_threshold_percent.is_finite() {
            return Err(ConfigError::Invalid {
                key: "MARGIN_THRESHOLD_PERCENT",
                value: margin_threshold_percent.to_string(),
                reason: "must be finite".to_string(),
            });
        }

        let search_cache_ttl_secs = positive(
            try_load(&var, "SEARCH_CACHE_TTL_SECS", "3600")?,
            "SEARCH_CACHE_TTL_SECS",
        )?;
        let collaborator_timeout_ms = positive(
            try_load(&var, "COLLABORATOR_TIMEOUT_MS", "2000")?,
            "COLLABORATOR_TIMEOUT_MS",
        )?;

        let missing_cost_fallback = match var("MISSING_COST_FALLBACK") {
            Some(raw) => Some(parse_fallback(&raw)?),
            None => None,
        };

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "1111")?,
            database_url: sensitive("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            redis_url: sensitive("REDIS_URL").unwrap_or_else(|| {
                info!("REDIS_URL not set, using default: redis://127.0.0.1:6379/");
                "redis://127.0.0.1:6379/".to_string()
            }),
            redis_namespace: try_load(&var, "REDIS_NAMESPACE", "table1837")?,
            google_api_key: sensitive("GOOGLE_API_KEY"),
            vision_base_url: try_load(&var, "VISION_BASE_URL", "https://vision.googleapis.com/")?,
            allowed_origin: try_load(
                &var,
                "ALLOWED_ORIGIN",
                "https://table1837-glenrock.pages.dev",
            )?,
            margin_threshold_percent,
            search_cache_ttl: Duration::from_secs(search_cache_ttl_secs),
            collaborator_timeout: Duration::from_millis(collaborator_timeout_ms),
            missing_cost_fallback,
        })
    }
}

fn try_load<T, V>(var: &V, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}

/// Zero TTLs are rejected by `SETEX` and a zero timeout fails every call.
fn positive(value: u64, key: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        warn!("Invalid {key} value: must be greater than zero");
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_fallback(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "MISSING_COST_FALLBACK",
        value: raw.to_string(),
        reason,
    };

    let cost: f64 = raw.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    if !cost.is_finite() || cost < 0.0 {
        return Err(invalid("must be a non-negative cost".to_string()));
    }

    warn!("Unknown ingredients will be costed at {cost} per oz");
    Ok(cost)
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path).map(|s| s.trim().to_string()).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_secrets(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/bar")]), no_secrets)
                .unwrap();

        assert_eq!(config.port, 1111);
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379/");
        assert_eq!(config.redis_namespace, "table1837");
        assert_eq!(config.margin_threshold_percent, 70.0);
        assert_eq!(config.search_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.collaborator_timeout, Duration::from_millis(2000));
        assert_eq!(config.missing_cost_fallback, None);
        assert_eq!(config.google_api_key, None);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[]), no_secrets),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn secrets_override_variables() {
        let secrets = lookup(&[("GOOGLE_API_KEY", "from-file")]);
        let config = Config::from_lookup(
            lookup(&[
                ("DATABASE_URL", "postgres://db/bar"),
                ("GOOGLE_API_KEY", "from-env"),
            ]),
            secrets,
        )
        .unwrap();
        assert_eq!(config.google_api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(
            lookup(&[("DATABASE_URL", "postgres://db/bar"), ("RUST_PORT", "http")]),
            no_secrets,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RUST_PORT", .. }));

        let err = Config::from_lookup(
            lookup(&[
                ("DATABASE_URL", "postgres://db/bar"),
                ("MISSING_COST_FALLBACK", "-0.25"),
            ]),
            no_secrets,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MISSING_COST_FALLBACK",
                ..
            }
        ));

        for key in ["SEARCH_CACHE_TTL_SECS", "COLLABORATOR_TIMEOUT_MS"] {
            let err = Config::from_lookup(
                lookup(&[("DATABASE_URL", "postgres://db/bar"), (key, "0")]),
                no_secrets,
            )
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key,
                    value: "0".to_string(),
                    reason: "must be greater than zero".to_string(),
                }
            );
        }
    }

    #[test]
    fn fallback_and_threshold_are_configurable() {
        let config = Config::from_lookup(
            lookup(&[
                ("DATABASE_URL", "postgres://db/bar"),
                ("MISSING_COST_FALLBACK", "0.25"),
                ("MARGIN_THRESHOLD_PERCENT", "75"),
            ]),
            no_secrets,
        )
        .unwrap();
        assert_eq!(config.missing_cost_fallback, Some(0.25));
        assert_eq!(config.margin_threshold_percent, 75.0);
    }
}
