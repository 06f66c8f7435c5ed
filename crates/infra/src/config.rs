//! Process configuration from `KEYSTONE_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::external::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

const DEV_HSM_SECRET: &str = "keystone-dev-hsm-secret";

/// Remote-call budget shared by the fail-closed adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    /// `Duration::ZERO` disables the permission cache.
    pub permission_cache_ttl: Duration,
}

impl RemoteConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.retries, self.backoff, self.timeout)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            retries: 1,
            backoff: Duration::from_millis(50),
            permission_cache_ttl: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HsmConfig {
    pub enabled: bool,
    /// Remote signing service; `None` selects the in-process software HSM.
    pub service_url: Option<String>,
    pub public_key_id: Option<String>,
    pub timeout: Duration,
    pub dev_secret: String,
}

impl Default for HsmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_url: None,
            public_key_id: None,
            timeout: Duration::from_millis(5_000),
            dev_secret: DEV_HSM_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Remote permission service; `None` answers from the local admin stores.
    pub permission_service_url: Option<String>,
    /// Gateway serving public paths; `None` uses `public_paths`.
    pub gateway_url: Option<String>,
    pub public_paths: Vec<String>,
    pub remote: RemoteConfig,
    pub hsm: HsmConfig,
    pub worker_id: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            permission_service_url: None,
            gateway_url: None,
            public_paths: Vec::new(),
            remote: RemoteConfig::default(),
            hsm: HsmConfig::default(),
            worker_id: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let remote = RemoteConfig {
            timeout: millis(&get, "KEYSTONE_REMOTE_TIMEOUT_MS", defaults.remote.timeout)?,
            retries: parse(&get, "KEYSTONE_REMOTE_RETRIES", defaults.remote.retries)?,
            backoff: millis(&get, "KEYSTONE_REMOTE_BACKOFF_MS", defaults.remote.backoff)?,
            permission_cache_ttl: millis(
                &get,
                "KEYSTONE_PERMISSION_CACHE_TTL_MS",
                defaults.remote.permission_cache_ttl,
            )?,
        };

        let dev_secret = get("KEYSTONE_HSM_DEV_SECRET");
        let hsm = HsmConfig {
            enabled: parse(&get, "KEYSTONE_HSM_ENABLED", defaults.hsm.enabled)?,
            service_url: get("KEYSTONE_HSM_SERVICE_URL"),
            public_key_id: get("KEYSTONE_HSM_PUBLIC_KEY_ID"),
            timeout: millis(&get, "KEYSTONE_HSM_TIMEOUT_MS", defaults.hsm.timeout)?,
            dev_secret: dev_secret.clone().unwrap_or(defaults.hsm.dev_secret),
        };
        if hsm.enabled && hsm.service_url.is_none() && dev_secret.is_none() {
            warn!("KEYSTONE_HSM_DEV_SECRET not set; using insecure dev default");
        }

        let worker_id: u16 = parse(&get, "KEYSTONE_WORKER_ID", defaults.worker_id)?;
        if worker_id > crate::ids::MAX_WORKER_ID {
            return Err(ConfigError::Invalid {
                key: "KEYSTONE_WORKER_ID",
                value: worker_id.to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse(&get, "KEYSTONE_BIND_ADDR", defaults.bind_addr)?,
            permission_service_url: get("KEYSTONE_PERMISSION_SERVICE_URL"),
            gateway_url: get("KEYSTONE_GATEWAY_URL"),
            public_paths: get("KEYSTONE_PUBLIC_PATHS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            remote,
            hsm,
            worker_id,
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn millis<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse(get, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.remote.timeout, Duration::from_millis(2_000));
        assert!(cfg.hsm.enabled);
    }

    #[test]
    fn values_are_parsed_and_trimmed() {
        let cfg = load(&[
            ("KEYSTONE_BIND_ADDR", "127.0.0.1:9000"),
            ("KEYSTONE_PUBLIC_PATHS", " /health, /api/user/v1/classifications/page ,,"),
            ("KEYSTONE_REMOTE_TIMEOUT_MS", "250"),
            ("KEYSTONE_PERMISSION_CACHE_TTL_MS", "1000"),
            ("KEYSTONE_HSM_ENABLED", "false"),
            ("KEYSTONE_HSM_PUBLIC_KEY_ID", "pk-2024"),
            ("KEYSTONE_PERMISSION_SERVICE_URL", "  "),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.public_paths, vec!["/health", "/api/user/v1/classifications/page"]);
        assert_eq!(cfg.remote.timeout, Duration::from_millis(250));
        assert_eq!(cfg.remote.permission_cache_ttl, Duration::from_secs(1));
        assert!(!cfg.hsm.enabled);
        assert_eq!(cfg.hsm.public_key_id.as_deref(), Some("pk-2024"));
        assert_eq!(cfg.permission_service_url, None);
    }

    #[test]
    fn bad_numbers_name_the_key() {
        assert_eq!(
            load(&[("KEYSTONE_REMOTE_RETRIES", "many")]),
            Err(ConfigError::Invalid {
                key: "KEYSTONE_REMOTE_RETRIES",
                value: "many".into()
            })
        );
        assert!(load(&[("KEYSTONE_WORKER_ID", "4096")]).is_err());
    }
}
