use anyhow::{Context, Result};
use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use tracing::Level;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime settings, read once from `HVDASH_*` environment variables.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub listen: SocketAddr,
    /// Compute endpoint, e.g. `http://10.0.0.5:8774/v2.1`. Unset disables the backend.
    pub compute_url: Option<String>,
    /// Container endpoint, e.g. `http://10.0.0.5/container`. Unset disables the backend.
    pub container_url: Option<String>,
    /// Forwarded as `X-Auth-Token` on every backend request.
    pub auth_token: Option<String>,
    pub http_timeout: Duration,
    pub log_level: Level,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            compute_url: None,
            container_url: None,
            auth_token: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_level: Level::INFO,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen = get("HVDASH_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen: SocketAddr = listen
            .parse()
            .with_context(|| format!("HVDASH_LISTEN is not a socket address: {}", listen))?;

        let http_timeout = match get("HVDASH_HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse::<u64>()
                    .with_context(|| format!("HVDASH_HTTP_TIMEOUT_SECS is not a number: {}", v))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let log_level = match get("HVDASH_LOG_LEVEL") {
            Some(v) => Level::from_str(&v)
                .map_err(|_| anyhow::anyhow!("HVDASH_LOG_LEVEL is not a log level: {}", v))?,
            None => Level::INFO,
        };

        Ok(DashboardConfig {
            listen,
            compute_url: get("HVDASH_COMPUTE_URL"),
            container_url: get("HVDASH_CONTAINER_URL"),
            auth_token: get("HVDASH_AUTH_TOKEN"),
            http_timeout,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = DashboardConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.listen.to_string(), DEFAULT_LISTEN);
        assert!(cfg.compute_url.is_none());
        assert!(cfg.container_url.is_none());
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.log_level, Level::INFO);
    }

    #[test]
    fn reads_all_keys() {
        let cfg = DashboardConfig::from_lookup(lookup(&[
            ("HVDASH_LISTEN", "127.0.0.1:9000"),
            ("HVDASH_COMPUTE_URL", "http://10.0.0.5:8774/v2.1"),
            ("HVDASH_CONTAINER_URL", "http://10.0.0.5/container"),
            ("HVDASH_AUTH_TOKEN", "gAAAA"),
            ("HVDASH_HTTP_TIMEOUT_SECS", "3"),
            ("HVDASH_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.compute_url.as_deref(), Some("http://10.0.0.5:8774/v2.1"));
        assert_eq!(cfg.auth_token.as_deref(), Some("gAAAA"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(3));
        assert_eq!(cfg.log_level, Level::DEBUG);
    }

    #[test]
    fn blank_values_are_unset() {
        let cfg =
            DashboardConfig::from_lookup(lookup(&[("HVDASH_CONTAINER_URL", "  ")])).unwrap();
        assert!(cfg.container_url.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(DashboardConfig::from_lookup(lookup(&[("HVDASH_LISTEN", "nowhere")])).is_err());
        assert!(
            DashboardConfig::from_lookup(lookup(&[("HVDASH_HTTP_TIMEOUT_SECS", "soon")])).is_err()
        );
        assert!(DashboardConfig::from_lookup(lookup(&[("HVDASH_LOG_LEVEL", "loud")])).is_err());
    }
}
