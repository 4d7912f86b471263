//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `RALLY_BIND` | `127.0.0.1:3000` |
//! | `RALLY_DATA_DIR` | `data` |
//! | `RALLY_API_URL` | provider API |
//! | `RALLY_MAX_CONCURRENT` | `4` |
//! | `RALLY_BOOKING_URL` | provider booking site |
//! | `RALLY_MOCK_ROUTES` | unset (live API) |
//! | `NOMINATIM_URL` | public instance |
//! | `NOMINATIM_USER_AGENT` | `rally-watch/<version>` |
//! | `TELEGRAM_BOT_TOKEN` | unset (log notifications) |
//! | `SYNC_INTERVAL_SECS` | `1800` |
//! | `SYNC_COOLDOWN_SECS` | `300` |
//! | `GEOCODE_WORKERS` | `4` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::geocode::NominatimConfig;
use crate::notify::TelegramConfig;
use crate::rally::RallyConfig;
use crate::sync::SyncConfig;

const DEFAULT_BOOKING_URL: &str = "https://booking.roadsurfer.com/en";

#[derive(Debug, thiserror::Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Everything needed to start the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub rally: RallyConfig,
    /// Base of the booking links sent in notifications
    pub booking_url: String,
    /// Serve routes from this snapshot file instead of the live API
    pub mock_routes: Option<PathBuf>,
    pub nominatim: NominatimConfig,
    /// `None` logs notifications instead of sending them
    pub telegram: Option<TelegramConfig>,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let mut rally = RallyConfig::default();
        if let Some(url) = get("RALLY_API_URL") {
            rally = rally.with_base_url(url);
        }
        if let Some(n) = parse::<usize>(&get, "RALLY_MAX_CONCURRENT")? {
            rally = rally.with_max_concurrent(n.max(1));
        }

        let user_agent = get("NOMINATIM_USER_AGENT")
            .unwrap_or_else(|| format!("rally-watch/{}", env!("CARGO_PKG_VERSION")));
        let mut nominatim = NominatimConfig::new(user_agent);
        if let Some(url) = get("NOMINATIM_URL") {
            nominatim = nominatim.with_base_url(url);
        }

        let mut sync = SyncConfig::default();
        if let Some(secs) = parse::<u64>(&get, "SYNC_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(ConfigError {
                    var: "SYNC_INTERVAL_SECS",
                    value: secs.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            sync.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "SYNC_COOLDOWN_SECS")? {
            sync.manual_cooldown = Duration::from_secs(secs);
        }
        if let Some(n) = parse::<usize>(&get, "GEOCODE_WORKERS")? {
            sync.geocode_workers = n.max(1);
        }

        Ok(Self {
            bind: parse(&get, "RALLY_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000))),
            data_dir: get("RALLY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            rally,
            booking_url: get("RALLY_BOOKING_URL")
                .unwrap_or_else(|| DEFAULT_BOOKING_URL.to_string()),
            mock_routes: get("RALLY_MOCK_ROUTES").map(PathBuf::from),
            nominatim,
            telegram: get("TELEGRAM_BOT_TOKEN").map(TelegramConfig::new),
            sync,
        })
    }

    pub fn routes_path(&self) -> PathBuf {
        self.data_dir.join("routes.json")
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir.join("favorites.json")
    }

    pub fn geocode_cache_path(&self) -> PathBuf {
        self.data_dir.join("geocode_cache.json")
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(config.routes_path(), PathBuf::from("data/routes.json"));
        assert_eq!(config.favorites_path(), PathBuf::from("data/favorites.json"));
        assert_eq!(
            config.geocode_cache_path(),
            PathBuf::from("data/geocode_cache.json")
        );
        assert_eq!(config.booking_url, DEFAULT_BOOKING_URL);
        assert!(config.telegram.is_none());
        assert!(config.mock_routes.is_none());
        assert_eq!(config.sync.interval, Duration::from_secs(1800));
        assert_eq!(config.sync.manual_cooldown, Duration::from_secs(300));
        assert!(config.nominatim.user_agent.starts_with("rally-watch/"));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("RALLY_BIND", "0.0.0.0:8080"),
            ("RALLY_DATA_DIR", "/var/lib/rally"),
            ("RALLY_MAX_CONCURRENT", "8"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("SYNC_INTERVAL_SECS", "600"),
            ("SYNC_COOLDOWN_SECS", "0"),
            ("GEOCODE_WORKERS", "2"),
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.routes_path(), PathBuf::from("/var/lib/rally/routes.json"));
        assert_eq!(config.rally.max_concurrent, 8);
        assert_eq!(config.telegram.unwrap().token, "123:abc");
        assert_eq!(config.sync.interval, Duration::from_secs(600));
        assert_eq!(config.sync.manual_cooldown, Duration::ZERO);
        assert_eq!(config.sync.geocode_workers, 2);
    }

    #[test]
    fn blank_values_are_unset() {
        let config = config(&[("TELEGRAM_BOT_TOKEN", "  ")]).unwrap();
        assert!(config.telegram.is_none());
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = config(&[("SYNC_INTERVAL_SECS", "soon")]).unwrap_err();
        assert_eq!(err.var, "SYNC_INTERVAL_SECS");
        assert_eq!(err.value, "soon");

        let err = config(&[("SYNC_INTERVAL_SECS", "0")]).unwrap_err();
        assert_eq!(err.reason, "must be greater than zero");

        assert!(config(&[("RALLY_BIND", "localhost")]).is_err());
    }
}
