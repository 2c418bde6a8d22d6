//! Bot configuration.
//!
//! Built once at startup from environment variables; CLI flags may then
//! override individual fields.

use std::str::FromStr;
use std::time::Duration;

use aprsbot_link::{AprsCredentials, LinkConfig, RangeFilter, RetryPolicy};

use crate::dispatch::DispatchSettings;
use crate::error::ConfigError;

/// Runtime configuration for the bot and its APRS-IS link.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// APRS-IS server hostname.
    pub server: String,
    /// APRS-IS server port.
    pub port: u16,
    /// Range filter sent at login, if an origin was configured.
    pub filter: Option<RangeFilter>,
    /// How long a sent message may wait for its acknowledgement.
    pub ack_timeout: Duration,
    /// How often pending messages are checked for expiry.
    pub sweep_interval: Duration,
    /// Upper bound for the listener to stop during shutdown.
    pub shutdown_timeout: Duration,
    /// URL returned by the `website` command.
    pub club_website: Option<String>,
    /// Backoff for the initial APRS-IS connection.
    pub retry: RetryPolicy,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: "rotate.aprs2.net".to_string(),
            port: 14580,
            filter: None,
            ack_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            club_website: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable                   | Default            | Description                               |
    /// |----------------------------|--------------------|-------------------------------------------|
    /// | `APRS_SERVER`              | `rotate.aprs2.net` | APRS-IS server                            |
    /// | `APRS_PORT`                | `14580`            | APRS-IS filter port                       |
    /// | `APRS_FILTER_LAT`          | unset              | Range filter origin latitude              |
    /// | `APRS_FILTER_LON`          | unset              | Range filter origin longitude             |
    /// | `APRS_FILTER_RADIUS_MILES` | `50`               | Range filter radius                       |
    /// | `ACK_TIMEOUT_SECONDS`      | `300`              | Give up waiting for an ack after this     |
    /// | `SWEEP_INTERVAL_SECONDS`   | `30`               | Pending-message expiry check interval     |
    /// | `SHUTDOWN_TIMEOUT_SECONDS` | `10`               | Bound on waiting for the listener to stop |
    /// | `CLUB_WEBSITE`             | unset              | URL for the `website` command             |
    ///
    /// The range filter is only applied when both coordinates are set.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for values that do not parse, and when only one of
    /// the two filter coordinates is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let server = get("APRS_SERVER").unwrap_or(defaults.server);
        let port = parse_var(&get, "APRS_PORT")?.unwrap_or(defaults.port);

        let lat: Option<f64> = parse_var(&get, "APRS_FILTER_LAT")?;
        let lon: Option<f64> = parse_var(&get, "APRS_FILTER_LON")?;
        let radius: f64 = parse_var(&get, "APRS_FILTER_RADIUS_MILES")?.unwrap_or(50.0);
        let filter = match (lat, lon) {
            (Some(lat), Some(lon)) => Some(RangeFilter::new(lat, lon, radius).map_err(|e| {
                ConfigError::Invalid {
                    var: "APRS_FILTER_*".to_string(),
                    value: format!("{lat},{lon},{radius}"),
                    reason: e.to_string(),
                }
            })?),
            (Some(_), None) => return Err(incomplete("APRS_FILTER_LAT", "APRS_FILTER_LON")),
            (None, Some(_)) => return Err(incomplete("APRS_FILTER_LON", "APRS_FILTER_LAT")),
            (None, None) => None,
        };

        let seconds = |var: &str, default: Duration| -> Result<Duration, ConfigError> {
            match parse_var::<u64>(&get, var)? {
                Some(0) => Err(ConfigError::Invalid {
                    var: var.to_string(),
                    value: "0".to_string(),
                    reason: "must be at least 1 second".to_string(),
                }),
                Some(secs) => Ok(Duration::from_secs(secs)),
                None => Ok(default),
            }
        };

        Ok(Self {
            server,
            port,
            filter,
            ack_timeout: seconds("ACK_TIMEOUT_SECONDS", defaults.ack_timeout)?,
            sweep_interval: seconds("SWEEP_INTERVAL_SECONDS", defaults.sweep_interval)?,
            shutdown_timeout: seconds("SHUTDOWN_TIMEOUT_SECONDS", defaults.shutdown_timeout)?,
            club_website: get("CLUB_WEBSITE"),
            retry: defaults.retry,
        })
    }

    /// Connection parameters for logging in as `credentials`.
    pub fn link_config(&self, credentials: AprsCredentials) -> LinkConfig {
        let config = LinkConfig::new(credentials).with_server(self.server.clone(), self.port);
        match self.filter {
            Some(filter) => config.with_filter(filter),
            None => config,
        }
    }

    /// Timing parameters for the message dispatcher.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            ack_timeout: self.ack_timeout,
            sweep_interval: self.sweep_interval,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var: var.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn incomplete(set: &str, missing: &str) -> ConfigError {
    ConfigError::Incomplete {
        set: set.to_string(),
        missing: missing.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.server, "rotate.aprs2.net");
        assert_eq!(cfg.port, 14580);
        assert!(cfg.filter.is_none());
        assert_eq!(cfg.ack_timeout, Duration::from_secs(300));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(30));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(10));
        assert!(cfg.club_website.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config_from(&[
            ("APRS_SERVER", "noam.aprs2.net"),
            ("APRS_PORT", "10152"),
            ("APRS_FILTER_LAT", "30.27"),
            ("APRS_FILTER_LON", "-97.74"),
            ("ACK_TIMEOUT_SECONDS", "60"),
            ("CLUB_WEBSITE", "https://www.aa5ro.org/"),
        ])
        .unwrap();
        assert_eq!(cfg.server, "noam.aprs2.net");
        assert_eq!(cfg.port, 10152);
        assert_eq!(cfg.filter.unwrap().to_string(), "r/30.27/-97.74/80");
        assert_eq!(cfg.ack_timeout, Duration::from_secs(60));
        assert_eq!(cfg.club_website.as_deref(), Some("https://www.aa5ro.org/"));
    }

    #[test]
    fn half_a_filter_is_an_error() {
        let err = config_from(&[("APRS_FILTER_LAT", "30.27")]).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete { ref missing, .. } if missing == "APRS_FILTER_LON"));
    }

    #[test]
    fn unparseable_values_are_errors() {
        assert!(matches!(
            config_from(&[("APRS_PORT", "port")]).unwrap_err(),
            ConfigError::Invalid { ref var, .. } if var == "APRS_PORT"
        ));
        assert!(config_from(&[("ACK_TIMEOUT_SECONDS", "0")]).is_err());
        assert!(config_from(&[("APRS_FILTER_LAT", "95"), ("APRS_FILTER_LON", "0")]).is_err());
    }

    #[test]
    fn link_config_carries_server_and_filter() {
        let cfg = config_from(&[("APRS_FILTER_LAT", "47"), ("APRS_FILTER_LON", "-122")]).unwrap();
        let link = cfg.link_config(AprsCredentials::new("W1AW", "12345").unwrap());
        assert_eq!(link.server, "rotate.aprs2.net");
        assert_eq!(link.port, 14580);
        assert!(link.filter.is_some());
    }
}
