use crate::nats_bus::DEFAULT_EXCHANGE;
use crate::{BrokerClient, EventBus, InMemoryBus, NatsBus, RetryConfig};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Which transport backs the broker client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    InMemory,
    Nats,
}

impl std::str::FromStr for BusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmemory" | "memory" => Ok(BusKind::InMemory),
            "nats" => Ok(BusKind::Nats),
            other => Err(format!(
                "Invalid BUS_TYPE: {}. Must be 'inmemory' or 'nats'",
                other
            )),
        }
    }
}

/// Event bus settings parsed from environment variables
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub kind: BusKind,
    pub nats_url: String,
    pub exchange: String,
    pub connect_retry: RetryConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::InMemory,
            nats_url: "nats://localhost:4222".to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            connect_retry: RetryConfig::default(),
        }
    }
}

impl BusConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Parse settings from an arbitrary variable source
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();

        let kind = match var("BUS_TYPE") {
            Some(value) => value.parse()?,
            None => defaults.kind,
        };

        let nats_url = var("NATS_URL").unwrap_or(defaults.nats_url);
        let exchange = var("BUS_EXCHANGE").unwrap_or(defaults.exchange);
        if exchange.is_empty() || exchange.contains('.') {
            return Err("BUS_EXCHANGE must be a non-empty name without dots".to_string());
        }

        let retry = defaults.connect_retry;
        let max_attempts = parse_or(&var, "BUS_CONNECT_ATTEMPTS", retry.max_attempts)?;
        if max_attempts == 0 {
            return Err("BUS_CONNECT_ATTEMPTS must be at least 1".to_string());
        }
        let initial_ms = parse_or(
            &var,
            "BUS_CONNECT_BACKOFF_MS",
            retry.initial_backoff.as_millis() as u64,
        )?;
        let max_ms = parse_or(
            &var,
            "BUS_CONNECT_MAX_BACKOFF_MS",
            retry.max_backoff.as_millis() as u64,
        )?;

        Ok(BusConfig {
            kind,
            nats_url,
            exchange,
            connect_retry: RetryConfig {
                max_attempts,
                initial_backoff: Duration::from_millis(initial_ms),
                max_backoff: Duration::from_millis(max_ms.max(initial_ms)),
                multiplier: retry.multiplier,
            },
        })
    }

    /// Build the configured transport (not yet connected)
    pub fn build_transport(&self) -> Arc<dyn EventBus> {
        match self.kind {
            BusKind::InMemory => {
                tracing::info!("Using InMemory event bus");
                Arc::new(InMemoryBus::new())
            }
            BusKind::Nats => {
                tracing::info!("Using NATS event bus at {}", self.nats_url);
                Arc::new(NatsBus::with_exchange(
                    self.nats_url.clone(),
                    self.exchange.clone(),
                ))
            }
        }
    }

    /// Build a broker client over the configured transport
    pub fn build_broker(&self) -> BrokerClient {
        BrokerClient::new(self.build_transport(), self.connect_retry.clone())
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String> {
    match var(key) {
        Some(value) => value
            .parse()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BusConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.kind, BusKind::InMemory);
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.exchange, "events");
        assert_eq!(config.connect_retry.max_attempts, 10);
    }

    #[test]
    fn test_overrides() {
        let config = BusConfig::from_vars(vars(&[
            ("BUS_TYPE", "NATS"),
            ("NATS_URL", "nats://bus:4222"),
            ("BUS_EXCHANGE", "rides"),
            ("BUS_CONNECT_ATTEMPTS", "3"),
            ("BUS_CONNECT_BACKOFF_MS", "100"),
            ("BUS_CONNECT_MAX_BACKOFF_MS", "50"),
        ]))
        .unwrap();

        assert_eq!(config.kind, BusKind::Nats);
        assert_eq!(config.nats_url, "nats://bus:4222");
        assert_eq!(config.exchange, "rides");
        assert_eq!(config.connect_retry.max_attempts, 3);
        assert_eq!(config.connect_retry.initial_backoff, Duration::from_millis(100));
        // Cap never below the first delay
        assert_eq!(config.connect_retry.max_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_values() {
        assert!(BusConfig::from_vars(vars(&[("BUS_TYPE", "rabbit")])).is_err());
        assert!(BusConfig::from_vars(vars(&[("BUS_CONNECT_ATTEMPTS", "many")])).is_err());
        assert!(BusConfig::from_vars(vars(&[("BUS_CONNECT_ATTEMPTS", "0")])).is_err());
        assert!(BusConfig::from_vars(vars(&[("BUS_EXCHANGE", "a.b")])).is_err());
    }
}
