use event_bus::BusConfig;
use std::env;

use crate::fare::FareRule;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub fare: FareRule,
    pub bus: BusConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "pricing-service".to_string());

        Ok(Config {
            host,
            port,
            service_name,
            fare: fare_from_vars(|key| env::var(key).ok())?,
            bus: BusConfig::from_env()?,
        })
    }
}

/// Fare rule from `PRICING_*` variables, falling back to the defaults
pub fn fare_from_vars(var: impl Fn(&str) -> Option<String>) -> Result<FareRule, String> {
    let defaults = FareRule::default();
    let number = |key: &str, default: f64| -> Result<f64, String> {
        match var(key) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{} must be a number, got '{}'", key, raw)),
            None => Ok(default),
        }
    };

    let rule = FareRule {
        base_fare: number("PRICING_BASE_FARE", defaults.base_fare)?,
        per_km: number("PRICING_PER_KM", defaults.per_km)?,
        per_minute: number("PRICING_PER_MINUTE", defaults.per_minute)?,
        minimum_fare: number("PRICING_MINIMUM_FARE", defaults.minimum_fare)?,
        avg_speed_kmh: number("PRICING_AVG_SPEED_KMH", defaults.avg_speed_kmh)?,
    };
    rule.validate()?;
    Ok(rule)
}
