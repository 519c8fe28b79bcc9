use event_bus::BusConfig;
use std::env;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub bus: BusConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8084".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "notification-service".to_string());

        Ok(Config {
            host,
            port,
            service_name,
            bus: BusConfig::from_env()?,
        })
    }
}
