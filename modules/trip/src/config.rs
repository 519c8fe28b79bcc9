use event_bus::BusConfig;
use std::env;

/// Which backend holds the service's records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Memory,
    Postgres,
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub store_type: StoreType,
    pub database_url: Option<String>,
    pub bus: BusConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "trip-service".to_string());

        let store_type = match env::var("STORE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" | "inmemory" => StoreType::Memory,
            "postgres" => StoreType::Postgres,
            other => {
                return Err(format!(
                    "Invalid STORE_TYPE: {}. Must be 'memory' or 'postgres'",
                    other
                ))
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store_type == StoreType::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set when STORE_TYPE=postgres".to_string());
        }

        Ok(Config {
            host,
            port,
            service_name,
            store_type,
            database_url,
            bus: BusConfig::from_env()?,
        })
    }
}
