use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Directory backing the key-value store (one JSON file per key).
    pub storage_dir: PathBuf,
    /// Where direct captures and exported archives are saved.
    pub download_dir: PathBuf,
    /// How long a handler waits for its operation before answering 408.
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let storage_dir = env::var("STORAGE_DIR").unwrap_or_else(|_| "./data".to_string());
        let download_dir = env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "./downloads".to_string());

        let timeout = env::var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "90".to_string());
        let timeout = timeout
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid REQUEST_TIMEOUT_SECS: {}", e)))?;
        if timeout == 0 {
            return Err(AppError::ConfigError("REQUEST_TIMEOUT_SECS must be positive".to_string()));
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            storage_dir: PathBuf::from(storage_dir),
            download_dir: PathBuf::from(download_dir),
            request_timeout: Duration::from_secs(timeout),
        })
    }
}
