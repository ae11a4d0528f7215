//! Configuration for Census.
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Census - network topology metadata service
#[derive(Parser, Debug, Clone)]
#[command(name = "census")]
#[command(about = "Network topology metadata service")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8888")]
    pub listen: SocketAddr,

    /// External base URL used in selfRef links (defaults to the listen
    /// address)
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "census")]
    pub mongodb_db: String,

    /// Enable development mode (falls back to the in-memory store when
    /// MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Seconds between expiration sweeps of the service registry
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Base URL for canonical self-links.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.listen),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval_secs == 0 {
            return Err("SWEEP_INTERVAL_SECS must be at least 1".to_string());
        }
        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("BASE_URL must be an absolute http(s) URL".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::parse_from(["census"])
    }

    #[test]
    fn base_url_defaults_to_listen_address() {
        let args = args();
        assert_eq!(args.base_url(), "http://0.0.0.0:8888");
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let mut args = args();
        args.base_url = Some("https://census.example.net/".to_string());
        assert_eq!(args.base_url(), "https://census.example.net");
        args.validate().unwrap();
    }

    #[test]
    fn rejects_zero_sweep_interval_and_relative_base_url() {
        let mut zero_interval = args();
        zero_interval.sweep_interval_secs = 0;
        assert!(zero_interval.validate().is_err());

        let mut relative_base = args();
        relative_base.base_url = Some("census.example.net".to_string());
        assert!(relative_base.validate().is_err());
    }
}
