//! Configuration and CLI argument handling

use std::time::Duration;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "rest-clock")]
#[command(about = "A state-managed HTTP server for workout rest timers and background sync")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Base URL of the backend REST endpoint
    #[arg(long, default_value = "http://127.0.0.1:54321")]
    pub backend_url: String,

    /// Anonymous API key sent with every backend request
    #[arg(long, default_value = "")]
    pub backend_key: String,

    /// Seconds between background sync probes
    #[arg(short, long, default_value = "30")]
    pub sync_interval: u64,

    /// Remaining seconds at which the rest timer is flagged as ending
    #[arg(short, long, default_value = "10")]
    pub warning_threshold: u64,

    /// Backend request timeout in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Poll interval, never shorter than one second
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["rest-clock"]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.warning_threshold, 10);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config =
            Config::try_parse_from(["rest-clock", "--sync-interval", "0", "--verbose"]).unwrap();
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level(), "debug");
    }
}
