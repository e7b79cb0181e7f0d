use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub secure_cookie: bool,
    /// Seconds between sweeps of expired sessions.
    pub session_cleanup_secs: u64,
}

impl Config {
    /// Read `WARBLER_*` variables, falling back to local-dev defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let db_path = std::env::var("WARBLER_DB_PATH")
            .unwrap_or_else(|_| "warbler.db".into())
            .into();
        let host = std::env::var("WARBLER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("WARBLER_PORT") {
            Ok(raw) => parse_port(&raw)?,
            Err(_) => DEFAULT_PORT,
        };
        let secure_cookie = std::env::var("WARBLER_SECURE_COOKIE")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        let session_cleanup_secs = std::env::var("WARBLER_SESSION_CLEANUP_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(3600);

        Ok(Self {
            db_path,
            host,
            port,
            secure_cookie,
            session_cleanup_secs,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_port(raw: &str) -> anyhow::Result<u16> {
    raw.trim()
        .parse()
        .with_context(|| format!("WARBLER_PORT must be a port number, got '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_address() {
        let config = Config {
            db_path: "warbler.db".into(),
            host: "127.0.0.1".into(),
            port: 5000,
            secure_cookie: false,
            session_cleanup_secs: 3600,
        };
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:5000");

        let bad = Config {
            host: "not a host".into(),
            ..config
        };
        assert!(bad.addr().is_err());
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port("8080").unwrap(), 8080);
        assert_eq!(parse_port(" 5000\n").unwrap(), 5000);
        assert!(parse_port("").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("70000").is_err());
        assert!(parse_port("-1").is_err());
    }
}
