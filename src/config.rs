use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Runtime settings, all sourced from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Directory for rolling log files. `None` leaves file logging off.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_dir = env_flag("ENABLE_FILE_LOGS").then(|| {
            PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()))
        });

        Self {
            host,
            port,
            log_level,
            log_dir,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_combines_host_and_port() {
        let config = Config {
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            log_level: "info".to_string(),
            log_dir: None,
        };
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn env_flag_accepts_true_and_one() {
        std::env::set_var("CONFIG_TEST_FLAG_A", "true");
        std::env::set_var("CONFIG_TEST_FLAG_B", "1");
        std::env::set_var("CONFIG_TEST_FLAG_C", "yes");
        assert!(env_flag("CONFIG_TEST_FLAG_A"));
        assert!(env_flag("CONFIG_TEST_FLAG_B"));
        assert!(!env_flag("CONFIG_TEST_FLAG_C"));
        assert!(!env_flag("CONFIG_TEST_FLAG_UNSET"));
    }
}
