use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_QUEUE_TARGET: usize = 3;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_SWEEP_SCHEDULE: &str = "0 * * * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub use_llm: bool,
    pub queue_target: usize,
    pub prefetch_use_llm: bool,
    pub session_ttl: Duration,
    pub session_sweep_schedule: String,
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

        let queue_target = std::env::var("QUEUE_TARGET")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_QUEUE_TARGET);

        let session_ttl = std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_SESSION_TTL_SECS));

        let session_sweep_schedule = std::env::var("SESSION_SWEEP_SCHEDULE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SWEEP_SCHEDULE.to_string());

        Self {
            host,
            port,
            log_level,
            use_llm: env_bool("USE_LLM", false),
            queue_target,
            prefetch_use_llm: env_bool("PREFETCH_USE_LLM", false),
            session_ttl,
            session_sweep_schedule,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            use_llm: false,
            queue_target: DEFAULT_QUEUE_TARGET,
            prefetch_use_llm: false,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            session_sweep_schedule: DEFAULT_SWEEP_SCHEDULE.to_string(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| parse_bool(&value))
        .unwrap_or(default)
}

pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y" | "on"
    )
}
