/// Application configuration module
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub esi_base_url: String,
    pub user_agent: String,
    pub home_system_id: i64,
    pub home_region_ids: Vec<i64>,
    pub bind_addr: String,
    pub notify_webhook_url: Option<String>,
    pub timings: Timings,
}

#[derive(Clone, Debug)]
pub struct Timings {
    pub max_restarts: u32,
    pub retry_delay_seconds: u64,
    pub min_poll_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let esi_base_url = env::var("ESI_BASE_URL")
            .unwrap_or_else(|_| "https://esi.evetech.net/latest".to_string())
            .trim_end_matches('/')
            .to_string();

        let user_agent =
            env::var("ESI_USER_AGENT").unwrap_or_else(|_| "incursion-tracker/1.0".to_string());

        let home_region_ids = match env::var("HOME_REGION_IDS") {
            Ok(raw) => parse_id_list(&raw)?,
            Err(_) => vec![10000060, 10000050, 10000063], // Delve, Querious, Period Basis
        };

        let notify_webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let timings = Timings {
            max_restarts: env_u64("MAX_RESTARTS", 10) as u32,
            retry_delay_seconds: env_u64("RETRY_DELAY_SECONDS", 60),
            min_poll_seconds: env_u64("MIN_POLL_SECONDS", 5),
            request_timeout_seconds: env_u64("REQUEST_TIMEOUT_SECONDS", 30),
        };

        Ok(Self {
            esi_base_url,
            user_agent,
            home_system_id: env_u64("HOME_SYSTEM_ID", 30004759) as i64, // 1DQ1-A
            home_region_ids,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            notify_webhook_url,
            timings,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma separated list of IDs, ignoring blank entries
fn parse_id_list(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| anyhow::anyhow!("invalid id '{}' in HOME_REGION_IDS: {}", s, e))
        })
        .collect()
}
