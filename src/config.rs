use crate::infrastructure::config_bridge::FilterSettings;
use crate::infrastructure::lookup_queue::LookupQueueConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Filter settings
    pub blocked_countries: Vec<String>,
    pub debug: bool,

    // Lookup pacing
    pub min_interval_ms: u64,
    pub jitter_ms: u64,
    pub dispatch_timeout_ms: u64,
    pub cache_ttl_secs: u64,

    // Location provider
    pub provider_url: String,
    pub default_wait_ms: u64,

    // Feed snapshot loaded at start-up
    pub feed_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocked_countries: Vec::new(),
            debug: false,
            min_interval_ms: 2000,
            jitter_ms: 1000,
            dispatch_timeout_ms: 30_000,
            cache_ttl_secs: 86_400,
            provider_url: "http://127.0.0.1:8090".to_string(),
            default_wait_ms: 900_000,
            feed_path: None,
        }
    }
}

impl Config {
    pub fn queue_config(&self) -> LookupQueueConfig {
        LookupQueueConfig {
            min_interval: Duration::from_millis(self.min_interval_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            dispatch_timeout: Duration::from_millis(self.dispatch_timeout_ms),
        }
    }

    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            block_list: self.blocked_countries.clone(),
            debug: self.debug,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();

    let blocked_countries = std::env::var("FEEDBLOCK_BLOCKED_COUNTRIES")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let debug = std::env::var("DEBUG").is_ok();

    let min_interval_ms = env_u64("FEEDBLOCK_MIN_INTERVAL_MS", defaults.min_interval_ms);
    let jitter_ms = env_u64("FEEDBLOCK_JITTER_MS", defaults.jitter_ms);
    let dispatch_timeout_ms = env_u64("FEEDBLOCK_DISPATCH_TIMEOUT_MS", defaults.dispatch_timeout_ms);
    let cache_ttl_secs = env_u64("FEEDBLOCK_CACHE_TTL_SECS", defaults.cache_ttl_secs);

    let provider_url = std::env::var("FEEDBLOCK_PROVIDER_URL").unwrap_or(defaults.provider_url);
    let default_wait_ms = env_u64("FEEDBLOCK_DEFAULT_WAIT_MS", defaults.default_wait_ms);

    let feed_path = std::env::var("FEEDBLOCK_FEED_PATH").ok();

    Ok(Config {
        blocked_countries,
        debug,
        min_interval_ms,
        jitter_ms,
        dispatch_timeout_ms,
        cache_ttl_secs,
        provider_url,
        default_wait_ms,
        feed_path,
    })
}
