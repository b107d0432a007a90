use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HubEndpointConfig {
    pub url: String,
    #[serde(default)]
    pub auth_header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub root_targets: Vec<i64>,
    #[serde(default)]
    pub target_clients: Vec<i64>,
    #[serde(default = "default_true")]
    pub enable_client_discovery: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            root_targets: Vec::new(),
            target_clients: Vec::new(),
            enable_client_discovery: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConcurrencyConfig {
    pub backfill: usize,
    pub realtime: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { backfill: 5, realtime: 1 }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexerConfig {
    pub hubs: Vec<HubEndpointConfig>,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_ms: u64,
    pub db_pool_size: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            hubs: Vec::new(),
            strategy: StrategyConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            batch_size: 100,
            batch_timeout_ms: 1000,
            rate_limit_delay_ms: 1000,
            max_retries: 3,
            request_timeout_ms: 30_000,
            db_pool_size: 20,
        }
    }
}

impl IndexerConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("INDEXER.toml"))
            .merge(Env::prefixed("INDEXER_"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_matches_documented_defaults() {
        let config = IndexerConfig::default();
        assert_eq!(config.concurrency.backfill, 5);
        assert_eq!(config.concurrency.realtime, 1);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_timeout_ms, 1000);
    }
}
