//! Deployment configuration (§6.2): transport choice, per-category shard
//! endpoint lists, and the async/prefetch defaults a `Client` is built
//! from. Parsed from either YAML or JSON -- the two are tried in that
//! order, since a YAML parser accepts JSON as a subset but not vice versa.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path:?} is neither valid YAML nor valid JSON: {yaml_error}")]
    Parse { path: std::path::PathBuf, yaml_error: serde_yaml::Error },
    #[error("{0} must resolve to an explicit path, or STORE_CONFIG_FILE must be set")]
    NoPathGiven(&'static str),
}

/// One `{address, provider_id, database_ids[]}` endpoint, expanding to a
/// number of individual `KvShard`s equal to its `database_ids` length (one
/// physical shard per database on that provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub address: String,
    pub provider_id: String,
    pub database_ids: Vec<String>,
}

impl EndpointConfig {
    pub fn shard_count(&self) -> usize {
        self.database_ids.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ShardsConfig {
    #[serde(default)]
    pub datasets: Vec<EndpointConfig>,
    #[serde(default)]
    pub runs: Vec<EndpointConfig>,
    #[serde(default)]
    pub subruns: Vec<EndpointConfig>,
    #[serde(default)]
    pub events: Vec<EndpointConfig>,
    #[serde(default)]
    pub products: Vec<EndpointConfig>,
}

impl ShardsConfig {
    /// Total shard count per category, keyed the way `ShardRouter::new`
    /// expects (§4.1).
    pub fn shard_counts(&self) -> HashMap<hep_shard_router::Category, usize> {
        use hep_shard_router::Category;
        let mut counts = HashMap::new();
        counts.insert(Category::Dataset, self.datasets.iter().map(EndpointConfig::shard_count).sum());
        counts.insert(Category::Run, self.runs.iter().map(EndpointConfig::shard_count).sum());
        counts.insert(Category::SubRun, self.subruns.iter().map(EndpointConfig::shard_count).sum());
        counts.insert(Category::Event, self.events.iter().map(EndpointConfig::shard_count).sum());
        counts.insert(Category::Product, self.products.iter().map(EndpointConfig::shard_count).sum());
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    pub protocol: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { protocol: "tcp".to_string() }
    }
}

fn default_threads() -> usize {
    0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsyncConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self { threads: default_threads() }
    }
}

fn default_cache_size() -> usize {
    16
}

fn default_batch_size() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrefetchConfig {
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { cache_size: default_cache_size(), batch_size: default_batch_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub shards: ShardsConfig,
    #[serde(default)]
    pub r#async: AsyncConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
}

impl Config {
    /// Loads and parses `path`, trying YAML first (a superset of JSON) and
    /// falling back to a dedicated JSON parse only to get a JSON-flavored
    /// error message if both fail.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match serde_yaml::from_str(&text) {
            Ok(config) => Ok(config),
            Err(yaml_error) => match serde_json::from_str(&text) {
                Ok(config) => Ok(config),
                Err(_) => Err(Error::Parse { path: path.to_path_buf(), yaml_error }),
            },
        }
    }

    /// Resolves a config path the way `§6.4`/`§9` describe: an explicit
    /// `path`, if given, wins; otherwise `STORE_CONFIG_FILE` is read
    /// exactly once. Neither present is a hard error -- there's no sensible
    /// default location for a multi-provider deployment's shard list.
    pub fn load_from_path_or_env(path: Option<impl AsRef<Path>>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let env_path = std::env::var_os("STORE_CONFIG_FILE")
                    .ok_or(Error::NoPathGiven("STORE_CONFIG_FILE"))?;
                Self::load(env_path)
            }
        }
    }

    /// Serializes a single endpoint description to the same schema as
    /// `shards.*` entries (§6.3, the `daemon` CLI's connection-file output).
    pub fn write_endpoint_file(path: impl AsRef<Path>, endpoint: &EndpointConfig) -> Result<(), Error> {
        let text = serde_yaml::to_string(endpoint).expect("EndpointConfig always serializes");
        std::fs::write(path.as_ref(), text).map_err(|source| Error::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults_filled_in() {
        let yaml = r#"
transport:
  protocol: tcp
shards:
  events:
    - address: "10.0.0.1:9000"
      provider_id: "p0"
      database_ids: ["db0", "db1"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.transport.protocol, "tcp");
        assert_eq!(config.shards.events[0].shard_count(), 2);
        assert_eq!(config.r#async.threads, 0);
        assert_eq!(config.prefetch.cache_size, 16);
        assert_eq!(config.prefetch.batch_size, 16);
    }

    #[test]
    fn parses_equivalent_json() {
        let json = r#"{"shards": {"runs": [{"address": "h:1", "provider_id": "p", "database_ids": ["a"]}]}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.shards.runs.len(), 1);
    }

    #[test]
    fn shard_counts_sum_database_ids_across_endpoints() {
        let mut config = Config::default();
        config.shards.events = vec![
            EndpointConfig { address: "a".into(), provider_id: "p0".into(), database_ids: vec!["x".into(), "y".into()] },
            EndpointConfig { address: "b".into(), provider_id: "p1".into(), database_ids: vec!["z".into()] },
        ];
        let counts = config.shards.shard_counts();
        assert_eq!(counts[&hep_shard_router::Category::Event], 3);
        assert_eq!(counts[&hep_shard_router::Category::Dataset], 0);
    }

    #[test]
    fn missing_file_surfaces_as_read_error() {
        let err = Config::load("/nonexistent/path/to/config.yaml").unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
