//! Configuration for minidfs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, overridable with `MINIDFS_CONFIG`
pub const DEFAULT_CONFIG_FILE: &str = "minidfs.toml";

/// 4 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Volume-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeConfig>,

    /// Logging level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load from `MINIDFS_CONFIG` (or `minidfs.toml`) plus `MINIDFS_*` env overrides.
    /// A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var("MINIDFS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::new(&path.as_ref().to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("MINIDFS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// A volume as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeNode {
    /// Identifier recorded in placement lists (e.g. `D1`)
    pub id: String,
    pub addr: SocketAddr,
}

impl VolumeNode {
    pub fn new(id: impl Into<String>, addr: SocketAddr) -> Self {
        Self { id: id.into(), addr }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for client sessions
    #[serde(default = "default_coord_bind")]
    pub bind_addr: SocketAddr,

    /// Known volumes, in round-robin order
    #[serde(default = "default_volumes")]
    pub volumes: Vec<VolumeNode>,

    /// Maximum segment length for appends
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Give up on one segment after this many failed allocations.
    /// `None` retries forever.
    #[serde(default)]
    pub alloc_retry_limit: Option<usize>,

    /// Pause after every volume has refused a segment in one sweep
    #[serde(default = "default_alloc_backoff")]
    pub alloc_backoff_ms: u64,
}

fn default_coord_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5558))
}
fn default_volumes() -> Vec<VolumeNode> {
    (0..3u16)
        .map(|i| {
            VolumeNode::new(
                format!("D{}", i + 1),
                SocketAddr::from(([127, 0, 0, 1], 65530 + i)),
            )
        })
        .collect()
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_alloc_backoff() -> u64 {
    100
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coord_bind(),
            volumes: default_volumes(),
            chunk_size: default_chunk_size(),
            alloc_retry_limit: None,
            alloc_backoff_ms: default_alloc_backoff(),
        }
    }
}

impl CoordinatorConfig {
    pub fn alloc_backoff(&self) -> Duration {
        Duration::from_millis(self.alloc_backoff_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volumes.is_empty() {
            return Err(Error::NoVolumes);
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.alloc_retry_limit == Some(0) {
            return Err(Error::InvalidConfig(
                "alloc_retry_limit must be positive (omit it to retry forever)".into(),
            ));
        }
        let mut seen = HashSet::new();
        for node in &self.volumes {
            if !seen.insert(node.id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate volume id: {}",
                    node.id
                )));
            }
        }
        Ok(())
    }
}

/// Volume configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Interface to listen on
    #[serde(default = "default_volume_host")]
    pub host: std::net::IpAddr,

    /// Listening port; also names the data directory
    #[serde(default)]
    pub port: u16,

    /// Number of block slots
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Parent of the `data_<port>` directory
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
}

fn default_volume_host() -> std::net::IpAddr {
    std::net::IpAddr::from([127, 0, 0, 1])
}
fn default_capacity() -> u32 {
    100
}
fn default_data_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            host: default_volume_host(),
            port: 0,
            capacity: default_capacity(),
            data_root: default_data_root(),
        }
    }
}

impl VolumeConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// `<data_root>/data_<port>`
    pub fn data_dir(&self) -> PathBuf {
        self.data_root.join(format!("data_{}", self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.bind_addr.port(), 5558);
        assert_eq!(config.chunk_size, 4_194_304);
        assert_eq!(config.alloc_retry_limit, None);

        let ids: Vec<_> = config.volumes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "D2", "D3"]);
        assert_eq!(config.volumes[2].addr.port(), 65532);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = CoordinatorConfig::default();
        config.volumes.clear();
        assert!(matches!(config.validate(), Err(Error::NoVolumes)));

        let mut config = CoordinatorConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.volumes[1].id = "D1".into();
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.alloc_retry_limit = Some(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        config.alloc_retry_limit = Some(1);
        config.validate().unwrap();
    }

    #[test]
    fn test_volume_data_dir() {
        let config = VolumeConfig {
            port: 65530,
            data_root: PathBuf::from("/srv"),
            ..Default::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/srv/data_65530"));
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:65530");
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("minidfs.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[coordinator]
bind_addr = "127.0.0.1:7000"
chunk_size = 1024
alloc_retry_limit = 6
volumes = [
    { id = "A", addr = "127.0.0.1:7001" },
    { id = "B", addr = "127.0.0.1:7002" },
]

[volume]
port = 7001
capacity = 8
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let coord = config.coordinator.unwrap();
        assert_eq!(coord.chunk_size, 1024);
        assert_eq!(coord.alloc_retry_limit, Some(6));
        assert_eq!(coord.volumes.len(), 2);
        assert_eq!(coord.alloc_backoff_ms, 100);

        let volume = config.volume.unwrap();
        assert_eq!(volume.capacity, 8);
        assert_eq!(volume.data_dir(), PathBuf::from("./data_7001"));
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempdir().unwrap();
        let config = Config::from_file(dir.path().join("absent.toml")).unwrap();
        assert!(config.coordinator.is_none());
        assert!(config.volume.is_none());
    }
}
