//! Configuration handling for the storage protocol tool.
//!
//! Settings come from the shared YAML config file, then from `STORAGE_PROTO_*`
//! environment variables, with built-in defaults for anything missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use storage_api::{BasicTypeRepo, LoadTypeSet, DEFAULT_PRIORITY};
use storage_protocol::{StorageProtocol, WireVersion};
use tracing::{info, warn};

const ENV_PREFIX: &str = "STORAGE_PROTO_";

/// Load type registered with the codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTypeConfig {
    /// Wire id
    pub id: u32,
    /// Registry name
    pub name: String,
    /// Default priority
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// Storage protocol tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Version used when a command does not name one
    pub wire_version: String,
    /// Cluster name used in node routes
    pub cluster: String,
    /// How long a sent command waits for its reply
    #[serde(with = "humantime_string")]
    pub pending_timeout: Duration,
    /// Document types the codec can deserialize
    pub document_types: Vec<String>,
    /// Load types beyond the built-in default
    pub load_types: Vec<LoadTypeConfig>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            wire_version: "6.240.0".to_string(),
            cluster: "storage".to_string(),
            pending_timeout: Duration::from_secs(30),
            document_types: vec!["testdoctype1".to_string()],
            load_types: Vec::new(),
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    storage: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    config: Option<HashMap<String, String>>,
    document_types: Option<Vec<String>>,
    load_types: Option<Vec<LoadTypeConfig>>,
}

impl ProtocolConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {:?}, using defaults: {}",
                        config_path.as_ref(),
                        e
                    );
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", config_path.as_ref());
            }
        }

        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
        config.validate()?;

        info!(
            "Storage protocol configuration: version={}, cluster={}, pending_timeout={}, document_types={}",
            config.wire_version,
            config.cluster,
            humantime::format_duration(config.pending_timeout),
            config.document_types.len()
        );
        Ok(config)
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(service) = root_config.services.and_then(|s| s.storage) else {
            return;
        };
        if let Some(types) = service.document_types {
            self.document_types = types;
        }
        if let Some(load_types) = service.load_types {
            self.load_types = load_types;
        }
        for (key, value) in service.config.unwrap_or_default() {
            match key.as_str() {
                "services.storage.wire_version" => self.wire_version = value,
                "services.storage.cluster" => self.cluster = value,
                "services.storage.pending_timeout" => match humantime::parse_duration(&value) {
                    Ok(timeout) => self.pending_timeout = timeout,
                    Err(e) => warn!("Ignoring pending_timeout {:?}: {}", value, e),
                },
                _ => {}
            }
        }
    }

    /// Apply overrides from `lookup`, which maps a key such as `CLUSTER` to
    /// its value
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(version) = lookup("WIRE_VERSION") {
            info!("Wire version overridden by environment: {}", version);
            self.wire_version = version;
        }

        if let Some(cluster) = lookup("CLUSTER") {
            info!("Cluster overridden by environment: {}", cluster);
            self.cluster = cluster;
        }

        if let Some(timeout) = lookup("PENDING_TIMEOUT") {
            match humantime::parse_duration(&timeout) {
                Ok(parsed) => {
                    self.pending_timeout = parsed;
                    info!("Pending timeout overridden by environment: {}", timeout);
                }
                Err(e) => warn!("Ignoring {}PENDING_TIMEOUT {:?}: {}", ENV_PREFIX, timeout, e),
            }
        }

        if let Some(types) = lookup("DOCUMENT_TYPES") {
            self.document_types = types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
    }

    fn validate(&self) -> Result<()> {
        let version = self.wire_version()?;
        if version.revision().is_none() {
            anyhow::bail!("wire version {} is older than 5.0", version);
        }
        Ok(())
    }

    /// Configured default wire version
    pub fn wire_version(&self) -> Result<WireVersion> {
        self.wire_version
            .parse()
            .with_context(|| format!("invalid wire version {:?}", self.wire_version))
    }

    /// Load type registry including the built-in default
    pub fn load_type_set(&self) -> LoadTypeSet {
        let mut set = LoadTypeSet::new();
        for lt in &self.load_types {
            set.add_load_type(lt.id, lt.name.clone(), lt.priority);
        }
        set
    }

    /// Codec over the configured load and document types
    pub fn protocol(&self) -> StorageProtocol {
        StorageProtocol::new(
            Arc::new(self.load_type_set()),
            Arc::new(BasicTypeRepo::new(self.document_types.iter().cloned())),
        )
    }
}

/// Durations as humantime strings such as `30s` or `1m 30s`
mod humantime_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}
