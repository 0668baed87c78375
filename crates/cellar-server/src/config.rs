use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cellar_engine::EngineConfig;
use cellar_store::SyncMode;
use cellar_types::Namespace;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 8470;

/// Environment variable names read by [`ServerConfig::apply_env`].
pub mod env_vars {
    pub const ENVIRONMENT: &str = "CELLAR_ENVIRONMENT";
    pub const BIND_ADDR: &str = "CELLAR_BIND_ADDR";
    pub const PORT: &str = "CELLAR_PORT";
    pub const DATA_DIR: &str = "CELLAR_DATA_DIR";
    pub const STORAGE_BACKEND: &str = "CELLAR_STORAGE_BACKEND";
    pub const NAMESPACES: &str = "CELLAR_NAMESPACES";
    pub const LOG_LEVEL: &str = "CELLAR_LOG_LEVEL";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Requests running longer than this are abandoned.
    pub request_timeout_ms: u64,
    pub max_body_bytes: usize,
    /// Namespaces provisioned at startup.
    pub namespaces: Vec<String>,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            log_level: "info".into(),
            request_timeout_ms: 10_000,
            max_body_bytes: 1024 * 1024,
            namespaces: Vec::new(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            other => Err(ServerError::Config(format!(
                "unknown storage backend {other:?} (expected \"memory\" or \"file\")"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    EveryWrite,
    #[default]
    OsDefault,
}

impl From<SyncPolicy> for SyncMode {
    fn from(policy: SyncPolicy) -> Self {
        match policy {
            SyncPolicy::EveryWrite => SyncMode::EveryWrite,
            SyncPolicy::OsDefault => SyncMode::OsDefault,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub sync: SyncPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
            sync: SyncPolicy::OsDefault,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Full startup load: `.env` (outside production), then the optional
    /// TOML file, then `CELLAR_*` environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let production = std::env::var(env_vars::ENVIRONMENT).is_ok_and(|v| v == "production");
        if !production {
            match dotenvy::dotenv() {
                Ok(path) => debug!(path = %path.display(), "loaded .env"),
                Err(e) if e.not_found() => {}
                Err(e) => return Err(ServerError::Config(format!(".env: {e}"))),
            }
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CELLAR_*` overrides obtained through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(env_vars::BIND_ADDR) {
            self.bind_addr = addr.parse().map_err(|e| {
                ServerError::Config(format!("{}={addr:?}: {e}", env_vars::BIND_ADDR))
            })?;
        }
        if let Some(port) = lookup(env_vars::PORT) {
            let port: u16 = port.parse().map_err(|e| {
                ServerError::Config(format!("{}={port:?}: {e}", env_vars::PORT))
            })?;
            self.bind_addr.set_port(port);
        }
        if let Some(dir) = lookup(env_vars::DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup(env_vars::STORAGE_BACKEND) {
            self.storage.backend = backend.parse()?;
        }
        if let Some(list) = lookup(env_vars::NAMESPACES) {
            self.namespaces = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(level) = lookup(env_vars::LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(ServerError::Config("request_timeout_ms must be positive".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ServerError::Config("max_body_bytes must be positive".into()));
        }
        if self.engine.max_put_attempts == 0 {
            return Err(ServerError::Config("engine.max_put_attempts must be positive".into()));
        }
        self.namespace_list().map(|_| ())
    }

    /// The configured namespaces, validated.
    pub fn namespace_list(&self) -> ServerResult<Vec<Namespace>> {
        self.namespaces
            .iter()
            .map(|name| {
                Namespace::new(name.as_str())
                    .map_err(|e| ServerError::Config(format!("namespaces: {e}")))
            })
            .collect()
    }
}
