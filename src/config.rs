//! Process configuration for the server binaries.
//!
//! Both binaries read an optional TOML file and apply command-line
//! overrides on top. Every field has a default, so an empty file and a
//! missing file behave the same.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::proto::{REGISTRATION_PORT, SERVICE_PORT};

/// Configuration of the naming server binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Address both endpoints bind to.
    pub bind: IpAddr,
    /// Port of the client service endpoint.
    pub service_port: u16,
    /// Port of the storage-server registration endpoint.
    pub registration_port: u16,
}

impl Default for NamingConfig {
    fn default() -> NamingConfig {
        NamingConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            service_port: SERVICE_PORT,
            registration_port: REGISTRATION_PORT,
        }
    }
}

impl NamingConfig {
    /// Loads the configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<NamingConfig, ConfigError> {
        load_toml(path)
    }
}

/// Configuration of a storage server binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Local directory the served files live under.
    pub root: PathBuf,
    /// Address both skeletons bind to.
    pub bind: IpAddr,
    /// Port of the data-plane endpoint; `0` selects an ephemeral port.
    pub storage_port: u16,
    /// Port of the control-plane endpoint; `0` selects an ephemeral port.
    pub command_port: u16,
    /// Address other hosts reach this server at.
    pub advertise: IpAddr,
    /// The naming server's registration endpoint.
    pub naming: SocketAddr,
}

impl Default for StorageConfig {
    fn default() -> StorageConfig {
        StorageConfig {
            root: PathBuf::from("storage"),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            storage_port: 0,
            command_port: 0,
            advertise: IpAddr::V4(Ipv4Addr::LOCALHOST),
            naming: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), REGISTRATION_PORT),
        }
    }
}

impl StorageConfig {
    /// Loads the configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<StorageConfig, ConfigError> {
        load_toml(path)
    }
}

/// Failures while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(io::Error),
    /// The file is not valid TOML for the expected structure.
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read configuration: {err}"),
            ConfigError::Parse(err) => write!(f, "cannot parse configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn load_toml<T: DeserializeOwned>(path: &std::path::Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&text).map_err(ConfigError::Parse)
}
