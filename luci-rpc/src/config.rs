//! Device profiles for luci-rpc
//!
//! Config files are stored in platform-appropriate locations:
//! - Linux: ~/.config/luci-rpc/
//! - macOS: ~/Library/Application Support/luci-rpc/
//! - Windows: %APPDATA%\luci-rpc\

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::session::{Credentials, ServerEndpoint};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid device profiles: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to encode device profiles: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("No platform config directory")]
    NoConfigDir,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Device used when none is named
    pub default_device: Option<String>,

    /// Known routers
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// A known router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Profile name
    pub name: String,

    /// Hostname or IP address
    pub host: String,

    /// 0 = scheme default
    #[serde(default)]
    pub port: u16,

    /// Use HTTPS
    #[serde(default)]
    pub tls: bool,

    /// Check the router's certificate
    #[serde(default)]
    pub verify_tls: bool,

    #[serde(default = "default_username")]
    pub username: String,

    /// Stored in plain text; leave unset to supply it at run time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connect/keep-alive timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_username() -> String {
    "root".to_string()
}
fn default_timeout() -> u64 {
    crate::DEFAULT_TIMEOUT_SECS
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: 0,
            tls: false,
            verify_tls: false,
            username: default_username(),
            password: None,
            timeout: default_timeout(),
        }
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(self.host.clone())
            .with_port(self.port)
            .with_tls(self.tls)
            .with_verify_tls(self.verify_tls)
    }

    /// Credentials for this device; `password` overrides the stored one
    pub fn credentials(&self, password: Option<&str>) -> Credentials {
        let password = password
            .map(String::from)
            .or_else(|| self.password.clone())
            .unwrap_or_default();
        Credentials::new(self.username.clone(), password).with_timeout(self.timeout)
    }
}

impl Config {
    /// `<platform config dir>/luci-rpc/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("luci-rpc").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Read device profiles.
    ///
    /// An explicit `path` must exist. The default file may be absent, in
    /// which case no devices are known.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if !required && e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write device profiles and return the file written.
    ///
    /// The file is replaced in one rename and is readable by its owner only,
    /// since profiles may carry router passwords.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging = path.with_extension("toml.tmp");
        std::fs::write(&staging, toml::to_string_pretty(self)?)?;
        restrict_to_owner(&staging)?;
        std::fs::rename(&staging, &path)?;

        tracing::debug!("Saved {} device profile(s) to {}", self.devices.len(), path.display());
        Ok(path)
    }

    /// Get device config by name
    pub fn get_device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// The named default device, or the only one configured
    pub fn default_device(&self) -> Option<&DeviceConfig> {
        match self.default_device {
            Some(ref name) => self.get_device(name),
            None if self.devices.len() == 1 => self.devices.first(),
            None => None,
        }
    }

    /// Add or update device
    pub fn upsert_device(&mut self, device: DeviceConfig) {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.name == device.name) {
            *existing = device;
        } else {
            self.devices.push(device);
        }
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
