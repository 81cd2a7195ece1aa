use crate::RemoteError;
use serde::{Deserialize, Serialize};
use settle_schema::{MappingCompat, ResourceKind, TimeoutSection};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Send `sha512` as `sha384`, as older records were created.
    #[serde(default)]
    pub legacy_auth_algorithm_mapping: bool,
}

impl RemoteConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
            timeouts: Timeouts::default(),
            legacy_auth_algorithm_mapping: false,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn mapping_compat(&self) -> MappingCompat {
        if self.legacy_auth_algorithm_mapping {
            MappingCompat::Legacy
        } else {
            MappingCompat::Current
        }
    }

    /// Load config from `~/.config/settle/remote.json`.
    pub fn load_default() -> Result<Self, RemoteError> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid remote config: {e}")))?;
        config.url = config.url.trim_end_matches('/').to_owned();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, RemoteError> {
    let home = std::env::var("HOME").map_err(|_| RemoteError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/settle/remote.json"))
}

/// Create and delete deadlines for one resource kind, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTimeouts {
    pub create_secs: u64,
    pub delete_secs: u64,
}

impl OperationTimeouts {
    pub const fn uniform(secs: u64) -> Self {
        Self {
            create_secs: secs,
            delete_secs: secs,
        }
    }

    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }

    /// Apply per-manifest overrides.
    #[must_use]
    pub fn overridden_by(self, section: &TimeoutSection) -> Self {
        Self {
            create_secs: section.create_secs.unwrap_or(self.create_secs),
            delete_secs: section.delete_secs.unwrap_or(self.delete_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub secret: OperationTimeouts,
    pub container: OperationTimeouts,
    pub ipsec_policy: OperationTimeouts,
    pub port_forwarding: OperationTimeouts,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            secret: OperationTimeouts::uniform(30 * 60),
            container: OperationTimeouts::uniform(30 * 60),
            ipsec_policy: OperationTimeouts::uniform(10 * 60),
            port_forwarding: OperationTimeouts::uniform(10 * 60),
        }
    }
}

impl Timeouts {
    pub fn for_kind(&self, kind: ResourceKind) -> OperationTimeouts {
        match kind {
            ResourceKind::Secret | ResourceKind::SecretMetadata => self.secret,
            ResourceKind::Container => self.container,
            ResourceKind::IpsecPolicy => self.ipsec_policy,
            ResourceKind::PortForwarding => self.port_forwarding,
        }
    }

    pub fn for_kind_mut(&mut self, kind: ResourceKind) -> &mut OperationTimeouts {
        match kind {
            ResourceKind::Secret | ResourceKind::SecretMetadata => &mut self.secret,
            ResourceKind::Container => &mut self.container,
            ResourceKind::IpsecPolicy => &mut self.ipsec_policy,
            ResourceKind::PortForwarding => &mut self.port_forwarding,
        }
    }
}
