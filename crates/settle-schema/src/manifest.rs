use crate::resource::{
    ContainerCreate, IpsecPolicyCreate, Lifetime, PortForwardingCreate, ResourceKind,
    SecretCreate, SecretRef,
};
use crate::types::{
    AuthAlgorithm, ContainerType, EncapsulationMode, EncryptionAlgorithm, Pfs, SecretType,
    TransformProtocol,
};
use crate::vocab::{check, map, map_auth_algorithm, MappingCompat, VocabError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("{kind}.{field} must not be empty")]
    EmptyField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("{kind}.{field} must be a port in 1-65535")]
    InvalidPort {
        kind: &'static str,
        field: &'static str,
    },
    #[error("port-forwarding.protocol must be 'tcp' or 'udp', got '{0}'")]
    InvalidProtocol(String),
    #[error(transparent)]
    Vocab(#[from] VocabError),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResourceManifest {
    pub manifest_version: u32,
    pub resource: ResourceSpec,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

/// Per-manifest overrides of the configured create and delete deadlines, in
/// seconds. Updates are synchronous and have none.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSection {
    #[serde(default)]
    pub create_secs: Option<u64>,
    #[serde(default)]
    pub delete_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceSpec {
    Secret(SecretSpec),
    Container(ContainerSpec),
    IpsecPolicy(IpsecPolicySpec),
    PortForwarding(PortForwardingSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Secret(_) => ResourceKind::Secret,
            ResourceSpec::Container(_) => ResourceKind::Container,
            ResourceSpec::IpsecPolicy(_) => ResourceKind::IpsecPolicy,
            ResourceSpec::PortForwarding(_) => ResourceKind::PortForwarding,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecretSpec {
    pub name: String,
    pub algorithm: String,
    pub bit_length: u32,
    pub mode: String,
    pub secret_type: String,
    pub payload: String,
    pub payload_content_type: String,
    pub payload_content_encoding: String,
    pub expiration: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SecretSpec {
    pub fn to_request(&self) -> SecretCreate {
        SecretCreate {
            name: self.name.clone(),
            algorithm: self.algorithm.clone(),
            bit_length: self.bit_length,
            mode: self.mode.clone(),
            payload: self.payload.clone(),
            payload_content_type: self.payload_content_type.clone(),
            payload_content_encoding: self.payload_content_encoding.clone(),
            secret_type: map::<SecretType>(&self.secret_type),
            expiration: self.expiration.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecretRefSpec {
    pub name: String,
    pub secret_ref: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub container_type: String,
    pub secret_refs: Vec<SecretRefSpec>,
}

impl ContainerSpec {
    pub fn to_request(&self) -> ContainerCreate {
        ContainerCreate {
            name: self.name.clone(),
            container_type: map::<ContainerType>(&self.container_type),
            secret_refs: self
                .secret_refs
                .iter()
                .map(|r| SecretRef {
                    name: r.name.clone(),
                    secret_ref: r.secret_ref.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct IpsecPolicySpec {
    pub name: String,
    pub description: String,
    pub tenant_id: String,
    pub auth_algorithm: String,
    pub encapsulation_mode: String,
    pub encryption_algorithm: String,
    pub pfs: String,
    pub transform_protocol: String,
    pub lifetime: Option<Lifetime>,
    pub value_specs: BTreeMap<String, String>,
}

impl IpsecPolicySpec {
    pub fn to_request(&self, compat: MappingCompat) -> IpsecPolicyCreate {
        IpsecPolicyCreate {
            name: self.name.clone(),
            description: self.description.clone(),
            tenant_id: self.tenant_id.clone(),
            auth_algorithm: map_auth_algorithm(&self.auth_algorithm, compat),
            encapsulation_mode: map::<EncapsulationMode>(&self.encapsulation_mode),
            encryption_algorithm: map::<EncryptionAlgorithm>(&self.encryption_algorithm),
            pfs: map::<Pfs>(&self.pfs),
            transform_protocol: map::<TransformProtocol>(&self.transform_protocol),
            lifetime: self.lifetime.clone(),
            value_specs: self.value_specs.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortForwardingSpec {
    pub floating_ip_id: String,
    pub internal_port_id: String,
    pub internal_ip_address: String,
    pub internal_port: u16,
    pub external_port: u16,
    pub protocol: String,
}

impl PortForwardingSpec {
    pub fn to_request(&self) -> PortForwardingCreate {
        PortForwardingCreate {
            internal_port_id: self.internal_port_id.clone(),
            internal_ip_address: self.internal_ip_address.clone(),
            internal_port: self.internal_port,
            external_port: self.external_port,
            protocol: self.protocol.clone(),
        }
    }
}

fn require(kind: &'static str, field: &'static str, value: &str) -> Result<(), ManifestError> {
    if value.trim().is_empty() {
        return Err(ManifestError::EmptyField { kind, field });
    }
    Ok(())
}

fn require_port(kind: &'static str, field: &'static str, port: u16) -> Result<(), ManifestError> {
    if port == 0 {
        return Err(ManifestError::InvalidPort { kind, field });
    }
    Ok(())
}

impl ResourceManifest {
    /// Reject values the vocabularies do not know and fields the remote
    /// requires. Translation itself never fails: anything unknown that
    /// slips past here is sent as the zero value.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }
        match &self.resource {
            ResourceSpec::Secret(s) => {
                require("secret", "name", &s.name)?;
                check::<SecretType>(&s.secret_type)?;
            }
            ResourceSpec::Container(c) => {
                require("container", "name", &c.name)?;
                check::<ContainerType>(&c.container_type)?;
                for r in &c.secret_refs {
                    require("container", "secret_refs.secret_ref", &r.secret_ref)?;
                }
            }
            ResourceSpec::IpsecPolicy(p) => {
                check::<AuthAlgorithm>(&p.auth_algorithm)?;
                check::<EncapsulationMode>(&p.encapsulation_mode)?;
                check::<EncryptionAlgorithm>(&p.encryption_algorithm)?;
                check::<Pfs>(&p.pfs)?;
                check::<TransformProtocol>(&p.transform_protocol)?;
            }
            ResourceSpec::PortForwarding(pf) => {
                const KIND: &str = "port-forwarding";
                require(KIND, "floating_ip_id", &pf.floating_ip_id)?;
                require(KIND, "internal_port_id", &pf.internal_port_id)?;
                require(KIND, "internal_ip_address", &pf.internal_ip_address)?;
                require_port(KIND, "internal_port", pf.internal_port)?;
                require_port(KIND, "external_port", pf.external_port)?;
                if !matches!(pf.protocol.as_str(), "tcp" | "udp") {
                    return Err(ManifestError::InvalidProtocol(pf.protocol.clone()));
                }
            }
        }
        Ok(())
    }
}

pub fn parse_manifest_str(input: &str) -> Result<ResourceManifest, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ResourceManifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
