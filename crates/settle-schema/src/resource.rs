use crate::types::{
    AuthAlgorithm, ContainerType, EncapsulationMode, EncryptionAlgorithm, Pfs, SecretType,
    TransformProtocol,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource kinds the remote API manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Secret,
    SecretMetadata,
    Container,
    IpsecPolicy,
    PortForwarding,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Secret => "secret",
            ResourceKind::SecretMetadata => "secret-metadata",
            ResourceKind::Container => "container",
            ResourceKind::IpsecPolicy => "ipsec-policy",
            ResourceKind::PortForwarding => "port-forwarding",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "secret" => Some(ResourceKind::Secret),
            "secret-metadata" => Some(ResourceKind::SecretMetadata),
            "container" => Some(ResourceKind::Container),
            "ipsec-policy" => Some(ResourceKind::IpsecPolicy),
            "port-forwarding" => Some(ResourceKind::PortForwarding),
            _ => None,
        }
    }

    /// JSON key the networking API wraps single resources in.
    pub fn envelope(self) -> Option<&'static str> {
        match self {
            ResourceKind::IpsecPolicy => Some("ipsecpolicy"),
            ResourceKind::PortForwarding => Some("port_forwarding"),
            ResourceKind::Secret | ResourceKind::SecretMetadata | ResourceKind::Container => None,
        }
    }

    /// Field of a create response that carries the new resource's reference.
    pub fn reference_field(self) -> &'static str {
        match self {
            ResourceKind::Secret => "secret_ref",
            ResourceKind::Container => "container_ref",
            ResourceKind::SecretMetadata => "metadata_ref",
            ResourceKind::IpsecPolicy | ResourceKind::PortForwarding => "id",
        }
    }

    /// Whether the remote needs a parent id (the floating IP) to address it.
    pub fn needs_parent(self) -> bool {
        matches!(self, ResourceKind::PortForwarding)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A resource snapshot decoded from the remote API.
pub trait RemoteResource: DeserializeOwned + Send {
    const KIND: ResourceKind;

    /// Status string reported by the remote, if this kind has one.
    fn status(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub secret_ref: String,
    pub name: String,
    pub algorithm: String,
    pub bit_length: u32,
    pub mode: String,
    pub secret_type: SecretType,
    pub status: String,
    pub creator_id: String,
    pub content_types: BTreeMap<String, String>,
    pub created: String,
    pub updated: String,
    pub expiration: Option<String>,
}

impl RemoteResource for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn status(&self) -> Option<&str> {
        non_empty(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretMetadata {
    pub metadata: BTreeMap<String, String>,
}

impl RemoteResource for SecretMetadata {
    const KIND: ResourceKind = ResourceKind::SecretMetadata;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretRef {
    pub name: String,
    pub secret_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumer {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub container_ref: String,
    pub name: String,
    #[serde(rename = "type")]
    pub container_type: ContainerType,
    pub status: String,
    pub creator_id: String,
    pub secret_refs: Vec<SecretRef>,
    pub consumers: Vec<Consumer>,
    pub created: String,
    pub updated: String,
}

impl RemoteResource for Container {
    const KIND: ResourceKind = ResourceKind::Container;

    fn status(&self) -> Option<&str> {
        non_empty(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lifetime {
    pub units: String,
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpsecPolicy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tenant_id: String,
    pub auth_algorithm: AuthAlgorithm,
    pub encapsulation_mode: EncapsulationMode,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub pfs: Pfs,
    pub transform_protocol: TransformProtocol,
    pub lifetime: Option<Lifetime>,
}

impl RemoteResource for IpsecPolicy {
    const KIND: ResourceKind = ResourceKind::IpsecPolicy;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortForwarding {
    pub id: String,
    pub internal_port_id: String,
    pub internal_ip_address: String,
    pub internal_port: u16,
    pub external_port: u16,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RemoteResource for PortForwarding {
    const KIND: ResourceKind = ResourceKind::PortForwarding;

    fn status(&self) -> Option<&str> {
        self.status.as_deref().and_then(non_empty)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// --- Requests ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bit_length: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload_content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload_content_encoding: String,
    #[serde(default, skip_serializing_if = "SecretType::is_unset")]
    pub secret_type: SecretType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Payload upload for an existing secret. The content type is always sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayloadUpdate {
    pub payload: String,
    pub payload_content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload_content_encoding: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerCreate {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "ContainerType::is_unset")]
    pub container_type: ContainerType,
    #[serde(default)]
    pub secret_refs: Vec<SecretRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecPolicyCreate {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "AuthAlgorithm::is_unset")]
    pub auth_algorithm: AuthAlgorithm,
    #[serde(default, skip_serializing_if = "EncapsulationMode::is_unset")]
    pub encapsulation_mode: EncapsulationMode,
    #[serde(default, skip_serializing_if = "EncryptionAlgorithm::is_unset")]
    pub encryption_algorithm: EncryptionAlgorithm,
    #[serde(default, skip_serializing_if = "Pfs::is_unset")]
    pub pfs: Pfs,
    #[serde(default, skip_serializing_if = "TransformProtocol::is_unset")]
    pub transform_protocol: TransformProtocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<Lifetime>,
    /// Extra driver-specific fields passed through verbatim.
    #[serde(flatten)]
    pub value_specs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecPolicyUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_algorithm: Option<AuthAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encapsulation_mode: Option<EncapsulationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<EncryptionAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfs: Option<Pfs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_protocol: Option<TransformProtocol>,
}

impl IpsecPolicyUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwardingCreate {
    pub internal_port_id: String,
    pub internal_ip_address: String,
    pub internal_port: u16,
    pub external_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwardingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_port_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl PortForwardingUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_create_omits_empty_fields() {
        let req = SecretCreate {
            name: "db-password".to_owned(),
            payload: "hunter2".to_owned(),
            secret_type: SecretType::Passphrase,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "db-password",
                "payload": "hunter2",
                "secret_type": "passphrase",
            })
        );
    }

    #[test]
    fn secret_decodes_partial_payload() {
        let secret: Secret = serde_json::from_str(
            r#"{"secret_ref": "https://km/v1/secrets/abc", "status": "PENDING", "secret_type": "opaque"}"#,
        )
        .unwrap();
        assert_eq!(secret.status(), Some("PENDING"));
        assert_eq!(secret.secret_type, SecretType::Opaque);
        assert_eq!(secret.bit_length, 0);
    }

    #[test]
    fn empty_status_is_none() {
        let container = Container::default();
        assert_eq!(container.status(), None);
        let pf = PortForwarding {
            status: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(pf.status(), None);
    }

    #[test]
    fn container_type_uses_type_key() {
        let req = ContainerCreate {
            name: "tls".to_owned(),
            container_type: ContainerType::Certificate,
            secret_refs: vec![SecretRef {
                name: "certificate".to_owned(),
                secret_ref: "https://km/v1/secrets/1".to_owned(),
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "certificate");
        assert_eq!(json["secret_refs"][0]["name"], "certificate");
    }

    #[test]
    fn ipsec_value_specs_are_flattened() {
        let mut req = IpsecPolicyCreate {
            name: "p1".to_owned(),
            pfs: Pfs::Group14,
            ..Default::default()
        };
        req.value_specs
            .insert("driver_hint".to_owned(), "strongswan".to_owned());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["pfs"], "group14");
        assert_eq!(json["driver_hint"], "strongswan");
        assert!(json.get("auth_algorithm").is_none());
    }

    #[test]
    fn update_is_empty_detects_no_changes() {
        assert!(IpsecPolicyUpdate::default().is_empty());
        assert!(!IpsecPolicyUpdate {
            pfs: Some(Pfs::Group5),
            ..Default::default()
        }
        .is_empty());
        assert!(PortForwardingUpdate::default().is_empty());
    }

    #[test]
    fn resource_kind_names_roundtrip() {
        for kind in [
            ResourceKind::Secret,
            ResourceKind::SecretMetadata,
            ResourceKind::Container,
            ResourceKind::IpsecPolicy,
            ResourceKind::PortForwarding,
        ] {
            assert_eq!(ResourceKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_name("volume"), None);
    }
}
