//! Resource vocabularies, wire models, and manifest parsing for settle.
//!
//! This crate defines the schema layer: the closed string vocabularies the
//! remote API accepts (`SecretType`, `ContainerType`, the IPSec algorithm
//! families) and their process-wide lookup tables, the wire-level resource
//! models and create/update requests, and the TOML resource manifest that
//! users write (`ResourceManifest`) together with its translation into
//! requests.

pub mod manifest;
pub mod resource;
pub mod types;
pub mod vocab;

pub use manifest::{
    parse_manifest_file, parse_manifest_str, ContainerSpec, IpsecPolicySpec, ManifestError,
    PortForwardingSpec, ResourceManifest, ResourceSpec, SecretRefSpec, SecretSpec,
    TimeoutSection,
};
pub use resource::{
    Consumer, Container, ContainerCreate, IpsecPolicy, IpsecPolicyCreate, IpsecPolicyUpdate,
    Lifetime, PortForwarding, PortForwardingCreate, PortForwardingUpdate, RemoteResource,
    ResourceKind, Secret, SecretCreate, SecretMetadata, SecretPayloadUpdate, SecretRef,
};
pub use types::{
    AuthAlgorithm, ContainerType, EncapsulationMode, EncryptionAlgorithm, Pfs, SecretType,
    TransformProtocol,
};
pub use vocab::{
    map, map_auth_algorithm, MappingCompat, VocabError, VocabKind, VocabTable, Vocabulary,
};
