use crate::ApiError;
use settle_schema::{
    Container, ContainerCreate, IpsecPolicy, IpsecPolicyCreate, IpsecPolicyUpdate, Lifetime,
    PortForwarding, PortForwardingCreate, PortForwardingUpdate, Secret, SecretCreate,
    SecretMetadata, SecretPayloadUpdate,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Behavior knobs for the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Reads a new secret or container answers PENDING before it settles.
    pub pending_reads: u32,
    /// DELETEs of an IPSec policy answered with 409 before it is removed.
    pub ipsec_delete_conflicts: u32,
    /// Reads a deleted port forwarding answers DOWN before 404.
    pub port_forwarding_down_reads: u32,
    /// When set, requests must carry this value in `X-Auth-Token`.
    pub auth_token: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            pending_reads: 1,
            ipsec_delete_conflicts: 0,
            port_forwarding_down_reads: 1,
            auth_token: None,
        }
    }
}

/// Secrets whose name starts with this settle in `ERROR`.
pub const FAILING_NAME_PREFIX: &str = "error-";

struct SecretRecord {
    secret: Secret,
    payload: String,
    metadata: BTreeMap<String, String>,
    reads: u32,
}

struct ContainerRecord {
    container: Container,
    reads: u32,
}

struct IpsecPolicyRecord {
    policy: IpsecPolicy,
    conflicts_left: u32,
}

struct PortForwardingRecord {
    floating_ip_id: String,
    pf: PortForwarding,
    /// `Some` once deleted: reads left before the record disappears.
    down_reads_left: Option<u32>,
}

#[derive(Default)]
struct Inner {
    secrets: BTreeMap<String, SecretRecord>,
    containers: BTreeMap<String, ContainerRecord>,
    ipsec_policies: BTreeMap<String, IpsecPolicyRecord>,
    port_forwardings: BTreeMap<String, PortForwardingRecord>,
}

/// In-memory resource state. Reads advance the simulated lifecycles, so
/// every operation takes the lock exclusively.
pub struct Store {
    base_url: String,
    options: ServerOptions,
    inner: Mutex<Inner>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

impl Store {
    pub fn new(base_url: impl Into<String>, options: ServerOptions) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            options,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }

    fn secret_ref(&self, id: &str) -> String {
        format!("{}/v1/secrets/{id}", self.base_url)
    }

    fn container_ref(&self, id: &str) -> String {
        format!("{}/v1/containers/{id}", self.base_url)
    }

    // --- Secrets ---

    /// Returns the new secret's reference.
    pub fn create_secret(&self, req: SecretCreate) -> Result<String, ApiError> {
        if req.name.is_empty() {
            return Err(ApiError::BadRequest("secret name is required".to_owned()));
        }
        let id = new_id();
        let secret_ref = self.secret_ref(&id);
        let mut content_types = BTreeMap::new();
        if !req.payload_content_type.is_empty() {
            content_types.insert("default".to_owned(), req.payload_content_type.clone());
        }
        let created = now();
        let secret = Secret {
            secret_ref: secret_ref.clone(),
            name: req.name,
            algorithm: or_default(req.algorithm, "aes"),
            bit_length: if req.bit_length == 0 { 256 } else { req.bit_length },
            mode: or_default(req.mode, "cbc"),
            secret_type: req.secret_type,
            status: "PENDING".to_owned(),
            creator_id: "settle-server".to_owned(),
            content_types,
            created: created.clone(),
            updated: created,
            expiration: req.expiration,
        };
        self.lock().secrets.insert(
            id,
            SecretRecord {
                secret,
                payload: req.payload,
                metadata: BTreeMap::new(),
                reads: 0,
            },
        );
        Ok(secret_ref)
    }

    pub fn get_secret(&self, id: &str) -> Option<Secret> {
        let pending_reads = self.options.pending_reads;
        let mut inner = self.lock();
        let record = inner.secrets.get_mut(id)?;
        record.reads += 1;
        if record.reads > pending_reads && record.secret.status == "PENDING" {
            record.secret.status = if record.secret.name.starts_with(FAILING_NAME_PREFIX) {
                "ERROR".to_owned()
            } else {
                "ACTIVE".to_owned()
            };
        }
        Some(record.secret.clone())
    }

    pub fn secret_payload(&self, id: &str) -> Option<String> {
        self.lock().secrets.get(id).map(|r| r.payload.clone())
    }

    pub fn update_secret_payload(
        &self,
        id: &str,
        update: SecretPayloadUpdate,
    ) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.secrets.get_mut(id).ok_or(ApiError::NotFound)?;
        if !record.payload.is_empty() {
            return Err(ApiError::Conflict("secret already has a payload".to_owned()));
        }
        record.payload = update.payload;
        record
            .secret
            .content_types
            .insert("default".to_owned(), update.payload_content_type);
        record.secret.updated = now();
        Ok(())
    }

    pub fn put_secret_metadata(
        &self,
        id: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<SecretMetadata, ApiError> {
        let mut inner = self.lock();
        let record = inner.secrets.get_mut(id).ok_or(ApiError::NotFound)?;
        record.metadata = metadata;
        Ok(SecretMetadata {
            metadata: record.metadata.clone(),
        })
    }

    pub fn get_secret_metadata(&self, id: &str) -> Option<SecretMetadata> {
        self.lock().secrets.get(id).map(|r| SecretMetadata {
            metadata: r.metadata.clone(),
        })
    }

    pub fn delete_secret(&self, id: &str) -> bool {
        self.lock().secrets.remove(id).is_some()
    }

    // --- Containers ---

    pub fn create_container(&self, req: ContainerCreate) -> Result<String, ApiError> {
        if req.name.is_empty() {
            return Err(ApiError::BadRequest("container name is required".to_owned()));
        }
        let mut inner = self.lock();
        for secret in &req.secret_refs {
            let id = secret.secret_ref.rsplit('/').next().unwrap_or_default();
            if !inner.secrets.contains_key(id) {
                return Err(ApiError::BadRequest(format!(
                    "secret ref '{}' does not exist",
                    secret.secret_ref
                )));
            }
        }
        let id = new_id();
        let container_ref = self.container_ref(&id);
        let created = now();
        let container = Container {
            container_ref: container_ref.clone(),
            name: req.name,
            container_type: req.container_type,
            status: "PENDING".to_owned(),
            creator_id: "settle-server".to_owned(),
            secret_refs: req.secret_refs,
            consumers: Vec::new(),
            created: created.clone(),
            updated: created,
        };
        inner
            .containers
            .insert(id, ContainerRecord { container, reads: 0 });
        Ok(container_ref)
    }

    pub fn get_container(&self, id: &str) -> Option<Container> {
        let pending_reads = self.options.pending_reads;
        let mut inner = self.lock();
        let record = inner.containers.get_mut(id)?;
        record.reads += 1;
        if record.reads > pending_reads {
            record.container.status = "ACTIVE".to_owned();
        }
        Some(record.container.clone())
    }

    pub fn delete_container(&self, id: &str) -> bool {
        self.lock().containers.remove(id).is_some()
    }

    // --- IPSec policies ---

    pub fn create_ipsec_policy(&self, req: IpsecPolicyCreate) -> IpsecPolicy {
        let policy = IpsecPolicy {
            id: new_id(),
            name: req.name,
            description: req.description,
            tenant_id: req.tenant_id,
            auth_algorithm: req.auth_algorithm,
            encapsulation_mode: req.encapsulation_mode,
            encryption_algorithm: req.encryption_algorithm,
            pfs: req.pfs,
            transform_protocol: req.transform_protocol,
            lifetime: Some(req.lifetime.unwrap_or(Lifetime {
                units: "seconds".to_owned(),
                value: 3600,
            })),
        };
        self.lock().ipsec_policies.insert(
            policy.id.clone(),
            IpsecPolicyRecord {
                policy: policy.clone(),
                conflicts_left: self.options.ipsec_delete_conflicts,
            },
        );
        policy
    }

    pub fn get_ipsec_policy(&self, id: &str) -> Option<IpsecPolicy> {
        self.lock().ipsec_policies.get(id).map(|r| r.policy.clone())
    }

    pub fn update_ipsec_policy(
        &self,
        id: &str,
        update: IpsecPolicyUpdate,
    ) -> Result<IpsecPolicy, ApiError> {
        let mut inner = self.lock();
        let record = inner.ipsec_policies.get_mut(id).ok_or(ApiError::NotFound)?;
        let policy = &mut record.policy;
        if let Some(name) = update.name {
            policy.name = name;
        }
        if let Some(description) = update.description {
            policy.description = description;
        }
        if let Some(v) = update.auth_algorithm {
            policy.auth_algorithm = v;
        }
        if let Some(v) = update.encapsulation_mode {
            policy.encapsulation_mode = v;
        }
        if let Some(v) = update.encryption_algorithm {
            policy.encryption_algorithm = v;
        }
        if let Some(v) = update.pfs {
            policy.pfs = v;
        }
        if let Some(v) = update.transform_protocol {
            policy.transform_protocol = v;
        }
        Ok(policy.clone())
    }

    /// Fails with `Conflict` while the configured number of conflicts has
    /// not been used up.
    pub fn delete_ipsec_policy(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.ipsec_policies.get_mut(id).ok_or(ApiError::NotFound)?;
        if record.conflicts_left > 0 {
            record.conflicts_left -= 1;
            return Err(ApiError::Conflict(format!(
                "IPsecPolicy {id} is in use by existing connections"
            )));
        }
        inner.ipsec_policies.remove(id);
        Ok(())
    }

    // --- Port forwardings ---

    pub fn create_port_forwarding(
        &self,
        floating_ip_id: &str,
        req: PortForwardingCreate,
    ) -> Result<PortForwarding, ApiError> {
        let mut inner = self.lock();
        let clash = inner.port_forwardings.values().any(|r| {
            r.floating_ip_id == floating_ip_id
                && r.down_reads_left.is_none()
                && r.pf.external_port == req.external_port
                && r.pf.protocol == req.protocol
        });
        if clash {
            return Err(ApiError::Conflict(format!(
                "external port {} already forwarded on {floating_ip_id}",
                req.external_port
            )));
        }
        let pf = PortForwarding {
            id: new_id(),
            internal_port_id: req.internal_port_id,
            internal_ip_address: req.internal_ip_address,
            internal_port: req.internal_port,
            external_port: req.external_port,
            protocol: req.protocol,
            status: Some("ACTIVE".to_owned()),
        };
        inner.port_forwardings.insert(
            pf.id.clone(),
            PortForwardingRecord {
                floating_ip_id: floating_ip_id.to_owned(),
                pf: pf.clone(),
                down_reads_left: None,
            },
        );
        Ok(pf)
    }

    pub fn get_port_forwarding(&self, floating_ip_id: &str, id: &str) -> Option<PortForwarding> {
        let mut inner = self.lock();
        let record = inner.port_forwardings.get_mut(id)?;
        if record.floating_ip_id != floating_ip_id {
            return None;
        }
        let down_reads_left = record.down_reads_left;
        match down_reads_left {
            None => Some(record.pf.clone()),
            Some(left) if left > 0 => {
                record.down_reads_left = Some(left - 1);
                Some(record.pf.clone())
            }
            Some(_) => {
                inner.port_forwardings.remove(id);
                None
            }
        }
    }

    pub fn update_port_forwarding(
        &self,
        floating_ip_id: &str,
        id: &str,
        update: PortForwardingUpdate,
    ) -> Result<PortForwarding, ApiError> {
        let mut inner = self.lock();
        let record = inner
            .port_forwardings
            .get_mut(id)
            .filter(|r| r.floating_ip_id == floating_ip_id && r.down_reads_left.is_none())
            .ok_or(ApiError::NotFound)?;
        let pf = &mut record.pf;
        if let Some(v) = update.internal_port_id {
            pf.internal_port_id = v;
        }
        if let Some(v) = update.internal_ip_address {
            pf.internal_ip_address = v;
        }
        if let Some(v) = update.internal_port {
            pf.internal_port = v;
        }
        if let Some(v) = update.external_port {
            pf.external_port = v;
        }
        if let Some(v) = update.protocol {
            pf.protocol = v;
        }
        Ok(pf.clone())
    }

    /// Marks the port forwarding `DOWN`; it disappears after the configured
    /// number of further reads.
    pub fn delete_port_forwarding(&self, floating_ip_id: &str, id: &str) -> Result<(), ApiError> {
        let down_reads = self.options.port_forwarding_down_reads;
        let mut inner = self.lock();
        let record = inner
            .port_forwardings
            .get_mut(id)
            .filter(|r| r.floating_ip_id == floating_ip_id && r.down_reads_left.is_none())
            .ok_or(ApiError::NotFound)?;
        record.pf.status = Some("DOWN".to_owned());
        record.down_reads_left = Some(down_reads);
        Ok(())
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value
    }
}
