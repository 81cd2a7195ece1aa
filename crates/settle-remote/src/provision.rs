//! Create, update, delete, and read operations per resource kind.
//!
//! Calls the remote answers asynchronously are followed by a reconciliation
//! through [`Reconciler`]; the rest return as soon as the remote replies.

use crate::config::{RemoteConfig, Timeouts};
use crate::probe::{decode, unwrap_envelope, CreationProbe, DeletionProbe};
use crate::{paths, ProvisionError, RemoteError, ResourceApi};
use serde::Serialize;
use serde_json::{json, Value};
use settle_core::{
    resolve_reference, CancelToken, Clock, ErrorPolicy, LifecycleState, Probe, ReconcileConfig,
    ReconcileError, Reconciler, Settled, SystemClock,
};
use settle_schema::{
    Container, ContainerCreate, IpsecPolicy, IpsecPolicyCreate, IpsecPolicyUpdate, MappingCompat,
    PortForwarding, PortForwardingCreate, PortForwardingUpdate, RemoteResource, ResourceKind,
    Secret, SecretCreate, SecretMetadata, SecretPayloadUpdate,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// HTTP status the networking API answers while an IPSec policy is still
/// referenced by a connection.
const IPSEC_POLICY_IN_USE: u16 = 409;

const PORT_FORWARDING_DELETE_DELAY: Duration = Duration::from_secs(5);
const PORT_FORWARDING_DELETE_MIN_TIMEOUT: Duration = Duration::from_secs(3);

/// A resource that reached its target state.
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned<T> {
    pub id: String,
    pub resource: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedSecret {
    pub id: String,
    pub secret: Secret,
    pub metadata: BTreeMap<String, String>,
}

pub struct Provisioner<A, C = SystemClock> {
    api: A,
    timeouts: Timeouts,
    compat: MappingCompat,
    clock: C,
    cancel: Option<CancelToken>,
}

impl<A: ResourceApi> Provisioner<A> {
    pub fn new(api: A, config: &RemoteConfig) -> Self {
        Self {
            api,
            timeouts: config.timeouts,
            compat: config.mapping_compat(),
            clock: SystemClock,
            cancel: None,
        }
    }
}

impl<A: ResourceApi, C: Clock> Provisioner<A, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Provisioner<A, C2> {
        Provisioner {
            api: self.api,
            timeouts: self.timeouts,
            compat: self.compat,
            clock,
            cancel: self.cancel,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn mapping_compat(&self) -> MappingCompat {
        self.compat
    }

    fn reconcile<P: Probe>(
        &self,
        probe: &P,
        config: &ReconcileConfig,
    ) -> Result<Settled<P::Resource>, ReconcileError> {
        Reconciler::new(probe, config)
            .with_clock(&self.clock)
            .with_cancel(self.cancel.clone())
            .run()
    }

    /// Wait for a freshly created resource to become `ACTIVE` and return its
    /// final snapshot.
    fn await_active<T: RemoteResource>(
        &self,
        path: &str,
        id: &str,
        timeout: Duration,
    ) -> Result<T, ProvisionError> {
        let probe: CreationProbe<'_, A, T> = CreationProbe::new(&self.api, path, id);
        let config = ReconcileConfig::await_creation(timeout);
        let settled = self.reconcile(&probe, &config)?;
        match settled.resource {
            Some(resource) => Ok(resource),
            None => self.get(path),
        }
    }

    fn get<T: RemoteResource>(&self, path: &str) -> Result<T, ProvisionError> {
        Ok(decode(self.api.get(path)?)?)
    }

    // --- Secrets ---

    pub fn create_secret(
        &self,
        request: &SecretCreate,
        metadata: &BTreeMap<String, String>,
    ) -> Result<ProvisionedSecret, ProvisionError> {
        let reply = self.api.create(paths::SECRETS, &to_body(request)?)?;
        let id = reference_id(ResourceKind::Secret, &reply)?;
        info!(secret_id = %id, name = %request.name, "secret created, waiting for ACTIVE");

        let timeout = self.timeouts.secret.create();
        let secret: Secret = self.await_active(&paths::secret(&id), &id, timeout)?;

        let metadata = if metadata.is_empty() {
            BTreeMap::new()
        } else {
            self.set_secret_metadata(&id, metadata)?.metadata
        };
        Ok(ProvisionedSecret {
            id,
            secret,
            metadata,
        })
    }

    /// Replace a secret's metadata and wait until it reads back.
    pub fn set_secret_metadata(
        &self,
        id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<SecretMetadata, ProvisionError> {
        let path = paths::secret_metadata(id);
        self.api.update(&path, &json!({ "metadata": metadata }))?;
        info!(
            secret_id = %id,
            keys = metadata.len(),
            "secret metadata set, waiting for it to appear"
        );
        self.await_active(&path, id, self.timeouts.secret.create())
    }

    pub fn update_secret_payload(
        &self,
        id: &str,
        update: &SecretPayloadUpdate,
    ) -> Result<(), ProvisionError> {
        self.api.update(&paths::secret(id), &to_body(update)?)?;
        info!(secret_id = %id, "secret payload updated");
        Ok(())
    }

    pub fn get_secret(&self, id: &str) -> Result<Secret, ProvisionError> {
        self.get(&paths::secret(id))
    }

    pub fn get_secret_metadata(&self, id: &str) -> Result<SecretMetadata, ProvisionError> {
        self.get(&paths::secret_metadata(id))
    }

    pub fn delete_secret(&self, id: &str) -> Result<Settled<()>, ProvisionError> {
        let probe =
            DeletionProbe::reissue(&self.api, ResourceKind::Secret, paths::secret(id), id);
        let config = ReconcileConfig::await_deletion(self.timeouts.secret.delete());
        let settled = self.reconcile(&probe, &config)?;
        info!(secret_id = %id, polls = settled.polls, "secret deleted");
        Ok(settled)
    }

    // --- Containers ---

    pub fn create_container(
        &self,
        request: &ContainerCreate,
    ) -> Result<Provisioned<Container>, ProvisionError> {
        let reply = self.api.create(paths::CONTAINERS, &to_body(request)?)?;
        let id = reference_id(ResourceKind::Container, &reply)?;
        info!(container_id = %id, name = %request.name, "container created, waiting for ACTIVE");

        let timeout = self.timeouts.container.create();
        let resource = self.await_active(&paths::container(&id), &id, timeout)?;
        Ok(Provisioned { id, resource })
    }

    pub fn get_container(&self, id: &str) -> Result<Container, ProvisionError> {
        self.get(&paths::container(id))
    }

    pub fn delete_container(&self, id: &str) -> Result<Settled<()>, ProvisionError> {
        let probe =
            DeletionProbe::reissue(&self.api, ResourceKind::Container, paths::container(id), id);
        let config = ReconcileConfig::await_deletion(self.timeouts.container.delete());
        let settled = self.reconcile(&probe, &config)?;
        info!(container_id = %id, polls = settled.polls, "container deleted");
        Ok(settled)
    }

    // --- IPSec policies ---

    pub fn create_ipsec_policy(
        &self,
        request: &IpsecPolicyCreate,
    ) -> Result<Provisioned<IpsecPolicy>, ProvisionError> {
        let body = enveloped(ResourceKind::IpsecPolicy, request)?;
        let policy: IpsecPolicy = decode(self.api.create(paths::IPSEC_POLICIES, &body)?)?;
        if policy.id.is_empty() {
            return Err(ProvisionError::MissingField {
                kind: ResourceKind::IpsecPolicy,
                field: "id",
            });
        }
        info!(policy_id = %policy.id, "ipsec policy created");
        Ok(Provisioned {
            id: policy.id.clone(),
            resource: policy,
        })
    }

    /// Apply `update` and return the policy as read back. An empty update
    /// only reads.
    pub fn update_ipsec_policy(
        &self,
        id: &str,
        update: &IpsecPolicyUpdate,
    ) -> Result<IpsecPolicy, ProvisionError> {
        let path = paths::ipsec_policy(id);
        if !update.is_empty() {
            let body = enveloped(ResourceKind::IpsecPolicy, update)?;
            self.api.update(&path, &body)?;
            info!(policy_id = %id, "ipsec policy updated");
        }
        self.get(&path)
    }

    pub fn get_ipsec_policy(&self, id: &str) -> Result<IpsecPolicy, ProvisionError> {
        self.get(&paths::ipsec_policy(id))
    }

    /// Delete a policy, retrying while the remote reports it in use.
    pub fn delete_ipsec_policy(&self, id: &str) -> Result<Settled<()>, ProvisionError> {
        let probe = DeletionProbe::reissue(
            &self.api,
            ResourceKind::IpsecPolicy,
            paths::ipsec_policy(id),
            id,
        );
        let config = ReconcileConfig::await_deletion(self.timeouts.ipsec_policy.delete())
            .with_error_policy(ErrorPolicy::new().tolerate(IPSEC_POLICY_IN_USE));
        let settled = self.reconcile(&probe, &config)?;
        info!(policy_id = %id, polls = settled.polls, "ipsec policy deleted");
        Ok(settled)
    }

    // --- Port forwardings ---

    pub fn create_port_forwarding(
        &self,
        floating_ip_id: &str,
        request: &PortForwardingCreate,
    ) -> Result<Provisioned<PortForwarding>, ProvisionError> {
        let body = enveloped(ResourceKind::PortForwarding, request)?;
        let pf: PortForwarding =
            decode(self.api.create(&paths::port_forwardings(floating_ip_id), &body)?)?;
        if pf.id.is_empty() {
            return Err(ProvisionError::MissingField {
                kind: ResourceKind::PortForwarding,
                field: "id",
            });
        }
        info!(port_forwarding_id = %pf.id, floating_ip_id, "port forwarding created");
        Ok(Provisioned {
            id: pf.id.clone(),
            resource: pf,
        })
    }

    pub fn update_port_forwarding(
        &self,
        floating_ip_id: &str,
        id: &str,
        update: &PortForwardingUpdate,
    ) -> Result<PortForwarding, ProvisionError> {
        let path = paths::port_forwarding(floating_ip_id, id);
        if !update.is_empty() {
            let body = enveloped(ResourceKind::PortForwarding, update)?;
            self.api.update(&path, &body)?;
            info!(port_forwarding_id = %id, "port forwarding updated");
        }
        self.get(&path)
    }

    pub fn get_port_forwarding(
        &self,
        floating_ip_id: &str,
        id: &str,
    ) -> Result<PortForwarding, ProvisionError> {
        self.get(&paths::port_forwarding(floating_ip_id, id))
    }

    /// Send one DELETE, then wait until the port forwarding stops reading
    /// back. A 404 on the DELETE means it is already gone.
    pub fn delete_port_forwarding(
        &self,
        floating_ip_id: &str,
        id: &str,
    ) -> Result<Option<Settled<()>>, ProvisionError> {
        let path = paths::port_forwarding(floating_ip_id, id);
        match self.api.delete(&path) {
            Ok(()) => {}
            Err(RemoteError::NotFound(_)) => {
                info!(port_forwarding_id = %id, "port forwarding already deleted");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let probe = DeletionProbe::observe(&self.api, ResourceKind::PortForwarding, path, id);
        let config = ReconcileConfig::await_deletion(self.timeouts.port_forwarding.delete())
            .with_pending([LifecycleState::Active, LifecycleState::Down])
            .with_delay(PORT_FORWARDING_DELETE_DELAY)
            .with_min_timeout(PORT_FORWARDING_DELETE_MIN_TIMEOUT);
        let settled = self.reconcile(&probe, &config)?;
        info!(port_forwarding_id = %id, polls = settled.polls, "port forwarding deleted");
        Ok(Some(settled))
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(value).map_err(|e| RemoteError::Serialization(e.to_string()))
}

/// Wrap a request body in the kind's envelope, if it has one.
fn enveloped<T: Serialize>(kind: ResourceKind, value: &T) -> Result<Value, RemoteError> {
    let body = to_body(value)?;
    Ok(match kind.envelope() {
        Some(key) => {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(key.to_owned(), body);
            Value::Object(wrapped)
        }
        None => body,
    })
}

/// Canonical id from a create reply's reference field.
fn reference_id(kind: ResourceKind, reply: &Value) -> Result<String, ProvisionError> {
    let field = kind.reference_field();
    let reply = unwrap_envelope(kind, reply.clone());
    match reply.get(field).and_then(Value::as_str) {
        Some(reference) if !reference.is_empty() => Ok(resolve_reference(reference).to_owned()),
        _ => Err(ProvisionError::MissingField { kind, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A remote whose DELETE answers 204 every time, however often it is sent.
    #[derive(Default)]
    struct IdempotentDeletes {
        deletes: AtomicU32,
    }

    impl ResourceApi for IdempotentDeletes {
        fn create(&self, path: &str, _body: &Value) -> Result<Value, RemoteError> {
            Err(RemoteError::NotFound(path.to_owned()))
        }

        fn get(&self, path: &str) -> Result<Value, RemoteError> {
            Err(RemoteError::NotFound(path.to_owned()))
        }

        fn update(&self, path: &str, _body: &Value) -> Result<Value, RemoteError> {
            Err(RemoteError::NotFound(path.to_owned()))
        }

        fn delete(&self, _path: &str) -> Result<(), RemoteError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn accepted_delete_settles_on_first_poll() {
        let clock = ManualClock::new();
        let config = RemoteConfig::new("http://kms");
        let p = Provisioner::new(IdempotentDeletes::default(), &config).with_clock(&clock);

        for settled in [
            p.delete_secret("s1").unwrap(),
            p.delete_container("c1").unwrap(),
            p.delete_ipsec_policy("ip1").unwrap(),
        ] {
            assert_eq!(settled.state, LifecycleState::Deleted);
            assert_eq!(settled.polls, 1);
        }
        assert_eq!(p.api().deletes.load(Ordering::SeqCst), 3);
        assert!(clock.sleeps().is_empty());
        assert_eq!(p.timeouts(), &config.timeouts);
    }

    #[test]
    fn enveloped_wraps_networking_kinds() {
        let req = PortForwardingCreate {
            internal_port: 22,
            ..Default::default()
        };
        let body = enveloped(ResourceKind::PortForwarding, &req).unwrap();
        assert_eq!(body["port_forwarding"]["internal_port"], 22);

        let body = enveloped(ResourceKind::Secret, &json!({"name": "s"})).unwrap();
        assert_eq!(body["name"], "s");
    }

    #[test]
    fn reference_id_resolves_last_segment() {
        let reply = json!({"secret_ref": "http://kms/v1/secrets/abc-123"});
        assert_eq!(reference_id(ResourceKind::Secret, &reply).unwrap(), "abc-123");
    }

    #[test]
    fn reference_id_missing_field() {
        let err = reference_id(ResourceKind::Container, &json!({})).unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::MissingField {
                field: "container_ref",
                ..
            }
        ));
        assert!(err.to_string().contains("container_ref"));
    }
}
