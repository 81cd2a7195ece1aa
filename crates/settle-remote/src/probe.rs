//! Probes over a [`ResourceApi`].
//!
//! [`CreationProbe`] reads a resource and reports its status. [`DeletionProbe`]
//! either re-issues the DELETE on every poll or only reads the resource back,
//! depending on how the remote finishes deletions for that kind.

use crate::{RemoteError, ResourceApi};
use serde_json::Value;
use settle_core::{LifecycleState, Mode, Observation, Probe, ProbeError};
use settle_schema::{RemoteResource, ResourceKind};
use std::marker::PhantomData;

/// Unwrap a networking-style envelope (`{"port_forwarding": {...}}`).
pub fn unwrap_envelope(kind: ResourceKind, mut body: Value) -> Value {
    match kind.envelope() {
        Some(key) => match body.get_mut(key) {
            Some(inner) => inner.take(),
            None => body,
        },
        None => body,
    }
}

pub fn decode<T: RemoteResource>(body: Value) -> Result<T, RemoteError> {
    serde_json::from_value(unwrap_envelope(T::KIND, body))
        .map_err(|e| RemoteError::Serialization(format!("invalid {} body: {e}", T::KIND)))
}

/// Lifecycle state of a snapshot. Kinds without a status field are
/// `Active` as soon as they can be read.
fn state_of(status: Option<&str>) -> LifecycleState {
    status.map_or(LifecycleState::Active, LifecycleState::parse)
}

/// GETs `path` and reports the decoded resource with its status.
pub struct CreationProbe<'a, A: ?Sized, T> {
    api: &'a A,
    path: String,
    resource_id: String,
    _resource: PhantomData<fn() -> T>,
}

impl<'a, A: ResourceApi + ?Sized, T: RemoteResource> CreationProbe<'a, A, T> {
    pub fn new(api: &'a A, path: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
            resource_id: resource_id.into(),
            _resource: PhantomData,
        }
    }
}

impl<A: ResourceApi + ?Sized, T: RemoteResource> Probe for CreationProbe<'_, A, T> {
    type Resource = T;

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn mode(&self) -> Mode {
        Mode::AwaitCreation
    }

    fn probe(&self) -> Result<Observation<T>, ProbeError> {
        let body = self.api.get(&self.path)?;
        let resource: T = decode(body)?;
        let state = state_of(resource.status());
        Ok(Observation::new(resource, state))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// Send DELETE on every poll until the remote accepts it or answers 404.
    Reissue,
    /// The DELETE was already sent; GET until the resource is gone.
    Observe,
}

pub struct DeletionProbe<'a, A: ?Sized> {
    api: &'a A,
    kind: ResourceKind,
    path: String,
    resource_id: String,
    strategy: DeleteStrategy,
}

impl<'a, A: ResourceApi + ?Sized> DeletionProbe<'a, A> {
    pub fn reissue(
        api: &'a A,
        kind: ResourceKind,
        path: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            kind,
            path: path.into(),
            resource_id: resource_id.into(),
            strategy: DeleteStrategy::Reissue,
        }
    }

    pub fn observe(
        api: &'a A,
        kind: ResourceKind,
        path: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            strategy: DeleteStrategy::Observe,
            ..Self::reissue(api, kind, path, resource_id)
        }
    }

    pub fn strategy(&self) -> DeleteStrategy {
        self.strategy
    }
}

impl<A: ResourceApi + ?Sized> Probe for DeletionProbe<'_, A> {
    type Resource = ();

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn mode(&self) -> Mode {
        Mode::AwaitDeletion
    }

    fn probe(&self) -> Result<Observation<()>, ProbeError> {
        match self.strategy {
            DeleteStrategy::Reissue => {
                // An accepted DELETE settles it; 404 means an earlier one did.
                self.api.delete(&self.path)?;
                Ok(Observation::bare(LifecycleState::Deleted))
            }
            DeleteStrategy::Observe => {
                let body = unwrap_envelope(self.kind, self.api.get(&self.path)?);
                let status = body.get("status").and_then(Value::as_str);
                Ok(Observation::bare(state_of(status)))
            }
        }
    }
}
