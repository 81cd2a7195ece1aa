use crate::state::LifecycleState;
use std::marker::PhantomData;
use thiserror::Error;

/// Whether the engine waits for a resource to appear or to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    AwaitCreation,
    AwaitDeletion,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::AwaitCreation => f.write_str("await-creation"),
            Mode::AwaitDeletion => f.write_str("await-deletion"),
        }
    }
}

/// What one status check saw: the resource snapshot, if the remote returned
/// one, and its lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub resource: Option<T>,
    pub state: LifecycleState,
}

impl<T> Observation<T> {
    pub fn new(resource: T, state: LifecycleState) -> Self {
        Self {
            resource: Some(resource),
            state,
        }
    }

    /// A state with no accompanying snapshot.
    pub fn bare(state: LifecycleState) -> Self {
        Self {
            resource: None,
            state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    /// The remote has no such resource.
    NotFound,
    /// The remote reported the resource in an error condition.
    ErrorStatus,
    /// Rate limiting, gateway errors, dropped connections.
    Transient,
    /// An HTTP status the caller has no general rule for.
    UnexpectedStatus(u16),
    Other,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProbeError {
    kind: ProbeErrorKind,
    message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::NotFound, message)
    }

    pub fn error_status(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::ErrorStatus, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Transient, message)
    }

    pub fn unexpected_status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::UnexpectedStatus(code), message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Other, message)
    }

    pub fn kind(&self) -> ProbeErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A single status check against the remote.
///
/// Implementations must be safe to call repeatedly; the engine calls
/// `probe` once per polling interval until the resource settles.
pub trait Probe {
    type Resource;

    fn resource_id(&self) -> &str;

    fn mode(&self) -> Mode;

    fn probe(&self) -> Result<Observation<Self::Resource>, ProbeError>;
}

impl<P: Probe + ?Sized> Probe for &P {
    type Resource = P::Resource;

    fn resource_id(&self) -> &str {
        (**self).resource_id()
    }

    fn mode(&self) -> Mode {
        (**self).mode()
    }

    fn probe(&self) -> Result<Observation<Self::Resource>, ProbeError> {
        (**self).probe()
    }
}

/// A probe backed by a closure.
pub struct FnProbe<F, T> {
    resource_id: String,
    mode: Mode,
    check: F,
    _resource: PhantomData<fn() -> T>,
}

impl<F, T> FnProbe<F, T>
where
    F: Fn() -> Result<Observation<T>, ProbeError>,
{
    pub fn new(resource_id: impl Into<String>, mode: Mode, check: F) -> Self {
        Self {
            resource_id: resource_id.into(),
            mode,
            check,
            _resource: PhantomData,
        }
    }
}

impl<F, T> Probe for FnProbe<F, T>
where
    F: Fn() -> Result<Observation<T>, ProbeError>,
{
    type Resource = T;

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn probe(&self) -> Result<Observation<T>, ProbeError> {
        (self.check)()
    }
}
