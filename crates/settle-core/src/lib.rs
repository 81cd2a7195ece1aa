//! Reconciliation engine for remote resources with asynchronous lifecycles.
//!
//! A create or delete call against the remote API returns before the resource
//! reaches its final state. This crate provides the single mechanism every
//! resource kind uses to wait for that state: a caller-supplied [`Probe`]
//! performs one status check, the [`StateClassifier`] maps its outcome onto a
//! small verdict vocabulary, and the [`Reconciler`] drives the pair on a fixed
//! cadence under a deadline. Timeouts and fatal failures are reported as
//! distinct [`ReconcileError`] variants so callers can tell an indeterminate
//! resource from a confirmed failure.

pub mod cancel;
pub mod classify;
pub mod clock;
pub mod config;
pub mod engine;
pub mod probe;
pub mod reference;
pub mod state;

pub use cancel::CancelToken;
pub use classify::{ErrorClass, ErrorPolicy, ProbeOutcome, StateClassifier, Verdict};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReconcileConfig;
pub use engine::{Reconciler, Settled};
pub use probe::{FnProbe, Mode, Observation, Probe, ProbeError, ProbeErrorKind};
pub use reference::resolve as resolve_reference;
pub use state::LifecycleState;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(
        "{resource_id}: {source} (last state: {}, after {elapsed:?})",
        state_label(.last_state.as_ref())
    )]
    Fatal {
        resource_id: String,
        last_state: Option<LifecycleState>,
        elapsed: Duration,
        #[source]
        source: ProbeError,
    },
    #[error(
        "timeout while waiting for {resource_id} (last state: {}, waited {elapsed:?} of {timeout:?})",
        state_label(.last_state.as_ref())
    )]
    Timeout {
        resource_id: String,
        last_state: Option<LifecycleState>,
        elapsed: Duration,
        timeout: Duration,
    },
    #[error("reconciliation of {resource_id} cancelled after {elapsed:?}")]
    Cancelled {
        resource_id: String,
        elapsed: Duration,
    },
    #[error("invalid reconcile config: {0}")]
    InvalidConfig(String),
}

impl ReconcileError {
    /// The resource may still converge; its state is unknown.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReconcileError::Timeout { .. })
    }

    /// The remote confirmed a failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::Fatal { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled { .. })
    }

    pub fn resource_id(&self) -> Option<&str> {
        match self {
            ReconcileError::Fatal { resource_id, .. }
            | ReconcileError::Timeout { resource_id, .. }
            | ReconcileError::Cancelled { resource_id, .. } => Some(resource_id),
            ReconcileError::InvalidConfig(_) => None,
        }
    }

    pub fn last_state(&self) -> Option<&LifecycleState> {
        match self {
            ReconcileError::Fatal { last_state, .. }
            | ReconcileError::Timeout { last_state, .. } => {
                last_state.as_ref()
            }
            ReconcileError::Cancelled { .. } | ReconcileError::InvalidConfig(_) => None,
        }
    }
}

fn state_label(state: Option<&LifecycleState>) -> String {
    state.map_or_else(|| "unknown".to_owned(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_context() {
        let err = ReconcileError::Timeout {
            resource_id: "abc-123".to_owned(),
            last_state: Some(LifecycleState::Pending),
            elapsed: Duration::from_secs(10),
            timeout: Duration::from_secs(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc-123"));
        assert!(msg.contains("PENDING"));
        assert!(err.is_timeout());
        assert!(!err.is_fatal());
    }

    #[test]
    fn fatal_message_without_state() {
        let err = ReconcileError::Fatal {
            resource_id: "abc-123".to_owned(),
            last_state: None,
            elapsed: Duration::ZERO,
            source: ProbeError::error_status("error creating secret"),
        };
        assert!(err.to_string().contains("last state: unknown"));
        assert!(err.is_fatal());
        assert_eq!(err.resource_id(), Some("abc-123"));
        assert!(err.last_state().is_none());
    }
}
