//! Mapping of probe results onto engine verdicts.
//!
//! Every probe result passes through two steps. [`StateClassifier::outcome`]
//! tags errors with an [`ErrorClass`] according to the mode and the
//! [`ErrorPolicy`]; [`StateClassifier::classify`] then decides whether the
//! engine keeps polling, succeeds, or fails.

use crate::config::ReconcileConfig;
use crate::probe::{Mode, Observation, ProbeError, ProbeErrorKind};
use crate::state::LifecycleState;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Not yet visible: keep waiting for creation.
    NotFoundAsPending,
    /// Gone: deletion has completed.
    NotFoundAsSuccess,
    Transient,
    Fatal,
}

/// Per-call tolerance for HTTP statuses that would otherwise be fatal.
///
/// IPSec policy deletion, for one, answers 409 while the policy is still in
/// use; listing 409 here turns that into "still pending".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    tolerated_statuses: BTreeSet<u16>,
}

impl ErrorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tolerate(mut self, status: u16) -> Self {
        self.tolerated_statuses.insert(status);
        self
    }

    pub fn is_tolerated(&self, status: u16) -> bool {
        self.tolerated_statuses.contains(&status)
    }
}

#[derive(Debug)]
pub enum ProbeOutcome<T> {
    Observed(Observation<T>),
    Failed { error: ProbeError, class: ErrorClass },
}

#[derive(Debug)]
pub enum Verdict<T> {
    /// Keep polling. `state` is the state to report if the wait ends here.
    Continue { state: Option<LifecycleState> },
    Succeed(Observation<T>),
    Fail {
        error: ProbeError,
        state: Option<LifecycleState>,
    },
}

pub struct StateClassifier<'a> {
    mode: Mode,
    config: &'a ReconcileConfig,
}

impl<'a> StateClassifier<'a> {
    pub fn new(mode: Mode, config: &'a ReconcileConfig) -> Self {
        Self { mode, config }
    }

    pub fn error_class(&self, error: &ProbeError) -> ErrorClass {
        match error.kind() {
            ProbeErrorKind::NotFound => match self.mode {
                Mode::AwaitCreation => ErrorClass::NotFoundAsPending,
                Mode::AwaitDeletion => ErrorClass::NotFoundAsSuccess,
            },
            ProbeErrorKind::Transient => ErrorClass::Transient,
            ProbeErrorKind::UnexpectedStatus(code)
                if self.config.error_policy.is_tolerated(code) =>
            {
                ErrorClass::Transient
            }
            ProbeErrorKind::ErrorStatus
            | ProbeErrorKind::UnexpectedStatus(_)
            | ProbeErrorKind::Other => ErrorClass::Fatal,
        }
    }

    pub fn outcome<T>(&self, result: Result<Observation<T>, ProbeError>) -> ProbeOutcome<T> {
        match result {
            Ok(observation) => ProbeOutcome::Observed(observation),
            Err(error) => {
                let class = self.error_class(&error);
                ProbeOutcome::Failed { error, class }
            }
        }
    }

    pub fn classify<T>(&self, outcome: ProbeOutcome<T>) -> Verdict<T> {
        match outcome {
            ProbeOutcome::Observed(observation) => self.classify_state(observation),
            ProbeOutcome::Failed { error, class } => match class {
                ErrorClass::NotFoundAsPending => Verdict::Continue {
                    state: Some(LifecycleState::NotCreated),
                },
                ErrorClass::NotFoundAsSuccess => {
                    Verdict::Succeed(Observation::bare(LifecycleState::Deleted))
                }
                ErrorClass::Transient => Verdict::Continue { state: None },
                ErrorClass::Fatal => Verdict::Fail { error, state: None },
            },
        }
    }

    fn classify_state<T>(&self, observation: Observation<T>) -> Verdict<T> {
        let state = &observation.state;
        if self.config.target.contains(state) {
            return Verdict::Succeed(observation);
        }
        if self.config.pending.contains(state) {
            return Verdict::Continue {
                state: Some(observation.state),
            };
        }
        if state.is_error() {
            return Verdict::Fail {
                error: ProbeError::error_status(format!(
                    "remote reported {state} while waiting for {}",
                    describe(&self.config.target)
                )),
                state: Some(observation.state),
            };
        }
        // Unrecognized states are not treated as failures.
        Verdict::Continue {
            state: Some(observation.state),
        }
    }
}

fn describe(states: &BTreeSet<LifecycleState>) -> String {
    states
        .iter()
        .map(LifecycleState::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn creation() -> ReconcileConfig {
        ReconcileConfig::await_creation(Duration::from_secs(60))
    }

    fn deletion() -> ReconcileConfig {
        ReconcileConfig::await_deletion(Duration::from_secs(60))
    }

    fn verdict(
        mode: Mode,
        config: &ReconcileConfig,
        result: Result<Observation<()>, ProbeError>,
    ) -> Verdict<()> {
        let c = StateClassifier::new(mode, config);
        c.classify(c.outcome(result))
    }

    #[test]
    fn target_state_succeeds() {
        let v = verdict(
            Mode::AwaitCreation,
            &creation(),
            Ok(Observation::new((), LifecycleState::Active)),
        );
        assert!(matches!(v, Verdict::Succeed(o) if o.state == LifecycleState::Active));
    }

    #[test]
    fn pending_state_continues() {
        let v = verdict(
            Mode::AwaitCreation,
            &creation(),
            Ok(Observation::bare(LifecycleState::NotCreated)),
        );
        assert!(matches!(
            v,
            Verdict::Continue {
                state: Some(LifecycleState::NotCreated)
            }
        ));
    }

    #[test]
    fn unrecognized_state_continues() {
        let v = verdict(
            Mode::AwaitCreation,
            &creation(),
            Ok(Observation::bare(LifecycleState::parse("BUILDING"))),
        );
        assert!(matches!(v, Verdict::Continue { state: Some(LifecycleState::Other(_)) }));
    }

    #[test]
    fn error_state_fails_creation() {
        let v = verdict(
            Mode::AwaitCreation,
            &creation(),
            Ok(Observation::bare(LifecycleState::Error)),
        );
        match v {
            Verdict::Fail { error, state } => {
                assert_eq!(error.kind(), ProbeErrorKind::ErrorStatus);
                assert_eq!(state, Some(LifecycleState::Error));
            }
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[test]
    fn error_state_listed_as_pending_is_not_fatal() {
        let config = creation().with_pending([LifecycleState::Pending, LifecycleState::Error]);
        let v = verdict(
            Mode::AwaitCreation,
            &config,
            Ok(Observation::bare(LifecycleState::Error)),
        );
        assert!(matches!(v, Verdict::Continue { .. }));
    }

    #[test]
    fn not_found_depends_on_mode() {
        let create = verdict(
            Mode::AwaitCreation,
            &creation(),
            Err(ProbeError::not_found("404")),
        );
        assert!(matches!(
            create,
            Verdict::Continue {
                state: Some(LifecycleState::NotCreated)
            }
        ));

        let delete = verdict(
            Mode::AwaitDeletion,
            &deletion(),
            Err(ProbeError::not_found("404")),
        );
        match delete {
            Verdict::Succeed(obs) => {
                assert!(obs.resource.is_none());
                assert_eq!(obs.state, LifecycleState::Deleted);
            }
            other => panic!("expected Succeed, got {other:?}"),
        }
    }

    #[test]
    fn transient_continues_without_state() {
        let v = verdict(
            Mode::AwaitCreation,
            &creation(),
            Err(ProbeError::transient("503 Service Unavailable")),
        );
        assert!(matches!(v, Verdict::Continue { state: None }));
    }

    #[test]
    fn unexpected_status_is_fatal_unless_tolerated() {
        let strict = deletion();
        let c = StateClassifier::new(Mode::AwaitDeletion, &strict);
        assert_eq!(
            c.error_class(&ProbeError::unexpected_status(409, "conflict")),
            ErrorClass::Fatal
        );

        let lenient = deletion().with_error_policy(ErrorPolicy::new().tolerate(409));
        let c = StateClassifier::new(Mode::AwaitDeletion, &lenient);
        assert_eq!(
            c.error_class(&ProbeError::unexpected_status(409, "conflict")),
            ErrorClass::Transient
        );
        assert_eq!(
            c.error_class(&ProbeError::unexpected_status(400, "bad request")),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn other_errors_are_fatal() {
        let config = creation();
        let c = StateClassifier::new(Mode::AwaitCreation, &config);
        assert_eq!(c.error_class(&ProbeError::other("decode")), ErrorClass::Fatal);
        assert_eq!(
            c.error_class(&ProbeError::error_status("ERROR")),
            ErrorClass::Fatal
        );
    }
}
