//! The polling loop.
//!
//! One reconciliation runs as:
//!
//! 1. Wait `delay`, if set.
//! 2. Probe, classify.
//! 3. On success or failure, stop.
//! 4. Otherwise, if the deadline has passed, stop with a timeout; if not,
//!    wait `min_timeout` and go to 2. A deadline that passes during the
//!    wait ends the run without another probe.
//!
//! The cancel token is checked before and after every wait.

use crate::cancel::CancelToken;
use crate::classify::{ErrorClass, ProbeOutcome, StateClassifier, Verdict};
use crate::clock::{Clock, SystemClock};
use crate::config::ReconcileConfig;
use crate::probe::Probe;
use crate::state::LifecycleState;
use crate::ReconcileError;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<T> {
    /// Last snapshot the probe returned. `None` after a confirmed deletion.
    pub resource: Option<T>,
    pub state: LifecycleState,
    pub polls: u32,
    pub elapsed: Duration,
}

pub struct Reconciler<'a, P: Probe, C: Clock = SystemClock> {
    probe: &'a P,
    config: &'a ReconcileConfig,
    clock: C,
    cancel: Option<CancelToken>,
}

impl<'a, P: Probe> Reconciler<'a, P> {
    pub fn new(probe: &'a P, config: &'a ReconcileConfig) -> Self {
        Self {
            probe,
            config,
            clock: SystemClock,
            cancel: None,
        }
    }
}

impl<'a, P: Probe, C: Clock> Reconciler<'a, P, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Reconciler<'a, P, C2> {
        Reconciler {
            probe: self.probe,
            config: self.config,
            clock,
            cancel: self.cancel,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: Option<CancelToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self) -> Result<Settled<P::Resource>, ReconcileError> {
        self.config.validate()?;

        let run = Run {
            resource_id: self.probe.resource_id(),
            start: self.clock.now(),
            clock: &self.clock,
            cancel: self.cancel.as_ref(),
            timeout: self.config.timeout,
        };
        let mode = self.probe.mode();
        let classifier = StateClassifier::new(mode, self.config);
        let required = self.config.target_occurrences;

        debug!(
            resource_id = run.resource_id,
            %mode,
            timeout = ?self.config.timeout,
            "waiting for resource to settle"
        );

        if !self.config.delay.is_zero() {
            run.suspend(self.config.delay)?;
        }

        let mut polls = 0u32;
        let mut occurrences = 0u32;
        let mut last_state: Option<LifecycleState> = None;

        loop {
            polls += 1;
            let outcome = classifier.outcome(self.probe.probe());
            if let ProbeOutcome::Failed { error, class } = &outcome {
                match class {
                    ErrorClass::Transient => {
                        warn!(
                            resource_id = run.resource_id,
                            poll = polls,
                            "transient probe error: {error}"
                        );
                    }
                    ErrorClass::NotFoundAsPending | ErrorClass::NotFoundAsSuccess => {
                        debug!(resource_id = run.resource_id, poll = polls, "resource not found");
                    }
                    ErrorClass::Fatal => {}
                }
            }

            let elapsed = run.elapsed();
            match classifier.classify(outcome) {
                Verdict::Succeed(observation) => {
                    occurrences += 1;
                    if occurrences >= required {
                        info!(
                            resource_id = run.resource_id,
                            state = %observation.state,
                            polls,
                            ?elapsed,
                            "resource settled"
                        );
                        return Ok(Settled {
                            resource: observation.resource,
                            state: observation.state,
                            polls,
                            elapsed,
                        });
                    }
                    debug!(
                        resource_id = run.resource_id,
                        occurrences, required, "target observed, confirming"
                    );
                    last_state = Some(observation.state);
                }
                Verdict::Continue { state } => {
                    occurrences = 0;
                    if let Some(state) = state {
                        debug!(
                            resource_id = run.resource_id,
                            poll = polls,
                            %state,
                            "still pending"
                        );
                        last_state = Some(state);
                    }
                }
                Verdict::Fail { error, state } => {
                    let last_state = state.or(last_state);
                    warn!(resource_id = run.resource_id, polls, "reconciliation failed: {error}");
                    return Err(ReconcileError::Fatal {
                        resource_id: run.resource_id.to_owned(),
                        last_state,
                        elapsed,
                        source: error,
                    });
                }
            }

            if elapsed >= run.timeout {
                return Err(run.timed_out(last_state, elapsed));
            }
            run.suspend(self.config.min_timeout)?;
            let elapsed = run.elapsed();
            if elapsed >= run.timeout {
                return Err(run.timed_out(last_state, elapsed));
            }
        }
    }
}

struct Run<'r, C: Clock> {
    resource_id: &'r str,
    start: Instant,
    clock: &'r C,
    cancel: Option<&'r CancelToken>,
    timeout: Duration,
}

impl<C: Clock> Run<'_, C> {
    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }

    fn suspend(&self, duration: Duration) -> Result<(), ReconcileError> {
        self.check_cancel()?;
        self.clock.sleep(duration);
        self.check_cancel()
    }

    fn check_cancel(&self) -> Result<(), ReconcileError> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            info!(resource_id = self.resource_id, "reconciliation cancelled");
            return Err(ReconcileError::Cancelled {
                resource_id: self.resource_id.to_owned(),
                elapsed: self.elapsed(),
            });
        }
        Ok(())
    }

    fn timed_out(&self, last_state: Option<LifecycleState>, elapsed: Duration) -> ReconcileError {
        warn!(
            resource_id = self.resource_id,
            ?elapsed,
            "timed out waiting for resource to settle"
        );
        ReconcileError::Timeout {
            resource_id: self.resource_id.to_owned(),
            last_state,
            elapsed,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::probe::{FnProbe, Mode, Observation, ProbeError};
    use std::cell::Cell;

    #[test]
    fn invalid_config_is_rejected_before_probing() {
        let calls = Cell::new(0);
        let probe = FnProbe::new("x", Mode::AwaitCreation, || {
            calls.set(calls.get() + 1);
            Ok(Observation::<()>::bare(LifecycleState::Active))
        });
        let config = ReconcileConfig::await_creation(Duration::ZERO);
        let err = Reconciler::new(&probe, &config).run().unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn initial_delay_precedes_first_probe() {
        let clock = ManualClock::new();
        let probe = FnProbe::new("x", Mode::AwaitCreation, || {
            Ok(Observation::<()>::bare(LifecycleState::Active))
        });
        let config = ReconcileConfig::await_creation(Duration::from_secs(60))
            .with_delay(Duration::from_secs(5));
        let settled = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .run()
            .unwrap();
        assert_eq!(settled.polls, 1);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
        assert_eq!(settled.elapsed, Duration::from_secs(5));
    }

    #[test]
    fn target_occurrences_require_consecutive_hits() {
        let clock = ManualClock::new();
        let script = [
            LifecycleState::Active,
            LifecycleState::Pending,
            LifecycleState::Active,
            LifecycleState::Active,
        ];
        let calls = Cell::new(0usize);
        let probe = FnProbe::new("x", Mode::AwaitCreation, || {
            let i = calls.get();
            calls.set(i + 1);
            Ok(Observation::<()>::bare(script[i].clone()))
        });
        let config = ReconcileConfig::await_creation(Duration::from_secs(60))
            .with_target_occurrences(2);
        let settled = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .run()
            .unwrap();
        assert_eq!(settled.polls, 4);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[test]
    fn fatal_keeps_last_pending_state() {
        let clock = ManualClock::new();
        let calls = Cell::new(0);
        let probe = FnProbe::new("x", Mode::AwaitCreation, || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Ok(Observation::<()>::bare(LifecycleState::Pending))
            } else {
                Err(ProbeError::other("malformed body"))
            }
        });
        let config = ReconcileConfig::await_creation(Duration::from_secs(60));
        let err = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .run()
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.last_state(), Some(&LifecycleState::Pending));
    }

    #[test]
    fn cancel_before_wait() {
        let clock = ManualClock::new();
        let token = CancelToken::new();
        let probe = FnProbe::new("x", Mode::AwaitCreation, || {
            token.cancel();
            Ok(Observation::<()>::bare(LifecycleState::Pending))
        });
        let config = ReconcileConfig::await_creation(Duration::from_secs(60));
        let err = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .with_cancel(Some(token.clone()))
            .run()
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(clock.sleeps().is_empty());
    }
}
