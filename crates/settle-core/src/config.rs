use crate::classify::ErrorPolicy;
use crate::state::LifecycleState;
use crate::ReconcileError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Polling floor used by every preset.
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters for one reconciliation.
///
/// `pending` and `target` must be disjoint. `min_timeout` is the pause
/// between successive probes; `timeout` bounds the whole wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub pending: BTreeSet<LifecycleState>,
    pub target: BTreeSet<LifecycleState>,
    pub delay: Duration,
    pub min_timeout: Duration,
    pub timeout: Duration,
    /// Consecutive target observations required before success.
    pub target_occurrences: u32,
    pub error_policy: ErrorPolicy,
}

impl ReconcileConfig {
    pub fn new(
        pending: impl IntoIterator<Item = LifecycleState>,
        target: impl IntoIterator<Item = LifecycleState>,
        timeout: Duration,
    ) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            target: target.into_iter().collect(),
            delay: Duration::ZERO,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            timeout,
            target_occurrences: 1,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn await_creation(timeout: Duration) -> Self {
        Self::new(
            [LifecycleState::NotCreated, LifecycleState::Pending],
            [LifecycleState::Active],
            timeout,
        )
    }

    pub fn await_deletion(timeout: Duration) -> Self {
        Self::new([LifecycleState::Active], [LifecycleState::Deleted], timeout)
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_pending(mut self, pending: impl IntoIterator<Item = LifecycleState>) -> Self {
        self.pending = pending.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl IntoIterator<Item = LifecycleState>) -> Self {
        self.target = target.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_target_occurrences(mut self, occurrences: u32) -> Self {
        self.target_occurrences = occurrences;
        self
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.target.is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "target state set is empty".to_owned(),
            ));
        }
        if let Some(state) = self.pending.intersection(&self.target).next() {
            return Err(ReconcileError::InvalidConfig(format!(
                "state {state} is both pending and target"
            )));
        }
        if self.timeout.is_zero() {
            return Err(ReconcileError::InvalidConfig(
                "timeout must be greater than zero".to_owned(),
            ));
        }
        if self.min_timeout.is_zero() {
            return Err(ReconcileError::InvalidConfig(
                "min_timeout must be greater than zero".to_owned(),
            ));
        }
        if self.target_occurrences == 0 {
            return Err(ReconcileError::InvalidConfig(
                "target_occurrences must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_preset() {
        let c = ReconcileConfig::await_creation(Duration::from_secs(1800));
        assert!(c.pending.contains(&LifecycleState::NotCreated));
        assert!(c.target.contains(&LifecycleState::Active));
        assert_eq!(c.min_timeout, Duration::from_secs(2));
        assert_eq!(c.delay, Duration::ZERO);
        assert_eq!(c.target_occurrences, 1);
        c.validate().unwrap();
    }

    #[test]
    fn deletion_preset() {
        let c = ReconcileConfig::await_deletion(Duration::from_secs(600));
        assert_eq!(c.pending, BTreeSet::from([LifecycleState::Active]));
        assert_eq!(c.target, BTreeSet::from([LifecycleState::Deleted]));
        c.validate().unwrap();
    }

    #[test]
    fn overlapping_sets_rejected() {
        let c = ReconcileConfig::await_creation(Duration::from_secs(10))
            .with_pending([LifecycleState::Active]);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("ACTIVE"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let c = ReconcileConfig::await_creation(Duration::ZERO);
        assert!(matches!(c.validate(), Err(ReconcileError::InvalidConfig(_))));
    }

    #[test]
    fn zero_poll_floor_rejected() {
        let c = ReconcileConfig::await_deletion(Duration::from_secs(10))
            .with_min_timeout(Duration::ZERO);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("min_timeout"));
    }

    #[test]
    fn zero_occurrences_rejected() {
        let c = ReconcileConfig::await_creation(Duration::from_secs(10)).with_target_occurrences(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn builder_overrides() {
        let c = ReconcileConfig::await_deletion(Duration::from_secs(600))
            .with_pending([LifecycleState::Active, LifecycleState::Down])
            .with_delay(Duration::from_secs(5))
            .with_min_timeout(Duration::from_secs(3))
            .with_timeout(Duration::from_secs(60));
        assert_eq!(c.timeout, Duration::from_secs(60));
        assert_eq!(c.pending.len(), 2);
        assert_eq!(c.delay, Duration::from_secs(5));
        assert_eq!(c.min_timeout, Duration::from_secs(3));
    }
}
