//! End-to-end behavior of the polling loop under virtual time.

use settle_core::{
    resolve_reference, FnProbe, LifecycleState, ManualClock, Mode, Observation, ProbeError,
    ReconcileConfig, ReconcileError, Reconciler,
};
use std::cell::Cell;
use std::time::Duration;

const SECS_2: Duration = Duration::from_secs(2);

/// A probe that replays `script`, repeating the final entry once exhausted.
fn scripted(
    mode: Mode,
    script: Vec<Result<LifecycleState, ProbeError>>,
) -> (
    FnProbe<impl Fn() -> Result<Observation<usize>, ProbeError>, usize>,
    std::rc::Rc<Cell<usize>>,
) {
    let calls = std::rc::Rc::new(Cell::new(0usize));
    let counter = std::rc::Rc::clone(&calls);
    let probe = FnProbe::new("abc-123", mode, move || {
        let i = counter.get();
        counter.set(i + 1);
        let step = &script[i.min(script.len() - 1)];
        step.clone().map(|state| Observation::new(i, state))
    });
    (probe, calls)
}

#[test]
fn creation_succeeds_after_two_sleeps() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(
        Mode::AwaitCreation,
        vec![
            Ok(LifecycleState::NotCreated),
            Ok(LifecycleState::NotCreated),
            Ok(LifecycleState::Active),
        ],
    );
    let config = ReconcileConfig::await_creation(Duration::from_secs(30));

    let settled = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap();

    assert_eq!(settled.state, LifecycleState::Active);
    assert_eq!(settled.resource, Some(2));
    assert_eq!(settled.polls, 3);
    assert_eq!(calls.get(), 3);
    assert_eq!(clock.sleeps(), vec![SECS_2, SECS_2]);
    assert!(settled.elapsed >= Duration::from_secs(4));
    assert!(settled.elapsed < Duration::from_secs(30));
}

#[test]
fn transient_errors_until_deadline_time_out() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(
        Mode::AwaitDeletion,
        vec![Err(ProbeError::transient("503 Service Unavailable"))],
    );
    let config = ReconcileConfig::await_deletion(Duration::from_secs(10));

    let err = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap_err();

    match err {
        ReconcileError::Timeout {
            ref resource_id,
            elapsed,
            timeout,
            ..
        } => {
            assert_eq!(resource_id, "abc-123");
            assert_eq!(elapsed, Duration::from_secs(10));
            assert_eq!(timeout, Duration::from_secs(10));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(calls.get(), 5);
    assert!(clock.sleeps().iter().all(|d| *d == SECS_2));
}

#[test]
fn pending_forever_times_out_with_last_state() {
    for deadline in [1, 2, 3, 7, 10, 31] {
        let clock = ManualClock::new();
        let (probe, _) = scripted(Mode::AwaitCreation, vec![Ok(LifecycleState::Pending)]);
        let config = ReconcileConfig::await_creation(Duration::from_secs(deadline));
        let err = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .run()
            .unwrap_err();
        assert!(err.is_timeout(), "deadline {deadline}s: {err}");
        assert_eq!(err.last_state(), Some(&LifecycleState::Pending));
        assert!(clock.elapsed() >= Duration::from_secs(deadline));
        assert!(clock.elapsed() < Duration::from_secs(deadline) + SECS_2);
    }
}

#[test]
fn target_wins_after_any_number_of_continues() {
    for pending_polls in 0..8usize {
        let clock = ManualClock::new();
        let mut script: Vec<Result<LifecycleState, ProbeError>> = (0..pending_polls)
            .map(|i| {
                if i % 2 == 0 {
                    Ok(LifecycleState::Pending)
                } else {
                    Err(ProbeError::transient("connection reset"))
                }
            })
            .collect();
        script.push(Ok(LifecycleState::Active));
        let (probe, _) = scripted(Mode::AwaitCreation, script);
        let config = ReconcileConfig::await_creation(Duration::from_secs(60));

        let settled = Reconciler::new(&probe, &config)
            .with_clock(&clock)
            .run()
            .unwrap();
        assert_eq!(settled.state, LifecycleState::Active);
        assert_eq!(settled.resource, Some(pending_polls));
        assert_eq!(clock.sleeps().len(), pending_polls);
    }
}

#[test]
fn fatal_on_first_probe_stops_immediately() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(
        Mode::AwaitCreation,
        vec![Err(ProbeError::error_status("secret in ERROR state"))],
    );
    let config = ReconcileConfig::await_creation(Duration::from_secs(30));

    let err = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(calls.get(), 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn fatal_after_pending_stops_at_that_poll() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(
        Mode::AwaitCreation,
        vec![
            Ok(LifecycleState::Pending),
            Ok(LifecycleState::Error),
            Ok(LifecycleState::Active),
        ],
    );
    let config = ReconcileConfig::await_creation(Duration::from_secs(30));
    let err = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.last_state(), Some(&LifecycleState::Error));
    assert_eq!(calls.get(), 2);
}

#[test]
fn deletion_not_found_succeeds_without_waiting() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(Mode::AwaitDeletion, vec![Err(ProbeError::not_found("404"))]);
    let config = ReconcileConfig::await_deletion(Duration::from_secs(600));

    let settled = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap();

    assert_eq!(settled.state, LifecycleState::Deleted);
    assert!(settled.resource.is_none());
    assert_eq!(settled.elapsed, Duration::ZERO);
    assert_eq!(calls.get(), 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn creation_not_found_keeps_polling() {
    let clock = ManualClock::new();
    let (probe, _) = scripted(
        Mode::AwaitCreation,
        vec![Err(ProbeError::not_found("404")), Ok(LifecycleState::Active)],
    );
    let config = ReconcileConfig::await_creation(Duration::from_secs(30));
    let settled = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap();
    assert_eq!(settled.polls, 2);
}

#[test]
fn absence_wait_uses_custom_cadence() {
    let clock = ManualClock::new();
    let (probe, _) = scripted(
        Mode::AwaitDeletion,
        vec![
            Ok(LifecycleState::Active),
            Ok(LifecycleState::Down),
            Err(ProbeError::not_found("404")),
        ],
    );
    let config = ReconcileConfig::await_deletion(Duration::from_secs(600))
        .with_pending([LifecycleState::Active, LifecycleState::Down])
        .with_delay(Duration::from_secs(5))
        .with_min_timeout(Duration::from_secs(3));
    let settled = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap();
    assert_eq!(settled.state, LifecycleState::Deleted);
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(3),
            Duration::from_secs(3)
        ]
    );
}

#[test]
fn reference_examples() {
    assert_eq!(resolve_reference("https://host/v1/secrets/abc-123"), "abc-123");
    assert_eq!(resolve_reference("abc-123"), "abc-123");
}

#[test]
fn unrecognized_state_polls_until_timeout() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(
        Mode::AwaitCreation,
        vec![Ok(LifecycleState::parse("BUILDING"))],
    );
    let config = ReconcileConfig::await_creation(Duration::from_secs(1800))
        .with_timeout(Duration::from_secs(8));

    let err = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert_eq!(
        err.last_state(),
        Some(&LifecycleState::Other("BUILDING".to_owned()))
    );
    assert_eq!(calls.get(), 4);
    assert_eq!(clock.elapsed(), Duration::from_secs(8));
}

#[test]
fn zero_poll_floor_is_rejected_before_probing() {
    let clock = ManualClock::new();
    let (probe, calls) = scripted(Mode::AwaitCreation, vec![Ok(LifecycleState::Pending)]);
    let config = ReconcileConfig::await_creation(Duration::from_secs(10))
        .with_min_timeout(Duration::ZERO);

    let err = Reconciler::new(&probe, &config)
        .with_clock(&clock)
        .run()
        .unwrap_err();

    assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    assert_eq!(calls.get(), 0);
}
