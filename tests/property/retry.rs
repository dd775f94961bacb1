//! Property tests for retry decisions.
//!
//! Invariants tested:
//! - A call never makes more attempts than configured
//! - Failures after sending end a non-retryable call at once
//! - Every attempt but the last is followed by a retry
//! - Error statuses are retried exactly when the call is retryable

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use steadycall_core::FailureKind;
use steadycall_retry::{Outcome, RetryConfig, RetryContext, RetryDecision};

fn failure() -> impl Strategy<Value = FailureKind> {
    prop::sample::select(vec![
        FailureKind::CircuitOpen,
        FailureKind::BulkheadFull,
        FailureKind::ConnectFailure,
        FailureKind::ResponseFailure,
        FailureKind::Application,
    ])
}

fn config(max_attempts: usize) -> Arc<RetryConfig> {
    Arc::new(
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .wait_duration(Duration::from_millis(1))
            .build(),
    )
}

/// Feeds outcomes until the context stops retrying. Returns the attempts
/// made and whether the context gave up before the outcomes ran out.
fn run(context: &mut RetryContext, outcomes: &[FailureKind]) -> (usize, bool) {
    for kind in outcomes {
        if let RetryDecision::DoNotRetry = context.on_outcome(Outcome::Failure(*kind)) {
            return (context.attempts(), true);
        }
    }
    (context.attempts(), false)
}

proptest! {
    #[test]
    fn attempts_never_exceed_the_limit(
        max_attempts in 1usize..6,
        retryable in any::<bool>(),
        outcomes in prop::collection::vec(failure(), 1..12),
    ) {
        let mut context = RetryContext::new(config(max_attempts), retryable);
        let (attempts, finished) = run(&mut context, &outcomes);
        prop_assert!(attempts <= max_attempts);
        if finished {
            prop_assert_eq!(context.retries(), attempts - 1);
        } else {
            prop_assert_eq!(context.retries(), attempts);
        }
    }

    #[test]
    fn unsent_failures_use_every_attempt(
        max_attempts in 1usize..6,
        retryable in any::<bool>(),
        kind in prop::sample::select(vec![
            FailureKind::CircuitOpen,
            FailureKind::BulkheadFull,
            FailureKind::ConnectFailure,
        ]),
    ) {
        let mut context = RetryContext::new(config(max_attempts), retryable);
        let (attempts, finished) = run(&mut context, &vec![kind; max_attempts + 3]);
        prop_assert!(finished);
        prop_assert_eq!(attempts, max_attempts);
    }

    #[test]
    fn sent_failures_end_non_retryable_calls(
        max_attempts in 1usize..6,
        kind in prop::sample::select(vec![FailureKind::ResponseFailure, FailureKind::Application]),
    ) {
        let mut context = RetryContext::new(config(max_attempts), false);
        prop_assert!(!context.on_outcome(Outcome::Failure(kind)).is_retry());
        prop_assert_eq!(context.attempts(), 1);
    }

    #[test]
    fn successes_are_never_retried(status in 200u16..300, max_attempts in 1usize..6) {
        let mut context = RetryContext::new(config(max_attempts), true);
        prop_assert!(!context.on_outcome(Outcome::Response(status)).is_retry());
    }

    #[test]
    fn error_statuses_follow_call_retryability(
        status in 400u16..600,
        max_attempts in 2usize..6,
        retryable in any::<bool>(),
    ) {
        let mut context = RetryContext::new(config(max_attempts), retryable);
        prop_assert_eq!(context.on_outcome(Outcome::Response(status)).is_retry(), retryable);
    }
}
