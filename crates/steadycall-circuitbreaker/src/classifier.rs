//! Result classification for breaker decisions.
//!
//! Transport errors always count as failures. Responses are classified by
//! status code through a [`ResultClassifier`].

use std::sync::Arc;

/// Decides whether a response status counts as a failed call.
pub trait ResultClassifier: Send + Sync {
    /// Returns `true` if `status` should count toward the failure rate.
    fn is_failure(&self, status: u16) -> bool;
}

/// Counts every non-`2xx` status as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonSuccessClassifier;

impl ResultClassifier for NonSuccessClassifier {
    fn is_failure(&self, status: u16) -> bool {
        !(200..300).contains(&status)
    }
}

/// Classifier backed by a closure.
///
/// ```rust
/// use steadycall_circuitbreaker::classifier::{FnClassifier, ResultClassifier};
///
/// // 4xx is the caller's fault, only 5xx trips the breaker
/// let classifier = FnClassifier::new(|status| status >= 500);
/// assert!(!classifier.is_failure(404));
/// assert!(classifier.is_failure(503));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> ResultClassifier for FnClassifier<F>
where
    F: Fn(u16) -> bool + Send + Sync,
{
    fn is_failure(&self, status: u16) -> bool {
        (self.f)(status)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}

pub(crate) type SharedClassifier = Arc<dyn ResultClassifier>;
