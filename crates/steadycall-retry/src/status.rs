//! Statuses a server answers with to say how its failure may be retried.
//!
//! They sit in the otherwise unused 58x range so that a response carrying
//! one cannot be confused with an ordinary server error.

/// The server's own breaker for the call is open. Nothing was processed.
pub const CIRCUIT_OPEN: u16 = 581;

/// The server hit an I/O failure before doing any work.
pub const RETRYABLE_IO: u16 = 582;

/// The server hit an I/O failure part way through. Only retryable calls may
/// try again.
pub const NOT_RETRYABLE_IO: u16 = 583;

/// True for statuses that are safe to retry whatever the call.
pub fn is_retry_signal(status: u16) -> bool {
    matches!(status, CIRCUIT_OPEN | RETRYABLE_IO)
}
