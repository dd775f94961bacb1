//! Circuit breaker tests.
//!
//! - registry.rs: keyed get-or-create under concurrency, key encoding
//! - lifecycle.rs: open, trial and close against the real clock
//! - stream.rs: the stream operator's permission accounting

mod lifecycle;
mod registry;
mod stream;
