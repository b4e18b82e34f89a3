//! Cooperative cancellation for pipeline runs.
//!
//! A run checks its token only at stage transitions; a stage that is
//! already in flight is allowed to finish.

mod token;

pub use token::CancellationToken;
