//! Error types for the concurrency substrate.

use snafu::Snafu;

/// Error raised by pool configuration and the blocking primitives.
///
/// Most of the substrate is infallible by construction; the variants here
/// cover rejected configuration, out-of-range raw arguments, and the fatal
/// internal conditions that are reported through panics carrying the
/// formatted variant.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Pool configuration rejected at startup.
    #[snafu(display("invalid configuration: {message}"))]
    InvalidConfig {
        /// What was rejected and why.
        message: String,
    },

    /// Argument outside the accepted domain.
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument {
        /// Which argument and the offending value.
        message: String,
    },

    /// An underlying OS lock primitive reported failure.
    #[snafu(display("lock operation failed: {message}"))]
    LockFailure {
        /// The failing operation.
        message: &'static str,
    },

    /// A waiter queue exceeded its fixed capacity.
    #[snafu(display("waiter queue full: more than {limit} threads blocked at once"))]
    QueueFull {
        /// The fixed queue capacity.
        limit: usize,
    },

    /// Internal bookkeeping disagrees with itself.
    #[snafu(display("invariant violation: {message}"))]
    InvariantViolation {
        /// The check that failed.
        message: &'static str,
    },

    /// Buffer storage could not be allocated.
    #[snafu(display("allocation of {bytes} bytes failed"))]
    AllocationFailure {
        /// Requested size in bytes.
        bytes: usize,
    },
}

/// Result type for fallible substrate operations.
pub type Result<T> = core::result::Result<T, Error>;
