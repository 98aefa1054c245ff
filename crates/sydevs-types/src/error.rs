//! Shared error taxonomy for the kernel's value types.
//!
//! The kernel distinguishes three kinds of contract violation at this layer:
//! a caller passed a value that is malformed on its face (`InvalidArgument`),
//! a value is well-formed but out of the domain an operation requires
//! (`Domain`), or an operation was attempted in a state that should have been
//! unreachable given prior checks (`Logic`). Node-level dispatch adds a
//! fourth kind, `NodeError`, defined in the `sydevs` crate once a node path
//! exists to attach to it.

use thiserror::Error;

/// An error raised by the quantity, time-point, or time-queue algebra.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value was malformed: not a number, or otherwise not a value the
    /// operation accepts regardless of domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A well-formed value fell outside the domain an operation requires,
    /// e.g. a negative duration where a non-negative one was required.
    #[error("domain error: {0}")]
    Domain(String),

    /// An operation was attempted in a state the caller should have
    /// prevented: duplicate assignment, access outside the active phase,
    /// an id collision.
    #[error("logic error: {0}")]
    Logic(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }
}

/// The `Result` alias used throughout the value-type layer.
pub type Result<T> = std::result::Result<T, Error>;
