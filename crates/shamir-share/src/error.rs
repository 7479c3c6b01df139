//! error types for shamir-share

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShareError>;

/// Errors returned by every split/join operation.
///
/// The enumeration is flat: callers match on the kind to decide whether a
/// retry makes sense (see [`ShareError::is_transient`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ShareError {
    /// reconstructed value is out of range for the configured secret
    #[error("reconstructed secret is out of range")]
    Failed,

    /// the session holds too few shares, or is not in a state for the operation
    #[error("invalid data for operation")]
    InvalidData,

    /// a required buffer was empty
    #[error("required parameter missing")]
    NullParam,

    /// threshold, share count, secret length or session mode is unacceptable
    #[error("parameter has a bad value")]
    BadValue,

    /// a buffer does not have the length the operation needs
    #[error("parameter has a bad length")]
    BadLength,

    /// no prime or backend satisfies the request
    #[error("no prime or backend found")]
    NotFound,

    /// memory could not be reserved
    #[error("allocation failed")]
    Alloc,

    /// the random source reported failure
    #[error("random source failure")]
    RandomSourceFailure,

    /// lagrange interpolation hit a zero denominator (duplicate x)
    #[error("modular inverse undefined")]
    ModularInverseUndefined,
}

impl ShareError {
    /// Stable numeric code for binding layers.
    pub const fn code(self) -> u8 {
        match self {
            Self::Failed => 1,
            Self::InvalidData => 2,
            Self::NullParam => 10,
            Self::BadValue => 11,
            Self::BadLength => 12,
            Self::NotFound => 20,
            Self::Alloc => 30,
            Self::RandomSourceFailure => 40,
            Self::ModularInverseUndefined => 41,
        }
    }

    /// True when retrying the same call may succeed.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RandomSourceFailure | Self::Alloc)
    }
}

impl From<std::collections::TryReserveError> for ShareError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::Alloc
    }
}

impl From<rand_core::Error> for ShareError {
    fn from(_: rand_core::Error) -> Self {
        Self::RandomSourceFailure
    }
}
