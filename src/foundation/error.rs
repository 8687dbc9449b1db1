use std::fmt;

/// Convenience result type used across the crate.
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Result code returned by the buffer-queue service and the pixel-buffer primitive.
///
/// Values follow the negative errno convention used on the wire. `StatusCode::OK` is never carried
/// inside an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Success.
    pub const OK: Self = Self(0);
    /// Unknown name or operation.
    pub const NAME_NOT_FOUND: Self = Self(-2);
    /// Call would block (e.g. no free slot).
    pub const WOULD_BLOCK: Self = Self(-11);
    /// Out of memory.
    pub const NO_MEMORY: Self = Self(-12);
    /// Resource is busy (e.g. already mapped).
    pub const BUSY: Self = Self(-16);
    /// Service not initialized or not connected.
    pub const NO_INIT: Self = Self(-19);
    /// Invalid argument.
    pub const BAD_VALUE: Self = Self(-22);
    /// Operation not valid in the current state.
    pub const INVALID_OPERATION: Self = Self(-38);
    /// Catch-all for failures without a more specific code.
    pub const UNKNOWN: Self = Self(i32::MIN);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::OK => "OK",
            Self::NAME_NOT_FOUND => "NAME_NOT_FOUND",
            Self::WOULD_BLOCK => "WOULD_BLOCK",
            Self::NO_MEMORY => "NO_MEMORY",
            Self::BUSY => "BUSY",
            Self::NO_INIT => "NO_INIT",
            Self::BAD_VALUE => "BAD_VALUE",
            Self::INVALID_OPERATION => "INVALID_OPERATION",
            Self::UNKNOWN => "UNKNOWN",
            _ => return None,
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

impl std::error::Error for StatusCode {}

/// Top-level error taxonomy used by producer APIs.
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    /// Malformed setter or operation arguments, rejected before any remote call.
    #[error("validation error: {0}")]
    Validation(String),

    /// A buffer passed to queue/cancel is not held by any cached slot.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Failure reported by the buffer-queue service or the pixel-buffer primitive.
    #[error("remote error: {0}")]
    Remote(#[from] StatusCode),

    /// Lock/unlock called out of order.
    #[error("state error: {0}")]
    State(String),

    /// A pixel mapping could not be used for the requested access.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Unknown operation code at the raw boundary.
    #[error("operation not found: {0}")]
    OperationNotFound(i32),

    /// Wrapped lower-level error from collaborators or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProducerError {
    /// Build a [`ProducerError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ProducerError::Resolution`] value.
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Build a [`ProducerError::State`] value.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Build a [`ProducerError::Mapping`] value.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Fold this error into the result code handed to raw callers.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Resolution(_) | Self::Mapping(_) => StatusCode::BAD_VALUE,
            Self::Remote(code) => *code,
            Self::State(_) => StatusCode::INVALID_OPERATION,
            Self::OperationNotFound(_) => StatusCode::NAME_NOT_FOUND,
            Self::Other(_) => StatusCode::UNKNOWN,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
