use thiserror::Error;

/// Failures reported by a camera engine.
///
/// `PermissionDenied` is what engines return when a control operation is
/// attempted while the camera is streaming; the session layer surfaces it
/// as [`CaptureError::Busy`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("no such device")]
    NoDevice,

    #[error("engine failure: {0}")]
    Failure(String),
}

impl EngineError {
    /// Negative POSIX errno equivalent.
    pub fn errno(&self) -> i32 {
        match self {
            Self::PermissionDenied => -libc::EACCES,
            Self::InvalidArgument(_) => -libc::EINVAL,
            Self::OutOfMemory => -libc::ENOMEM,
            Self::NoDevice => -libc::ENODEV,
            Self::Failure(_) => -libc::EIO,
        }
    }
}

/// Errors returned by capture session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The camera is already owned by another session.
    #[error("failed to acquire camera: {0}")]
    Acquire(String),

    #[error("configuration failed: {0}")]
    Config(String),

    /// Buffer or request allocation failed.
    #[error("resource allocation failed: {0}")]
    Resource(String),

    /// The device is streaming and cannot perform the control operation.
    /// Callers may back off and retry.
    #[error("device busy")]
    Busy,

    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl CaptureError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Acquire(_) => "acquire_failed",
            Self::Config(_) => "config_failed",
            Self::Resource(_) => "resource_exhausted",
            Self::Busy => "busy",
            Self::Engine(_) => "engine_error",
        }
    }

    /// Whether the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Negative POSIX errno reported by the dequeue-compatibility surface.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Acquire(_) | Self::Config(_) => -libc::EINVAL,
            Self::Resource(_) => -libc::ENOMEM,
            Self::Busy => -libc::EBUSY,
            Self::Engine(e) => e.errno(),
        }
    }
}

impl From<EngineError> for CaptureError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::PermissionDenied => Self::Busy,
            other => Self::Engine(other),
        }
    }
}
