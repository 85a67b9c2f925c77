use std::backtrace::Backtrace;

use thiserror::Error;

/// Represents errors that can occur when interacting with a [`Runtime`](crate::Runtime). The error types are based on
/// the [Abseil status codes](https://abseil.io/docs/cpp/guides/status-codes) which PJRT runtimes use internally, so
/// that errors coming out of native runtimes can be represented without loss of information.
///
/// Each variant includes a `backtrace` field that captures the call stack at the point where the error was created,
/// which is useful for debugging. Note that it is represented as a [`String`] and not as a [`Backtrace`] because using
/// the latter is only currently supported in unstable Rust.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("{message}")]
    Cancelled { message: String, backtrace: String },

    #[error("{message}")]
    Unknown { message: String, backtrace: String },

    #[error("{message}")]
    InvalidArgument { message: String, backtrace: String },

    #[error("{message}")]
    NotFound { message: String, backtrace: String },

    #[error("{message}")]
    AlreadyExists { message: String, backtrace: String },

    #[error("{message}")]
    ResourceExhausted { message: String, backtrace: String },

    #[error("{message}")]
    FailedPrecondition { message: String, backtrace: String },

    #[error("{message}")]
    OutOfRange { message: String, backtrace: String },

    #[error("{message}")]
    Unimplemented { message: String, backtrace: String },

    #[error("{message}")]
    Internal { message: String, backtrace: String },

    #[error("{message}")]
    Unavailable { message: String, backtrace: String },

    #[error("{message}")]
    DataLoss { message: String, backtrace: String },
}

impl Error {
    /// Creates a new [`Error::Cancelled`].
    pub fn cancelled<M: Into<String>>(message: M) -> Self {
        Self::Cancelled { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Unknown`].
    pub fn unknown<M: Into<String>>(message: M) -> Self {
        Self::Unknown { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::InvalidArgument`].
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self::InvalidArgument { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::NotFound`].
    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::AlreadyExists`].
    pub fn already_exists<M: Into<String>>(message: M) -> Self {
        Self::AlreadyExists { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::ResourceExhausted`].
    pub fn resource_exhausted<M: Into<String>>(message: M) -> Self {
        Self::ResourceExhausted { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::FailedPrecondition`].
    pub fn failed_precondition<M: Into<String>>(message: M) -> Self {
        Self::FailedPrecondition { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::OutOfRange`].
    pub fn out_of_range<M: Into<String>>(message: M) -> Self {
        Self::OutOfRange { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Unimplemented`].
    pub fn unimplemented<M: Into<String>>(message: M) -> Self {
        Self::Unimplemented { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Internal`].
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Unavailable`].
    pub fn unavailable<M: Into<String>>(message: M) -> Self {
        Self::Unavailable { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::DataLoss`].
    pub fn data_loss<M: Into<String>>(message: M) -> Self {
        Self::DataLoss { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Returns the message that is stored in this [`Error`].
    pub fn message(&self) -> &str {
        match self {
            Self::Cancelled { message, .. }
            | Self::Unknown { message, .. }
            | Self::InvalidArgument { message, .. }
            | Self::NotFound { message, .. }
            | Self::AlreadyExists { message, .. }
            | Self::ResourceExhausted { message, .. }
            | Self::FailedPrecondition { message, .. }
            | Self::OutOfRange { message, .. }
            | Self::Unimplemented { message, .. }
            | Self::Internal { message, .. }
            | Self::Unavailable { message, .. }
            | Self::DataLoss { message, .. } => message,
        }
    }

    /// Returns the backtrace that was captured when this [`Error`] was created. Note that this will be an unhelpful
    /// placeholder string unless backtrace capturing is enabled (e.g., via the `RUST_BACKTRACE` environment variable).
    pub fn backtrace(&self) -> &str {
        match self {
            Self::Cancelled { backtrace, .. }
            | Self::Unknown { backtrace, .. }
            | Self::InvalidArgument { backtrace, .. }
            | Self::NotFound { backtrace, .. }
            | Self::AlreadyExists { backtrace, .. }
            | Self::ResourceExhausted { backtrace, .. }
            | Self::FailedPrecondition { backtrace, .. }
            | Self::OutOfRange { backtrace, .. }
            | Self::Unimplemented { backtrace, .. }
            | Self::Internal { backtrace, .. }
            | Self::Unavailable { backtrace, .. }
            | Self::DataLoss { backtrace, .. } => backtrace,
        }
    }

    /// Returns the name of the Abseil status code that corresponds to this [`Error`] (e.g., `"INVALID_ARGUMENT"`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "CANCELLED",
            Self::Unknown { .. } => "UNKNOWN",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition { .. } => "FAILED_PRECONDITION",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::Unimplemented { .. } => "UNIMPLEMENTED",
            Self::Internal { .. } => "INTERNAL",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::DataLoss { .. } => "DATA_LOSS",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(error: std::sync::PoisonError<T>) -> Self {
        Self::internal(format!("a runtime lock was poisoned: {error}"))
    }
}

impl From<prost::DecodeError> for Error {
    fn from(error: prost::DecodeError) -> Self {
        Self::data_loss(format!("failed to decode Protobuf message: {error}"))
    }
}
