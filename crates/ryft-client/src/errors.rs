use std::backtrace::Backtrace;

use thiserror::Error;

/// Represents errors that can occur when configuring or using a
/// [`PjRtComputationClient`](crate::PjRtComputationClient).
///
/// Most variants describe misuse of the client (e.g., referring to a device that does not exist or executing a
/// computation with data that lives on a different device) and are usually programming errors on the caller's side.
/// [`Error::UnknownDeviceType`] is the only variant that is raised during configuration and callers are expected to
/// stop at startup when they encounter it. Errors raised by the underlying runtime are wrapped in [`Error::Runtime`].
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("unknown PJRT_DEVICE '{value}'; the supported device types are 'CPU' and 'TPU'")]
    UnknownDeviceType { value: String, backtrace: String },

    #[error("invalid device name '{name}'; device names must have the form '<PLATFORM>:<index>'")]
    InvalidDeviceName { name: String, backtrace: String },

    #[error("unknown device '{name}'")]
    UnknownDevice { name: String, backtrace: String },

    #[error("device '{name}' is exposed more than once by the runtime")]
    DuplicateDevice { name: String, backtrace: String },

    #[error("expected data on device '{expected}' but found data on device '{actual}'")]
    DeviceMismatch { expected: String, actual: String, backtrace: String },

    #[error("device '{name}' is not addressable from this process")]
    NonAddressableDevice { name: String, backtrace: String },

    #[error("data on device '{device}' does not hold a buffer")]
    MissingBuffer { device: String, backtrace: String },

    #[error("the runtime does not expose any addressable devices")]
    NoAddressableDevices { backtrace: String },

    #[error("expected arguments for {expected} device(s) but got arguments for {actual} device(s)")]
    ArgumentCountMismatch { expected: usize, actual: usize, backtrace: String },

    #[error("expected results for {expected} device(s) but got results for {actual} device(s)")]
    ResultCountMismatch { expected: usize, actual: usize, backtrace: String },

    #[error(transparent)]
    Runtime(#[from] ryft_runtime::Error),
}

impl Error {
    /// Creates a new [`Error::UnknownDeviceType`].
    pub fn unknown_device_type<V: Into<String>>(value: V) -> Self {
        Self::UnknownDeviceType { value: value.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::InvalidDeviceName`].
    pub fn invalid_device_name<N: Into<String>>(name: N) -> Self {
        Self::InvalidDeviceName { name: name.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::UnknownDevice`].
    pub fn unknown_device<N: Into<String>>(name: N) -> Self {
        Self::UnknownDevice { name: name.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::DuplicateDevice`].
    pub fn duplicate_device<N: Into<String>>(name: N) -> Self {
        Self::DuplicateDevice { name: name.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::DeviceMismatch`].
    pub fn device_mismatch<E: Into<String>, A: Into<String>>(expected: E, actual: A) -> Self {
        Self::DeviceMismatch {
            expected: expected.into(),
            actual: actual.into(),
            backtrace: Backtrace::capture().to_string(),
        }
    }

    /// Creates a new [`Error::NonAddressableDevice`].
    pub fn non_addressable_device<N: Into<String>>(name: N) -> Self {
        Self::NonAddressableDevice { name: name.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::MissingBuffer`].
    pub fn missing_buffer<D: Into<String>>(device: D) -> Self {
        Self::MissingBuffer { device: device.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::NoAddressableDevices`].
    pub fn no_addressable_devices() -> Self {
        Self::NoAddressableDevices { backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::ArgumentCountMismatch`].
    pub fn argument_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::ArgumentCountMismatch { expected, actual, backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::ResultCountMismatch`].
    pub fn result_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::ResultCountMismatch { expected, actual, backtrace: Backtrace::capture().to_string() }
    }

    /// Returns the [`Backtrace`] that was captured when this error was created, rendered as a string. Note that
    /// backtraces are only captured when the `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` environment variables are set.
    pub fn backtrace(&self) -> &str {
        match self {
            Self::UnknownDeviceType { backtrace, .. }
            | Self::InvalidDeviceName { backtrace, .. }
            | Self::UnknownDevice { backtrace, .. }
            | Self::DuplicateDevice { backtrace, .. }
            | Self::DeviceMismatch { backtrace, .. }
            | Self::NonAddressableDevice { backtrace, .. }
            | Self::MissingBuffer { backtrace, .. }
            | Self::NoAddressableDevices { backtrace }
            | Self::ArgumentCountMismatch { backtrace, .. }
            | Self::ResultCountMismatch { backtrace, .. } => backtrace,
            Self::Runtime(error) => error.backtrace(),
        }
    }
}
