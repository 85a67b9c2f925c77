use std::fmt::Display;

use ryft_runtime::DeviceType;
use tracing::info;

use crate::Error;

/// Name of the environment variable that selects the [`DeviceType`] of the runtime (`"CPU"` or `"TPU"`).
pub const PJRT_DEVICE_ENV: &str = "PJRT_DEVICE";

/// Name of the environment variable that selects the [`ExecutionMode`]. A value of `"1"` selects
/// [`ExecutionMode::Spmd`] and any other value selects [`ExecutionMode::Replicated`].
pub const XLA_USE_SPMD_ENV: &str = "XLA_USE_SPMD";

/// Determines both how computations are compiled and how they are executed by a
/// [`PjRtComputationClient`](crate::PjRtComputationClient). The mode is fixed when the client is constructed and so
/// compilation and execution always agree on it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// All devices jointly run a single replica of each computation, which is partitioned across them using
    /// _Single Program Multiple Data (SPMD)_ partitioning. Executions are launched on all devices at once.
    Spmd,

    /// Every device runs its own replica of each computation. Executions are launched on one device at a time.
    #[default]
    Replicated,
}

impl ExecutionMode {
    /// Returns the [`ExecutionMode`] that corresponds to the provided value of the [`XLA_USE_SPMD_ENV`] flag.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some("1") => Self::Spmd,
            _ => Self::Replicated,
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spmd => write!(formatter, "spmd"),
            Self::Replicated => write!(formatter, "replicated"),
        }
    }
}

/// Configuration of a [`PjRtComputationClient`](crate::PjRtComputationClient).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    /// [`DeviceType`] of the runtime that the client connects to.
    pub device_type: DeviceType,

    /// [`ExecutionMode`] used for all compilations and executions.
    pub execution_mode: ExecutionMode,
}

impl ClientConfig {
    /// Creates a new [`ClientConfig`] for the provided [`DeviceType`] that uses [`ExecutionMode::Replicated`].
    pub fn new(device_type: DeviceType) -> Self {
        Self { device_type, execution_mode: ExecutionMode::default() }
    }

    /// Returns a copy of this [`ClientConfig`] that uses the provided [`ExecutionMode`].
    pub fn with_execution_mode(self, execution_mode: ExecutionMode) -> Self {
        Self { execution_mode, ..self }
    }

    /// Reads a [`ClientConfig`] from the [`PJRT_DEVICE_ENV`] and [`XLA_USE_SPMD_ENV`] environment variables. This is
    /// meant to be called once at startup; a missing or unsupported device type is an unrecoverable configuration
    /// error.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`], except that variables are resolved using the provided `lookup` function
    /// instead of the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, Error> {
        let device_type = lookup(PJRT_DEVICE_ENV).unwrap_or_default();
        let device_type = DeviceType::from_str(&device_type).map_err(|_| Error::unknown_device_type(device_type))?;
        let execution_mode = ExecutionMode::from_flag(lookup(XLA_USE_SPMD_ENV).as_deref());
        info!(%device_type, %execution_mode, "loaded computation client configuration");
        Ok(Self { device_type, execution_mode })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ryft_runtime::DeviceType;

    use crate::{ClientConfig, Error, ExecutionMode};

    fn lookup(variables: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let variables = variables
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| variables.get(name).cloned()
    }

    #[test]
    fn test_execution_mode() {
        assert_eq!(ExecutionMode::from_flag(Some("1")), ExecutionMode::Spmd);
        assert_eq!(ExecutionMode::from_flag(Some("0")), ExecutionMode::Replicated);
        assert_eq!(ExecutionMode::from_flag(Some("true")), ExecutionMode::Replicated);
        assert_eq!(ExecutionMode::from_flag(Some("")), ExecutionMode::Replicated);
        assert_eq!(ExecutionMode::from_flag(None), ExecutionMode::Replicated);
        assert_eq!(ExecutionMode::Spmd.to_string(), "spmd");
    }

    #[test]
    fn test_client_config_from_lookup() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("PJRT_DEVICE", "TPU"), ("XLA_USE_SPMD", "1")])),
            Ok(ClientConfig { device_type: DeviceType::TPU, execution_mode: ExecutionMode::Spmd }),
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("PJRT_DEVICE", "CPU"), ("XLA_USE_SPMD", "0")])),
            Ok(ClientConfig::new(DeviceType::CPU)),
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("PJRT_DEVICE", "CPU")])),
            Ok(ClientConfig::new(DeviceType::CPU)),
        );
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("PJRT_DEVICE", "GPU")])),
            Err(Error::UnknownDeviceType { value, .. }) if value == "GPU",
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("PJRT_DEVICE", "cpu")])),
            Err(Error::UnknownDeviceType { .. }),
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("XLA_USE_SPMD", "1")])),
            Err(Error::UnknownDeviceType { value, .. }) if value.is_empty(),
        ));
    }

    #[test]
    fn test_client_config_with_execution_mode() {
        let config = ClientConfig::new(DeviceType::TPU).with_execution_mode(ExecutionMode::Spmd);
        assert_eq!(config.device_type, DeviceType::TPU);
        assert_eq!(config.execution_mode, ExecutionMode::Spmd);
    }
}
