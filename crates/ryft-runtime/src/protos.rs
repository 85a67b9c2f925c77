//! Protobuf messages that are exchanged with [`Runtime`](crate::Runtime)s. The field tags match the corresponding
//! [XLA](https://github.com/openxla/xla) messages so that serialized options can be handed to native PJRT runtimes
//! as-is.

use prost::Message;

use crate::Error;

/// Options for building an executable from a [`Program`](crate::Program).
///
/// This type corresponds to `ExecutableBuildOptionsProto` in [XLA](https://github.com/openxla/xla).
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct ExecutableCompilationOptions {
    /// Ordinal ID of the device for which to compile the program. A value of `-1` indicates that this option has not
    /// been set and that the runtime is free to pick a device.
    #[prost(int64, tag = "1")]
    pub device_ordinal: i64,

    /// Number of replicas of this computation that are to be executed. Defaults to `1`.
    #[prost(int64, tag = "4")]
    pub replica_count: i64,

    /// Number of partitions in this computation. Defaults to `1`.
    #[prost(int64, tag = "5")]
    pub partition_count: i64,

    /// If `true`, use _Single Program Multiple Data (SPMD)_ partitioning when [`Self::partition_count`] is greater than
    /// `1` and XLA is requested to partition the input program. If `false`, use _Multiple Program Multiple Data (MPMD)_
    /// partitioning instead.
    #[prost(bool, tag = "6")]
    pub use_spmd_partitioning: bool,

    /// If `true`, automatically generate shardings for the _Single Program Multiple Data (SPMD)_ partitioner.
    #[prost(bool, tag = "7")]
    pub use_auto_spmd_partitioning: bool,
}

/// Options for compiling a [`Program`](crate::Program) into an executable.
///
/// This type corresponds to `CompileOptionsProto` in [XLA](https://github.com/openxla/xla).
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct CompilationOptions {
    /// If `true`, the computation expects a single tuple argument containing all parameters.
    #[prost(bool, tag = "2")]
    pub parameter_is_tupled_arguments: bool,

    /// [`ExecutableCompilationOptions`] controlling how the executable is built.
    #[prost(message, optional, tag = "3")]
    pub executable_build_options: Option<ExecutableCompilationOptions>,

    /// If `true`, the compiler will produce a portable program which can later be executed on different devices.
    #[prost(bool, tag = "4")]
    pub compile_portable_executable: bool,

    /// XLA compilation profile version.
    #[prost(int64, tag = "5")]
    pub profile_version: i64,
}

impl CompilationOptions {
    /// Number of replicas requested by these [`CompilationOptions`], treating unset values as `1`.
    pub fn replica_count(&self) -> usize {
        self.executable_build_options
            .as_ref()
            .map(|options| options.replica_count.max(1) as usize)
            .unwrap_or(1)
    }

    /// Number of partitions requested by these [`CompilationOptions`], treating unset values as `1`.
    pub fn partition_count(&self) -> usize {
        self.executable_build_options
            .as_ref()
            .map(|options| options.partition_count.max(1) as usize)
            .unwrap_or(1)
    }

    /// Returns `true` if these [`CompilationOptions`] request SPMD partitioning.
    pub fn use_spmd_partitioning(&self) -> bool {
        self.executable_build_options.as_ref().is_some_and(|options| options.use_spmd_partitioning)
    }

    /// Serializes these [`CompilationOptions`] into their Protobuf wire format.
    pub fn serialize(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Deserializes [`CompilationOptions`] from their Protobuf wire format.
    pub fn deserialize(data: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode(data)?)
    }
}
