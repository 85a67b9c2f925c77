/// Program that can be compiled by a [`Runtime`](crate::Runtime). Programs can be provided in multiple formats though
/// not all runtimes support all formats. Native PJRT runtimes accept [`Program::Mlir`] and [`Program::Hlo`] programs,
/// while the [`HostRuntime`](crate::HostRuntime) only accepts [`Program::Host`] programs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// [MLIR](https://mlir.llvm.org/) program represented using its MLIR bytecode.
    Mlir {
        /// MLIR bytecode that represents a program.
        bytecode: Vec<u8>,
    },

    /// XLA HLO program.
    Hlo {
        /// Serialized [`HloModuleProto`](https://github.com/openxla/xla/blob/main/xla/service/hlo.proto#L557)
        /// message that represents a program.
        proto: Vec<u8>,
    },

    /// Program that is implemented by a host function registered with a [`HostRuntime`](crate::HostRuntime) under
    /// the provided name (see [`HostRuntime::register_program`](crate::HostRuntime::register_program)).
    Host {
        /// Name under which the host function was registered.
        name: String,
    },
}

impl Program {
    /// Creates a new [`Program::Host`] that refers to the host program registered under `name`.
    pub fn host<N: Into<String>>(name: N) -> Self {
        Self::Host { name: name.into() }
    }

    /// Returns the format of this [`Program`] as a string (e.g., `"mlir"`).
    pub fn format(&self) -> &'static str {
        match self {
            Self::Mlir { .. } => "mlir",
            Self::Hlo { .. } => "hlo",
            Self::Host { .. } => "host",
        }
    }
}

/// Options that control how a [`RuntimeExecutable`](crate::RuntimeExecutable) is executed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExecutionOptions {
    /// If `true`, programs that return a tuple have their result unpacked into one buffer per tuple element.
    pub untuple_result: bool,

    /// If `true`, the runtime checks that the shapes of the arguments match the program's parameter shapes exactly
    /// before launching an execution.
    pub strict_shape_checking: bool,

    /// Identifier for this execution as part of a potentially multi-device launch. This can be used by the runtime to
    /// detect scheduling errors, like multi-host programs being launched in different orders on different hosts.
    pub launch_id: i32,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self { untuple_result: false, strict_shape_checking: true, launch_id: 0 }
    }
}
