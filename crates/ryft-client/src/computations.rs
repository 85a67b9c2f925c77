use std::borrow::Cow;
use std::fmt::Debug;

use ryft_runtime::{CompilationOptions, ExecutionOptions, Program, ProgramShape, RuntimeExecutable};

/// Request to compile a single [`Program`] using
/// [`ComputationClient::compile`](crate::ComputationClient::compile).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompileInstance {
    /// Name of the computation, used for logging.
    pub name: String,

    /// [`Program`] to compile.
    pub program: Program,

    /// Name of the device that the program is compiled for. This device must be known to the client.
    pub compilation_device: String,

    /// Names of the devices that the resulting [`Computation`] is meant to run on.
    pub devices: Vec<String>,
}

impl CompileInstance {
    pub fn new<N: Into<String>, D: Into<String>>(
        name: N,
        program: Program,
        compilation_device: D,
        devices: Vec<String>,
    ) -> Self {
        Self { name: name.into(), program, compilation_device: compilation_device.into(), devices }
    }
}

/// Compiled computation that is ready to be executed. Computations are immutable and are typically shared
/// using [`Arc`](std::sync::Arc)s.
pub struct Computation<E: RuntimeExecutable> {
    name: String,
    executable: E,
    program_shape: ProgramShape,
    devices: Vec<String>,
    compilation_options: CompilationOptions,
}

impl<E: RuntimeExecutable> Computation<E> {
    pub(crate) fn new(
        name: String,
        executable: E,
        program_shape: ProgramShape,
        devices: Vec<String>,
        compilation_options: CompilationOptions,
    ) -> Self {
        Self { name, executable, program_shape, devices, compilation_options }
    }

    /// Name of this [`Computation`], as provided in its [`CompileInstance`].
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Name that the runtime reports for the underlying executable.
    pub fn executable_name(&self) -> Cow<'_, str> {
        self.executable.name()
    }

    /// Underlying runtime executable.
    pub fn executable(&self) -> &E {
        &self.executable
    }

    /// [`ProgramShape`] of the entry computation, as recovered from the compiled executable.
    pub fn program_shape(&self) -> &ProgramShape {
        &self.program_shape
    }

    /// Names of the devices that this [`Computation`] is meant to run on.
    pub fn devices(&self) -> &[String] {
        self.devices.as_slice()
    }

    /// [`CompilationOptions`] that were used to compile this [`Computation`].
    pub fn compilation_options(&self) -> &CompilationOptions {
        &self.compilation_options
    }
}

impl<E: RuntimeExecutable> Debug for Computation<E> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Computation[{}; {}; devices={:?}]", self.name, self.program_shape, self.devices)
    }
}

/// Options for [`ComputationClient::execute_computation`](crate::ComputationClient::execute_computation).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExecuteComputationOptions {
    /// If `true`, computations that return a tuple have their result unpacked into one [`Data`](crate::Data) handle
    /// per tuple element. Defaults to `true`.
    pub explode_tuple: bool,
}

impl ExecuteComputationOptions {
    /// Returns the runtime [`ExecutionOptions`] that correspond to these options.
    pub(crate) fn to_execution_options(self, strict_shape_checking: bool) -> ExecutionOptions {
        ExecutionOptions { untuple_result: self.explode_tuple, strict_shape_checking, ..Default::default() }
    }
}

impl Default for ExecuteComputationOptions {
    fn default() -> Self {
        Self { explode_tuple: true }
    }
}

#[cfg(test)]
mod tests {
    use ryft_runtime::{ExecutionOptions, Program};

    use crate::{CompileInstance, ExecuteComputationOptions};

    #[test]
    fn test_compile_instance() {
        let instance = CompileInstance::new("add_one", Program::host("add_one"), "CPU:0", vec!["CPU:0".to_string()]);
        assert_eq!(instance.name, "add_one");
        assert_eq!(instance.program, Program::host("add_one"));
        assert_eq!(instance.compilation_device, "CPU:0");
        assert_eq!(instance.devices, vec!["CPU:0"]);
    }

    #[test]
    fn test_execute_computation_options() {
        let options = ExecuteComputationOptions::default();
        assert!(options.explode_tuple);
        assert_eq!(
            options.to_execution_options(true),
            ExecutionOptions { untuple_result: true, strict_shape_checking: true, launch_id: 0 },
        );
        let options = ExecuteComputationOptions { explode_tuple: false };
        assert_eq!(
            options.to_execution_options(false),
            ExecutionOptions { untuple_result: false, strict_shape_checking: false, launch_id: 0 },
        );
    }
}
