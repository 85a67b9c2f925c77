use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::{
    CompilationOptions, DeviceId, DeviceType, Error, ExecutionOptions, Literal, ProcessIndex, Program, ProgramShape,
    Runtime, RuntimeBuffer, RuntimeDevice, RuntimeExecutable, RuntimeLoader, Shape,
};

/// Host function that implements a [`Program::Host`] program. It receives one [`Literal`] per program parameter and
/// must return one [`Literal`] per program result.
pub type HostFunction = dyn Fn(&[Literal]) -> Result<Vec<Literal>, Error> + Send + Sync;

/// Options used to construct a [`HostRuntime`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostRuntimeOptions {
    /// [`DeviceType`] that the [`HostRuntime`] reports as its platform. The host runtime always executes on the host
    /// but it can present itself as any platform, which is useful for exercising platform-specific device naming.
    pub device_type: DeviceType,

    /// Total number of devices that the [`HostRuntime`] exposes. Must be at least `1`.
    pub device_count: usize,

    /// Number of devices, out of [`HostRuntimeOptions::device_count`], that are _addressable_. The remaining devices
    /// are reported as belonging to another process. If [`None`], all devices are addressable.
    pub addressable_device_count: Option<usize>,
}

impl Default for HostRuntimeOptions {
    fn default() -> Self {
        Self { device_type: DeviceType::CPU, device_count: 1, addressable_device_count: None }
    }
}

/// [`RuntimeDevice`] of a [`HostRuntime`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostDevice {
    id: DeviceId,
    process_index: ProcessIndex,
    addressable: bool,
    device_type: DeviceType,
}

impl RuntimeDevice for HostDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn process_index(&self) -> ProcessIndex {
        self.process_index
    }

    fn is_addressable(&self) -> bool {
        self.addressable
    }
}

impl Display for HostDevice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.device_type.platform_name(), self.id)
    }
}

/// [`RuntimeBuffer`] of a [`HostRuntime`]. Host buffers are backed by an immutable [`Literal`] that is shared between
/// all clones of the buffer, and they are always ready.
#[derive(Clone)]
pub struct HostBuffer {
    device: HostDevice,
    literal: Arc<Literal>,
}

impl RuntimeBuffer for HostBuffer {
    type Device = HostDevice;

    fn device(&self) -> HostDevice {
        self.device.clone()
    }

    fn on_device_shape(&self) -> Result<Shape, Error> {
        Ok(self.literal.shape().clone())
    }

    fn ready(&self) -> Result<(), Error> {
        Ok(())
    }

    fn to_literal(&self) -> Result<Literal, Error> {
        Ok(self.literal.as_ref().clone())
    }
}

impl Debug for HostBuffer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "HostBuffer[{}; {}]", self.literal.shape(), self.device)
    }
}

#[derive(Clone)]
struct HostProgram {
    shape: ProgramShape,
    function: Arc<HostFunction>,
}

/// In-process [`Runtime`] that keeps its buffers in host memory and executes [`Program::Host`] programs by invoking
/// host functions that were registered ahead of time using [`HostRuntime::register_program`]. The host runtime does
/// not include a compiler and so it cannot compile [`Program::Mlir`] or [`Program::Hlo`] programs.
///
/// Executables run once per participating device and each device sees only its own arguments. Host programs therefore
/// cannot contain collectives, but they are otherwise executed with the same device assignment and argument
/// validation rules that native runtimes apply.
pub struct HostRuntime {
    options: HostRuntimeOptions,
    devices: Vec<HostDevice>,
    programs: RwLock<HashMap<String, HostProgram>>,
}

impl HostRuntime {
    /// Creates a new [`HostRuntime`] using the provided [`HostRuntimeOptions`].
    pub fn new(options: HostRuntimeOptions) -> Result<Self, Error> {
        if options.device_count == 0 {
            return Err(Error::invalid_argument("a host runtime must have at least one device"));
        }
        let addressable_device_count = options.addressable_device_count.unwrap_or(options.device_count);
        if addressable_device_count > options.device_count {
            return Err(Error::invalid_argument(format!(
                "the number of addressable devices ({addressable_device_count}) cannot exceed the total number \
                of devices ({})",
                options.device_count,
            )));
        }
        let devices = (0..options.device_count)
            .map(|id| {
                let addressable = id < addressable_device_count;
                let process_index = if addressable { 0 } else { 1 };
                HostDevice { id, process_index, addressable, device_type: options.device_type }
            })
            .collect();
        debug!(
            platform = options.device_type.platform_name(),
            device_count = options.device_count,
            addressable_device_count,
            "created host runtime",
        );
        Ok(Self { options, devices, programs: RwLock::new(HashMap::new()) })
    }

    /// [`HostRuntimeOptions`] that this [`HostRuntime`] was constructed with.
    pub fn options(&self) -> &HostRuntimeOptions {
        &self.options
    }

    /// Registers a host function under `name` so that [`Program::Host`] programs with that name can be compiled by
    /// this runtime. `shape` describes the parameters and results of the function and is what compiled executables
    /// report as their [`ProgramShape`]. Registering two programs with the same name results in an
    /// [`Error::AlreadyExists`].
    pub fn register_program<N, F>(&self, name: N, shape: ProgramShape, function: F) -> Result<(), Error>
    where
        N: Into<String>,
        F: Fn(&[Literal]) -> Result<Vec<Literal>, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut programs = self.programs.write()?;
        if programs.contains_key(&name) {
            return Err(Error::already_exists(format!("a host program named '{name}' is already registered")));
        }
        debug!(name = name.as_str(), shape = %shape, "registered host program");
        programs.insert(name, HostProgram { shape, function: Arc::new(function) });
        Ok(())
    }

    /// Returns `true` if a host program is registered under `name`.
    pub fn has_program(&self, name: &str) -> Result<bool, Error> {
        Ok(self.programs.read()?.contains_key(name))
    }
}

impl Runtime for HostRuntime {
    type Device = HostDevice;
    type Buffer = HostBuffer;
    type Executable = HostExecutable;

    fn platform_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.options.device_type.platform_name())
    }

    fn process_index(&self) -> ProcessIndex {
        0
    }

    fn devices(&self) -> Result<Vec<HostDevice>, Error> {
        Ok(self.devices.clone())
    }

    fn addressable_devices(&self) -> Result<Vec<HostDevice>, Error> {
        Ok(self.devices.iter().filter(|device| device.addressable).cloned().collect())
    }

    fn buffer_from_host_literal(&self, literal: &Literal, device: &HostDevice) -> Result<HostBuffer, Error> {
        if !self.devices.contains(device) {
            return Err(Error::invalid_argument(format!("device '{device}' does not belong to this host runtime")));
        }
        if !device.addressable {
            return Err(Error::invalid_argument(format!("cannot transfer data to non-addressable device '{device}'")));
        }
        trace!(shape = %literal.shape(), device = %device, "copying literal into host buffer");
        Ok(HostBuffer { device: device.clone(), literal: Arc::new(literal.clone()) })
    }

    fn compile(&self, program: &Program, options: &CompilationOptions) -> Result<HostExecutable, Error> {
        let name = match program {
            Program::Host { name } => name,
            program => {
                return Err(Error::unimplemented(format!(
                    "the host runtime cannot compile '{}' programs",
                    program.format(),
                )));
            }
        };
        let program = self
            .programs
            .read()?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no host program named '{name}' is registered")))?;

        let execution_count = options.replica_count().checked_mul(options.partition_count()).ok_or_else(|| {
            Error::invalid_argument(format!(
                "the requested numbers of replicas ({}) and partitions ({}) overflow",
                options.replica_count(),
                options.partition_count(),
            ))
        })?;
        let device_ordinal = options.executable_build_options.as_ref().map(|options| options.device_ordinal);
        let devices = match device_ordinal {
            Some(ordinal) if ordinal >= 0 && execution_count == 1 => {
                let device = self.devices.get(ordinal as usize).ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "device ordinal {ordinal} is out of range for a runtime with {} device(s)",
                        self.devices.len(),
                    ))
                })?;
                vec![device.clone()]
            }
            _ if execution_count > self.devices.len() => {
                return Err(Error::invalid_argument(format!(
                    "the program requires {} replica(s) and {} partition(s) but the runtime only has {} device(s)",
                    options.replica_count(),
                    options.partition_count(),
                    self.devices.len(),
                )));
            }
            _ => self.devices[..execution_count].to_vec(),
        };

        debug!(
            name = name.as_str(),
            replica_count = options.replica_count(),
            partition_count = options.partition_count(),
            use_spmd_partitioning = options.use_spmd_partitioning(),
            "compiled host program",
        );
        Ok(HostExecutable { name: name.clone(), program, options: options.serialize(), devices })
    }
}

/// [`RuntimeExecutable`] of a [`HostRuntime`].
pub struct HostExecutable {
    name: String,
    program: HostProgram,

    /// Serialized [`CompilationOptions`] that this executable was compiled with.
    options: Vec<u8>,

    /// Devices that this executable runs on, including non-addressable ones.
    devices: Vec<HostDevice>,
}

impl HostExecutable {
    /// Runs the underlying host function for a single device after validating the provided arguments.
    fn run(
        &self,
        device_index: usize,
        device: &HostDevice,
        arguments: &[&HostBuffer],
        options: &ExecutionOptions,
    ) -> Result<Vec<HostBuffer>, Error> {
        let parameters = &self.program.shape.parameters;
        if arguments.len() != parameters.len() {
            return Err(Error::invalid_argument(format!(
                "expected {} input(s) for each device but got {} for device {device_index}",
                parameters.len(),
                arguments.len(),
            )));
        }
        for (argument_index, (argument, parameter)) in arguments.iter().zip(parameters).enumerate() {
            if &argument.device != device {
                return Err(Error::invalid_argument(format!(
                    "input {argument_index} for device {device_index} is placed on device '{}' instead of '{device}'",
                    argument.device,
                )));
            }
            let shape = argument.literal.shape();
            let matches = if options.strict_shape_checking {
                shape == parameter
            } else {
                shape.element_type() == parameter.element_type() && shape.element_count()? == parameter.element_count()?
            };
            if !matches {
                return Err(Error::invalid_argument(format!(
                    "input {argument_index} for device {device_index} has shape '{shape}' \
                    which is incompatible with parameter shape '{parameter}'",
                )));
            }
        }

        trace!(name = self.name.as_str(), device = %device, launch_id = options.launch_id, "executing host program");
        let inputs = arguments.iter().map(|argument| argument.literal.as_ref().clone()).collect::<Vec<_>>();
        let outputs = (self.program.function)(&inputs)?;
        let results = &self.program.shape.results;
        if outputs.len() != results.len() {
            return Err(Error::internal(format!(
                "host program '{}' returned {} output(s) but its program shape declares {}",
                self.name,
                outputs.len(),
                results.len(),
            )));
        }
        outputs
            .into_iter()
            .zip(results)
            .map(|(output, result)| {
                if output.shape() != result {
                    return Err(Error::internal(format!(
                        "host program '{}' returned an output with shape '{}' instead of '{result}'",
                        self.name,
                        output.shape(),
                    )));
                }
                Ok(HostBuffer { device: device.clone(), literal: Arc::new(output) })
            })
            .collect()
    }
}

impl RuntimeExecutable for HostExecutable {
    type Device = HostDevice;
    type Buffer = HostBuffer;

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.name.as_str())
    }

    fn program_shape(&self) -> Result<ProgramShape, Error> {
        Ok(self.program.shape.clone())
    }

    fn compilation_options(&self) -> Result<CompilationOptions, Error> {
        CompilationOptions::deserialize(&self.options)
    }

    fn addressable_devices(&self) -> Result<Vec<HostDevice>, Error> {
        Ok(self.devices.iter().filter(|device| device.addressable).cloned().collect())
    }

    fn execute(
        &self,
        arguments: &[Vec<&HostBuffer>],
        options: &ExecutionOptions,
    ) -> Result<Vec<Vec<HostBuffer>>, Error> {
        let devices = self.addressable_devices()?;
        if arguments.len() != devices.len() {
            return Err(Error::invalid_argument(format!(
                "expected inputs for {} device(s) but got inputs for {} device(s)",
                devices.len(),
                arguments.len(),
            )));
        }
        devices
            .iter()
            .zip(arguments)
            .enumerate()
            .map(|(device_index, (device, arguments))| self.run(device_index, device, arguments, options))
            .collect()
    }

    fn execute_sharded(
        &self,
        arguments: &[&HostBuffer],
        device: &HostDevice,
        options: &ExecutionOptions,
    ) -> Result<Vec<HostBuffer>, Error> {
        let device_index = self.devices.iter().position(|candidate| candidate == device).ok_or_else(|| {
            Error::invalid_argument(format!("executable '{}' was not compiled for device '{device}'", self.name))
        })?;
        if !device.addressable {
            return Err(Error::invalid_argument(format!("cannot execute on non-addressable device '{device}'")));
        }
        self.run(device_index, device, arguments, options)
    }
}

/// [`RuntimeLoader`] that produces [`HostRuntime`]s. The loaded runtimes present themselves as the requested
/// [`DeviceType`] and use the remaining [`HostRuntimeOptions`] of this loader.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HostRuntimeLoader {
    options: HostRuntimeOptions,
}

impl HostRuntimeLoader {
    /// Creates a new [`HostRuntimeLoader`] that uses the provided [`HostRuntimeOptions`] for the runtimes it loads.
    pub fn new(options: HostRuntimeOptions) -> Self {
        Self { options }
    }
}

impl RuntimeLoader for HostRuntimeLoader {
    type Runtime = HostRuntime;

    fn load(&self, device_type: DeviceType) -> Result<HostRuntime, Error> {
        HostRuntime::new(HostRuntimeOptions { device_type, ..self.options.clone() })
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{add_one_runtime, f32_vector};
    use crate::{
        BufferType, CompilationOptions, DeviceType, Error, ExecutableCompilationOptions, ExecutionOptions,
        HostRuntime, HostRuntimeLoader, HostRuntimeOptions, Literal, Program, ProgramShape, Runtime, RuntimeBuffer,
        RuntimeDevice, RuntimeExecutable, RuntimeLoader, Shape,
    };

    fn options(replica_count: i64, partition_count: i64) -> CompilationOptions {
        CompilationOptions {
            executable_build_options: Some(ExecutableCompilationOptions {
                device_ordinal: -1,
                replica_count,
                partition_count,
                use_spmd_partitioning: partition_count > 1,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_host_runtime_devices() {
        let runtime = HostRuntime::new(HostRuntimeOptions {
            device_type: DeviceType::TPU,
            device_count: 4,
            addressable_device_count: Some(3),
        })
        .unwrap();
        assert_eq!(runtime.platform_name(), "tpu");
        assert_eq!(runtime.process_index(), 0);
        assert_eq!(runtime.device_count(), Ok(4));
        assert_eq!(runtime.addressable_device_count(), Ok(3));

        let devices = runtime.devices().unwrap();
        assert_eq!(devices.iter().map(|device| device.id()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(devices[2].is_addressable());
        assert!(!devices[3].is_addressable());
        assert_eq!(devices[3].process_index(), 1);
        assert_eq!(devices[1].to_string(), "tpu:1");

        assert!(matches!(
            HostRuntime::new(HostRuntimeOptions { device_count: 0, ..Default::default() }),
            Err(Error::InvalidArgument { .. }),
        ));
        assert!(matches!(
            HostRuntime::new(HostRuntimeOptions {
                device_count: 2,
                addressable_device_count: Some(3),
                ..Default::default()
            }),
            Err(Error::InvalidArgument { .. }),
        ));
    }

    #[test]
    fn test_host_runtime_loader() {
        let loader = HostRuntimeLoader::new(HostRuntimeOptions { device_count: 2, ..Default::default() });
        let runtime = loader.load(DeviceType::TPU).unwrap();
        assert_eq!(runtime.platform_name(), "tpu");
        assert_eq!(runtime.device_count(), Ok(2));
        assert_eq!(HostRuntimeLoader::default().load(DeviceType::CPU).unwrap().device_count(), Ok(1));
    }

    #[test]
    fn test_host_buffer() {
        let runtime = HostRuntime::new(HostRuntimeOptions {
            device_count: 2,
            addressable_device_count: Some(1),
            ..Default::default()
        })
        .unwrap();
        let devices = runtime.devices().unwrap();
        let literal = f32_vector(&[1.0, -2.5, f32::NAN]);
        let buffer = runtime.buffer_from_host_literal(&literal, &devices[0]).unwrap();
        assert_eq!(buffer.ready(), Ok(()));
        assert_eq!(buffer.device(), devices[0]);
        assert_eq!(buffer.on_device_shape(), Ok(Shape::new(BufferType::F32, [3])));
        assert_eq!(buffer.to_literal().unwrap().untyped_data(), literal.untyped_data());
        assert_eq!(format!("{buffer:?}"), "HostBuffer[f32[3]; cpu:0]");
        assert!(matches!(
            runtime.buffer_from_host_literal(&literal, &devices[1]),
            Err(Error::InvalidArgument { .. }),
        ));
    }

    #[test]
    fn test_host_runtime_program_registration() {
        let runtime = add_one_runtime(1);
        assert_eq!(runtime.has_program("add_one"), Ok(true));
        assert_eq!(runtime.has_program("add_two"), Ok(false));
        assert!(matches!(
            runtime.register_program("add_one", ProgramShape::default(), |_| Ok(Vec::new())),
            Err(Error::AlreadyExists { .. }),
        ));
    }

    #[test]
    fn test_host_runtime_compile() {
        let runtime = add_one_runtime(4);
        let executable = runtime.compile(&Program::host("add_one"), &options(4, 1)).unwrap();
        assert_eq!(executable.name(), "add_one");
        assert_eq!(executable.addressable_devices().unwrap().len(), 4);
        assert_eq!(executable.compilation_options(), Ok(options(4, 1)));
        assert_eq!(executable.program_shape().unwrap().to_string(), "(f32[3]) -> (f32[3])");

        let executable = runtime.compile(&Program::host("add_one"), &CompilationOptions::default()).unwrap();
        assert_eq!(executable.addressable_devices().unwrap().len(), 1);

        let mut single_device = options(1, 1);
        if let Some(options) = single_device.executable_build_options.as_mut() {
            options.device_ordinal = 2;
        }
        let executable = runtime.compile(&Program::host("add_one"), &single_device).unwrap();
        assert_eq!(executable.addressable_devices().unwrap().iter().map(|d| d.id()).collect::<Vec<_>>(), vec![2]);

        assert!(matches!(
            runtime.compile(&Program::host("add_one"), &options(1, 8)),
            Err(Error::InvalidArgument { .. }),
        ));
        assert!(matches!(
            runtime.compile(&Program::host("add_one"), &options(i64::MAX, i64::MAX)),
            Err(Error::InvalidArgument { message, .. }) if message.ends_with("overflow"),
        ));
        assert!(matches!(runtime.compile(&Program::host("missing"), &options(1, 1)), Err(Error::NotFound { .. })));
        assert!(matches!(
            runtime.compile(&Program::Hlo { proto: Vec::new() }, &options(1, 1)),
            Err(Error::Unimplemented { message, .. }) if message == "the host runtime cannot compile 'hlo' programs",
        ));
        assert!(matches!(
            runtime.compile(&Program::Mlir { bytecode: Vec::new() }, &options(1, 1)),
            Err(Error::Unimplemented { .. }),
        ));
    }

    #[test]
    fn test_host_executable_execute() {
        let runtime = add_one_runtime(2);
        let devices = runtime.devices().unwrap();
        let executable = runtime.compile(&Program::host("add_one"), &options(1, 2)).unwrap();
        let x0 = runtime.buffer_from_host_literal(&f32_vector(&[1.0, 2.0, 3.0]), &devices[0]).unwrap();
        let x1 = runtime.buffer_from_host_literal(&f32_vector(&[-1.0, -2.0, -3.0]), &devices[1]).unwrap();

        let outputs = executable.execute(&[vec![&x0], vec![&x1]], &ExecutionOptions::default()).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0][0].device(), devices[0]);
        assert_eq!(outputs[1][0].device(), devices[1]);
        assert_eq!(outputs[0][0].to_literal().unwrap().to_vec::<f32>(), Ok(vec![2.0, 3.0, 4.0]));
        assert_eq!(outputs[1][0].to_literal().unwrap().to_vec::<f32>(), Ok(vec![0.0, -1.0, -2.0]));

        assert!(matches!(
            executable.execute(&[vec![&x0]], &ExecutionOptions::default()),
            Err(Error::InvalidArgument { message, .. })
                if message == "expected inputs for 2 device(s) but got inputs for 1 device(s)",
        ));
        assert!(matches!(
            executable.execute(&[vec![&x0], vec![]], &ExecutionOptions::default()),
            Err(Error::InvalidArgument { message, .. })
                if message == "expected 1 input(s) for each device but got 0 for device 1",
        ));
        assert!(matches!(
            executable.execute(&[vec![&x0], vec![&x0]], &ExecutionOptions::default()),
            Err(Error::InvalidArgument { .. }),
        ));
    }

    #[test]
    fn test_host_executable_execute_sharded() {
        let runtime = add_one_runtime(2);
        let devices = runtime.devices().unwrap();
        let executable = runtime.compile(&Program::host("add_one"), &options(2, 1)).unwrap();
        let x = runtime.buffer_from_host_literal(&f32_vector(&[0.5, 1.5, 2.5]), &devices[1]).unwrap();
        let outputs = executable.execute_sharded(&[&x], &devices[1], &ExecutionOptions::default()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].device(), devices[1]);
        assert_eq!(outputs[0].to_literal().unwrap().to_vec::<f32>(), Ok(vec![1.5, 2.5, 3.5]));
        assert!(matches!(
            executable.execute_sharded(&[&x], &devices[0], &ExecutionOptions::default()),
            Err(Error::InvalidArgument { .. }),
        ));
    }

    #[test]
    fn test_host_executable_shape_checking() {
        let runtime = add_one_runtime(1);
        let device = runtime.devices().unwrap().remove(0);
        let executable = runtime.compile(&Program::host("add_one"), &options(1, 1)).unwrap();
        let reshaped = Literal::from_values([3, 1], &[1.0f32, 2.0, 3.0]).unwrap();
        let x = runtime.buffer_from_host_literal(&reshaped, &device).unwrap();
        let strict = ExecutionOptions::default();
        let relaxed = ExecutionOptions { strict_shape_checking: false, ..strict };
        assert!(matches!(executable.execute_sharded(&[&x], &device, &strict), Err(Error::InvalidArgument { .. })));

        let outputs = executable.execute_sharded(&[&x], &device, &relaxed).unwrap();
        assert_eq!(outputs[0].to_literal().unwrap().to_vec::<f32>(), Ok(vec![2.0, 3.0, 4.0]));

        let x = runtime.buffer_from_host_literal(&Literal::from_values([3], &[1i32, 2, 3]).unwrap(), &device).unwrap();
        assert!(matches!(executable.execute_sharded(&[&x], &device, &relaxed), Err(Error::InvalidArgument { .. })));
    }
}
