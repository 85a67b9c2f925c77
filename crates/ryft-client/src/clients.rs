use std::sync::Arc;

use ryft_runtime::{
    CompilationOptions, ExecutableCompilationOptions, Literal, Runtime, RuntimeBuffer, RuntimeExecutable,
    RuntimeLoader, Shape,
};
use tracing::{debug, info, trace};

use crate::{
    ClientConfig, CompileInstance, Computation, Data, DeviceDirectory, Error, ExecuteComputationOptions,
    ExecutionMode, TensorSource,
};

/// Accelerator-agnostic interface that tensor engines use to move data to and from devices, and to compile and
/// execute computations. Devices are referred to by name (e.g., `"TPU:0"`; see [`DeviceName`](crate::DeviceName)).
pub trait ComputationClient {
    /// Type of the runtime buffers that back the [`Data`] handles of this client.
    type Buffer: RuntimeBuffer;

    /// Type of the runtime executables that back the [`Computation`]s of this client.
    type Executable: RuntimeExecutable<Buffer = Self::Buffer>;

    /// Creates a new placeholder [`Data`] handle on the provided device that does not hold a buffer. Placeholders
    /// can be filled in later using [`Data::assign`].
    fn create_data_placeholder(&self, device: &str, shape: Shape) -> Result<Data<Self::Buffer>, Error>;

    /// Transfers the provided [`TensorSource`]s to their devices, returning one [`Data`] handle per tensor source.
    /// Each transfer completes before this function moves on to the next tensor source.
    fn transfer_to_server(&self, tensors: &[TensorSource]) -> Result<Vec<Data<Self::Buffer>>, Error>;

    /// Copies the contents of the provided [`Data`] handles back to the host, returning one [`Literal`] per handle.
    fn transfer_from_server(&self, handles: &[Data<Self::Buffer>]) -> Result<Vec<Literal>, Error>;

    /// Compiles the provided [`CompileInstance`]s, returning one [`Computation`] per instance.
    fn compile(&self, instances: Vec<CompileInstance>) -> Result<Vec<Arc<Computation<Self::Executable>>>, Error>;

    /// Executes `computation` with the provided arguments and returns its results. How the computation is launched
    /// depends on the [`ExecutionMode`] of the client:
    ///
    ///   - [`ExecutionMode::Spmd`]: the computation is launched on every device of the system with the same
    ///     `arguments`, `device` is ignored, and the results of the first device are returned.
    ///   - [`ExecutionMode::Replicated`]: the computation is launched on `device` only.
    ///
    /// In both cases, all arguments must live on the device that they are passed to.
    fn execute_computation(
        &self,
        computation: &Computation<Self::Executable>,
        arguments: &[Data<Self::Buffer>],
        device: &str,
        options: &ExecuteComputationOptions,
    ) -> Result<Vec<Data<Self::Buffer>>, Error>;

    /// Executes `computation` on every device of the system, using the `i`-th entry of `arguments` as the arguments
    /// for the `i`-th device in [`ComputationClient::all_devices`] order. Returns the results of all devices in the
    /// same order.
    fn execute_replicated(
        &self,
        computation: &Computation<Self::Executable>,
        arguments: &[Vec<Data<Self::Buffer>>],
        options: &ExecuteComputationOptions,
    ) -> Result<Vec<Vec<Data<Self::Buffer>>>, Error>;

    /// Number of devices that are addressable from this process.
    fn device_count(&self) -> usize;

    /// Name of the first device that is addressable from this process.
    fn default_device(&self) -> Result<String, Error>;

    /// Names of the devices that are addressable from this process.
    fn local_devices(&self) -> Vec<String>;

    /// Names of all devices of the system, including the ones that are not addressable from this process.
    fn all_devices(&self) -> Vec<String>;

    /// Sets the devices that participate in replicated computations.
    fn set_replication_devices(&mut self, devices: Arc<Vec<String>>);

    /// Devices that participate in replicated computations, if they have been set.
    fn replication_devices(&self) -> Option<Arc<Vec<String>>>;
}

/// [`ComputationClient`] that is backed by a PJRT-style [`Runtime`].
pub struct PjRtComputationClient<R: Runtime> {
    runtime: R,
    config: ClientConfig,
    directory: DeviceDirectory<R::Device>,
    local_devices: Vec<String>,
    replication_devices: Option<Arc<Vec<String>>>,
}

impl<R: Runtime> PjRtComputationClient<R> {
    /// Creates a new [`PjRtComputationClient`] that wraps the provided [`Runtime`].
    pub fn new(runtime: R, config: ClientConfig) -> Result<Self, Error> {
        let directory = DeviceDirectory::new(runtime.platform_name(), runtime.devices()?)?;
        let local_devices = directory.names_of(&runtime.addressable_devices()?);
        info!(
            platform = directory.platform(),
            execution_mode = %config.execution_mode,
            device_count = directory.len(),
            addressable_device_count = local_devices.len(),
            "initialized PJRT computation client",
        );
        Ok(Self { runtime, config, directory, local_devices, replication_devices: None })
    }

    /// Creates a new [`PjRtComputationClient`] by loading a [`Runtime`] for the
    /// [`DeviceType`](ryft_runtime::DeviceType) in `config` using the provided [`RuntimeLoader`].
    pub fn from_config<L: RuntimeLoader<Runtime = R>>(loader: &L, config: ClientConfig) -> Result<Self, Error> {
        debug!(device_type = %config.device_type, "initializing PJRT runtime");
        Self::new(loader.load(config.device_type)?, config)
    }

    /// Creates a new [`PjRtComputationClient`] whose configuration is read from the environment
    /// (see [`ClientConfig::from_env`]).
    pub fn from_env<L: RuntimeLoader<Runtime = R>>(loader: &L) -> Result<Self, Error> {
        Self::from_config(loader, ClientConfig::from_env()?)
    }

    /// Underlying [`Runtime`].
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// [`ClientConfig`] of this client.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// [`DeviceDirectory`] that maps device names to runtime devices.
    pub fn directory(&self) -> &DeviceDirectory<R::Device> {
        &self.directory
    }

    fn compilation_options(&self) -> CompilationOptions {
        let device_count = self.directory.len() as i64;
        let executable_build_options = match self.config.execution_mode {
            ExecutionMode::Spmd => ExecutableCompilationOptions {
                device_ordinal: -1,
                replica_count: 1,
                partition_count: device_count,
                use_spmd_partitioning: true,
                ..Default::default()
            },
            ExecutionMode::Replicated => ExecutableCompilationOptions {
                device_ordinal: -1,
                replica_count: device_count,
                partition_count: 1,
                ..Default::default()
            },
        };
        CompilationOptions { executable_build_options: Some(executable_build_options), ..Default::default() }
    }

    /// Collects the buffers of `arguments`, checking that all of them live on `device`, both according to their
    /// [`Data`] handles and according to the buffers themselves.
    fn argument_buffers<'d>(
        &self,
        device_name: &str,
        device: &R::Device,
        arguments: &'d [Data<R::Buffer>],
    ) -> Result<Vec<&'d R::Buffer>, Error> {
        arguments
            .iter()
            .map(|argument| {
                if argument.device() != device_name {
                    return Err(Error::device_mismatch(device_name, argument.device()));
                }
                let buffer = argument.require_buffer()?;
                let buffer_device = buffer.device();
                if &buffer_device != device {
                    return Err(Error::device_mismatch(device_name, self.directory.name_of(&buffer_device)));
                }
                Ok(buffer)
            })
            .collect()
    }

    fn wrap_results(device_name: &str, buffers: Vec<R::Buffer>) -> Result<Vec<Data<R::Buffer>>, Error> {
        buffers
            .into_iter()
            .map(|buffer| {
                let shape = buffer.on_device_shape()?;
                Ok(Data::new(device_name, shape, buffer))
            })
            .collect()
    }

    /// Wraps the per-device `results` of an execution on all devices, labeling the `i`-th result list with the
    /// `i`-th entry of `device_names`. Every device must have produced a result list.
    fn wrap_device_results(
        device_names: &[String],
        results: Vec<Vec<R::Buffer>>,
    ) -> Result<Vec<Vec<Data<R::Buffer>>>, Error> {
        if results.len() != device_names.len() {
            return Err(Error::result_count_mismatch(device_names.len(), results.len()));
        }
        device_names
            .iter()
            .zip(results)
            .map(|(device_name, buffers)| Self::wrap_results(device_name, buffers))
            .collect()
    }

    /// Launches `computation` on all devices of the system, in directory order, using `arguments[i]` as the
    /// arguments for the `i`-th device.
    fn execute_on_all_devices(
        &self,
        computation: &Computation<R::Executable>,
        arguments: &[&[Data<R::Buffer>]],
        options: &ExecuteComputationOptions,
    ) -> Result<Vec<Vec<Data<R::Buffer>>>, Error> {
        let device_names = self.directory.names();
        if arguments.len() != device_names.len() {
            return Err(Error::argument_count_mismatch(device_names.len(), arguments.len()));
        }
        let argument_handles = device_names
            .iter()
            .zip(arguments)
            .map(|(device_name, arguments)| {
                let device = self.directory.get_addressable(device_name)?;
                self.argument_buffers(device_name, device, arguments)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let strict_shape_checking = self.config.execution_mode == ExecutionMode::Spmd;
        let results = computation
            .executable()
            .execute(&argument_handles, &options.to_execution_options(strict_shape_checking))?;
        let results = Self::wrap_device_results(device_names, results)?;
        debug!(computation = computation.name(), result_sets = results.len(), "executed computation on all devices");
        Ok(results)
    }
}

impl<R: Runtime> ComputationClient for PjRtComputationClient<R> {
    type Buffer = R::Buffer;
    type Executable = R::Executable;

    fn create_data_placeholder(&self, device: &str, shape: Shape) -> Result<Data<R::Buffer>, Error> {
        self.directory.get(device)?;
        Ok(Data::placeholder(device, shape))
    }

    fn transfer_to_server(&self, tensors: &[TensorSource]) -> Result<Vec<Data<R::Buffer>>, Error> {
        tensors
            .iter()
            .map(|tensor| {
                let mut literal = Literal::new(tensor.shape().clone())?;
                tensor.populate(literal.untyped_data_mut())?;
                let device = self.directory.get_addressable(tensor.device())?;
                let buffer = self.runtime.buffer_from_host_literal(&literal, device)?;
                buffer.ready()?;
                trace!(shape = %tensor.shape(), device = tensor.device(), "transferred tensor to device");
                Ok(Data::new(tensor.device(), tensor.shape().clone(), buffer))
            })
            .collect()
    }

    fn transfer_from_server(&self, handles: &[Data<R::Buffer>]) -> Result<Vec<Literal>, Error> {
        handles.iter().map(|handle| Ok(handle.require_buffer()?.to_literal()?)).collect()
    }

    fn compile(&self, instances: Vec<CompileInstance>) -> Result<Vec<Arc<Computation<R::Executable>>>, Error> {
        let options = self.compilation_options();
        instances
            .into_iter()
            .map(|instance| {
                self.directory.get(&instance.compilation_device)?;
                let executable = self.runtime.compile(&instance.program, &options)?;
                let program_shape = executable.program_shape()?;
                let compilation_options = executable.compilation_options()?;
                debug!(
                    computation = instance.name.as_str(),
                    format = instance.program.format(),
                    program_shape = %program_shape,
                    replica_count = compilation_options.replica_count(),
                    partition_count = compilation_options.partition_count(),
                    "compiled computation",
                );
                Ok(Arc::new(Computation::new(
                    instance.name,
                    executable,
                    program_shape,
                    instance.devices,
                    compilation_options,
                )))
            })
            .collect()
    }

    fn execute_computation(
        &self,
        computation: &Computation<R::Executable>,
        arguments: &[Data<R::Buffer>],
        device: &str,
        options: &ExecuteComputationOptions,
    ) -> Result<Vec<Data<R::Buffer>>, Error> {
        match self.config.execution_mode {
            ExecutionMode::Spmd => {
                debug!(computation = computation.name(), "executing computation on all devices in SPMD mode");
                let arguments = vec![arguments; self.directory.len()];
                let results = self.execute_on_all_devices(computation, &arguments, options)?;
                Ok(results.into_iter().next().unwrap_or_default())
            }
            ExecutionMode::Replicated => {
                debug!(computation = computation.name(), device, "executing computation");
                let pjrt_device = self.directory.get_addressable(device)?;
                let buffers = self.argument_buffers(device, pjrt_device, arguments)?;
                let results = computation.executable().execute_sharded(
                    &buffers,
                    pjrt_device,
                    &options.to_execution_options(false),
                )?;
                let results = Self::wrap_results(device, results)?;
                debug!(computation = computation.name(), device, result_count = results.len(), "executed computation");
                Ok(results)
            }
        }
    }

    fn execute_replicated(
        &self,
        computation: &Computation<R::Executable>,
        arguments: &[Vec<Data<R::Buffer>>],
        options: &ExecuteComputationOptions,
    ) -> Result<Vec<Vec<Data<R::Buffer>>>, Error> {
        let arguments = arguments.iter().map(Vec::as_slice).collect::<Vec<_>>();
        self.execute_on_all_devices(computation, &arguments, options)
    }

    fn device_count(&self) -> usize {
        self.local_devices.len()
    }

    fn default_device(&self) -> Result<String, Error> {
        self.local_devices.first().cloned().ok_or_else(Error::no_addressable_devices)
    }

    fn local_devices(&self) -> Vec<String> {
        self.local_devices.clone()
    }

    fn all_devices(&self) -> Vec<String> {
        self.directory.names().to_vec()
    }

    fn set_replication_devices(&mut self, devices: Arc<Vec<String>>) {
        self.replication_devices = Some(devices);
    }

    fn replication_devices(&self) -> Option<Arc<Vec<String>>> {
        self.replication_devices.clone()
    }
}
