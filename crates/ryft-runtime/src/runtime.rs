use std::borrow::Cow;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::{CompilationOptions, Error, ExecutionOptions, Literal, Program, ProgramShape, Shape};

/// Type alias used to represent device IDs, which are unique among devices of the same platform and, on multi-host
/// environments, are also unique across all devices and all hosts.
pub type DeviceId = usize;

/// Type alias used to represent process indices (i.e., in a multi-process or multi-host platform).
pub type ProcessIndex = usize;

/// Accelerator family that a [`Runtime`] is initialized for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceType {
    CPU,
    TPU,
}

impl DeviceType {
    /// Parses a [`DeviceType`] from its canonical uppercase name (i.e., `"CPU"` or `"TPU"`). Parsing is
    /// case-sensitive, and any other value results in an [`Error::InvalidArgument`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(value: S) -> Result<Self, Error> {
        match value.as_ref() {
            "CPU" => Ok(Self::CPU),
            "TPU" => Ok(Self::TPU),
            value => Err(Error::invalid_argument(format!("unknown device type '{value}'"))),
        }
    }

    /// Platform name that runtimes of this [`DeviceType`] report (e.g., `"cpu"`).
    pub fn platform_name(&self) -> &'static str {
        match self {
            Self::CPU => "cpu",
            Self::TPU => "tpu",
        }
    }
}

impl Display for DeviceType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CPU => write!(formatter, "CPU"),
            Self::TPU => write!(formatter, "TPU"),
        }
    }
}

/// Device managed by a [`Runtime`] (e.g., a specific CPU core or TPU chip). Devices are lightweight handles that
/// can be cloned freely and compared for identity.
pub trait RuntimeDevice: Clone + Debug + Display + PartialEq + Send + Sync {
    /// ID of this device, unique among the devices of the owning [`Runtime`].
    fn id(&self) -> DeviceId;

    /// Index of the process that this device belongs to (i.e., is _addressable_ from).
    fn process_index(&self) -> ProcessIndex;

    /// Returns `true` if this device is _addressable_ by the owning [`Runtime`] (i.e., if the runtime can issue
    /// commands to it). Non-addressable devices are only visible for topology purposes.
    fn is_addressable(&self) -> bool;
}

/// Array of data that lives on a [`RuntimeDevice`]. Buffers are immutable once they are ready. Transfers and executions
/// may produce buffers whose contents are still being computed, and so callers must use [`RuntimeBuffer::ready`] when
/// they need to wait for the data to be available.
pub trait RuntimeBuffer: Debug + Send + Sync {
    /// Type of the [`RuntimeDevice`]s that buffers of this type live on.
    type Device: RuntimeDevice;

    /// [`RuntimeDevice`] on which this buffer is placed.
    fn device(&self) -> Self::Device;

    /// [`Shape`] of this buffer as it is stored on its device.
    fn on_device_shape(&self) -> Result<Shape, Error>;

    /// Blocks until the contents of this buffer are ready, returning any error that occurred while producing them.
    fn ready(&self) -> Result<(), Error>;

    /// Copies the contents of this buffer into a new host-resident [`Literal`], blocking until the copy completes.
    fn to_literal(&self) -> Result<Literal, Error>;
}

/// Compiled program that has been loaded by a [`Runtime`] and is ready to be executed.
pub trait RuntimeExecutable: Send + Sync {
    /// Type of the [`RuntimeDevice`]s that this executable runs on.
    type Device: RuntimeDevice;

    /// Type of the [`RuntimeBuffer`]s that this executable consumes and produces.
    type Buffer: RuntimeBuffer<Device = Self::Device>;

    /// Returns a string that identifies this executable.
    fn name(&self) -> Cow<'_, str>;

    /// [`ProgramShape`] of the compiled entry computation, as recovered from the compiled program.
    fn program_shape(&self) -> Result<ProgramShape, Error>;

    /// [`CompilationOptions`] that were used to compile this executable.
    fn compilation_options(&self) -> Result<CompilationOptions, Error>;

    /// _Addressable_ [`RuntimeDevice`]s that this executable runs on when launched on all of its devices,
    /// in the order expected by [`RuntimeExecutable::execute`].
    fn addressable_devices(&self) -> Result<Vec<Self::Device>, Error>;

    /// Executes this executable on all of its [`RuntimeExecutable::addressable_devices`]. `arguments` must contain
    /// one argument list per device, in device order, and the result contains one output list per device in the
    /// same order.
    fn execute(
        &self,
        arguments: &[Vec<&Self::Buffer>],
        options: &ExecutionOptions,
    ) -> Result<Vec<Vec<Self::Buffer>>, Error>;

    /// Executes this executable on a single _addressable_ `device`, which must be one of the devices that this
    /// executable was compiled for. The callers are responsible for launching executions on all other participating
    /// devices when the program contains collectives.
    fn execute_sharded(
        &self,
        arguments: &[&Self::Buffer],
        device: &Self::Device,
        options: &ExecutionOptions,
    ) -> Result<Vec<Self::Buffer>, Error>;
}

/// Connection to an accelerator platform. Runtimes hold the topology of the system (the list of [`RuntimeDevice`]s),
/// move data between host memory and device memory, and compile [`Program`]s into [`RuntimeExecutable`]s.
///
/// Native PJRT plugins implement this trait through a foreign-function boundary. The
/// [`HostRuntime`](crate::HostRuntime) implements it in-process.
pub trait Runtime: Send + Sync {
    /// Type of the [`RuntimeDevice`]s managed by this runtime.
    type Device: RuntimeDevice;

    /// Type of the [`RuntimeBuffer`]s managed by this runtime.
    type Buffer: RuntimeBuffer<Device = Self::Device>;

    /// Type of the [`RuntimeExecutable`]s produced by this runtime.
    type Executable: RuntimeExecutable<Device = Self::Device, Buffer = Self::Buffer>;

    /// Name of the platform that this runtime is connected to (e.g., `"cpu"` or `"tpu"`).
    fn platform_name(&self) -> Cow<'_, str>;

    /// Index of the process that this runtime is running in.
    fn process_index(&self) -> ProcessIndex;

    /// All [`RuntimeDevice`]s that are visible to this runtime, including both _addressable_ and
    /// _non-addressable_ devices.
    fn devices(&self) -> Result<Vec<Self::Device>, Error>;

    /// All [`RuntimeDevice`]s that are _addressable_ from this runtime. Note that all visible devices are
    /// addressable in a single-process environment.
    fn addressable_devices(&self) -> Result<Vec<Self::Device>, Error>;

    /// Number of devices visible to this runtime, including non-addressable ones.
    fn device_count(&self) -> Result<usize, Error> {
        Ok(self.devices()?.len())
    }

    /// Number of devices that are addressable from this runtime.
    fn addressable_device_count(&self) -> Result<usize, Error> {
        Ok(self.addressable_devices()?.len())
    }

    /// Copies the provided host [`Literal`] into a new buffer on `device`. The returned buffer may not be ready yet;
    /// use [`RuntimeBuffer::ready`] to wait for the transfer to complete.
    fn buffer_from_host_literal(&self, literal: &Literal, device: &Self::Device) -> Result<Self::Buffer, Error>;

    /// Compiles the provided [`Program`] using the provided [`CompilationOptions`].
    fn compile(&self, program: &Program, options: &CompilationOptions) -> Result<Self::Executable, Error>;
}

/// Loader that initializes a [`Runtime`] for a [`DeviceType`]. This is how a client picks which accelerator family
/// to connect to at startup.
pub trait RuntimeLoader {
    /// Type of the [`Runtime`]s that this loader produces.
    type Runtime: Runtime;

    /// Initializes a [`Runtime`] for the provided [`DeviceType`], returning [`Error::Unimplemented`]
    /// if this loader does not support it.
    fn load(&self, device_type: DeviceType) -> Result<Self::Runtime, Error>;
}

impl<R: Runtime> Runtime for Arc<R> {
    type Device = R::Device;
    type Buffer = R::Buffer;
    type Executable = R::Executable;

    fn platform_name(&self) -> Cow<'_, str> {
        self.as_ref().platform_name()
    }

    fn process_index(&self) -> ProcessIndex {
        self.as_ref().process_index()
    }

    fn devices(&self) -> Result<Vec<Self::Device>, Error> {
        self.as_ref().devices()
    }

    fn addressable_devices(&self) -> Result<Vec<Self::Device>, Error> {
        self.as_ref().addressable_devices()
    }

    fn device_count(&self) -> Result<usize, Error> {
        self.as_ref().device_count()
    }

    fn addressable_device_count(&self) -> Result<usize, Error> {
        self.as_ref().addressable_device_count()
    }

    fn buffer_from_host_literal(&self, literal: &Literal, device: &Self::Device) -> Result<Self::Buffer, Error> {
        self.as_ref().buffer_from_host_literal(literal, device)
    }

    fn compile(&self, program: &Program, options: &CompilationOptions) -> Result<Self::Executable, Error> {
        self.as_ref().compile(program, options)
    }
}
