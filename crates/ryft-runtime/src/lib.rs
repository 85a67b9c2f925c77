//! Interface to PJRT-style accelerator runtimes.
//!
//! A [`Runtime`] enumerates [`RuntimeDevice`]s, copies host [`Literal`]s into device-resident [`RuntimeBuffer`]s, and
//! compiles [`Program`]s into [`RuntimeExecutable`]s using [`CompilationOptions`]. Native PJRT plugins implement these
//! traits through a foreign-function boundary. This crate also provides the [`HostRuntime`], an in-process runtime
//! that keeps buffers in host memory and runs registered host functions in place of compiled programs.

pub mod errors;
pub mod host;
pub mod literals;
pub mod programs;
pub mod protos;
pub mod runtime;
pub mod types;

pub use errors::*;
pub use host::*;
pub use literals::*;
pub use programs::*;
pub use protos::*;
pub use runtime::*;
pub use types::*;
