//! Computation client that adapts an accelerator-agnostic [`ComputationClient`] interface to a PJRT-style
//! [`Runtime`](ryft_runtime::Runtime).
//!
//! The [`PjRtComputationClient`] keeps a [`DeviceDirectory`] that maps device names like `"TPU:0"` to runtime
//! devices, moves [`TensorSource`]s to devices and [`Data`] back to the host, and compiles and executes
//! [`Computation`]s using either SPMD partitioning or replication, depending on its [`ExecutionMode`].
//!
//! ```ignore
//! let loader = HostRuntimeLoader::new(HostRuntimeOptions { device_count: 4, ..Default::default() });
//! let client = PjRtComputationClient::from_env(&loader)?;
//! let data = client.transfer_to_server(&[TensorSource::from_bytes(shape, client.default_device()?, bytes)])?;
//! ```

pub mod clients;
pub mod computations;
pub mod config;
pub mod data;
pub mod devices;
pub mod errors;

pub use clients::*;
pub use computations::*;
pub use config::*;
pub use data::*;
pub use devices::*;
pub use errors::*;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ryft_runtime::{BufferType, DeviceType, HostRuntime, HostRuntimeOptions, Literal, ProgramShape, Shape};

    use crate::{ClientConfig, ExecutionMode, PjRtComputationClient, TensorSource};

    /// Returns a [`TensorSource`] for a one-dimensional `f32` tensor on `device` that contains `values`.
    pub(crate) fn f32_source(device: &str, values: &[f32]) -> TensorSource {
        let shape = Shape::new(BufferType::F32, [values.len() as u64]);
        TensorSource::from_bytes(shape, device, values.iter().flat_map(|value| value.to_ne_bytes()).collect())
    }

    /// Returns a [`PjRtComputationClient`] backed by a CPU [`HostRuntime`] with `device_count` devices, out of which
    /// `addressable_device_count` are addressable (all of them if [`None`]). The runtime has a registered `add_one`
    /// program that maps an `f32[3]` to an `f32[3]` by adding `1` to each element.
    pub(crate) fn add_one_client(
        device_count: usize,
        addressable_device_count: Option<usize>,
        execution_mode: ExecutionMode,
    ) -> PjRtComputationClient<Arc<HostRuntime>> {
        let runtime = HostRuntime::new(HostRuntimeOptions {
            device_type: DeviceType::CPU,
            device_count,
            addressable_device_count,
        })
        .unwrap();
        let shape = Shape::new(BufferType::F32, [3]);
        runtime
            .register_program("add_one", ProgramShape::new(vec![shape.clone()], vec![shape]), |inputs| {
                let values = inputs[0].to_vec::<f32>()?.into_iter().map(|value| value + 1.0).collect::<Vec<_>>();
                Ok(vec![Literal::from_values([3], &values)?])
            })
            .unwrap();
        let config = ClientConfig::new(DeviceType::CPU).with_execution_mode(execution_mode);
        PjRtComputationClient::new(Arc::new(runtime), config).unwrap()
    }
}
