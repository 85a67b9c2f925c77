use std::fmt::Debug;
use std::sync::Arc;

use ryft_runtime::{RuntimeBuffer, Shape};

use crate::Error;

/// Callback that writes the contents of a [`TensorSource`] into a zero-initialized host buffer. The buffer is exactly
/// as long as the number of bytes required by the [`Shape`] of the tensor source.
pub type PopulateFn = dyn Fn(&TensorSource, &mut [u8]) -> Result<(), Error> + Send + Sync;

/// Host tensor that is to be transferred to a device using
/// [`ComputationClient::transfer_to_server`](crate::ComputationClient::transfer_to_server). Rather than holding the
/// tensor contents directly, tensor sources hold a callback that populates the staging buffer used for the transfer,
/// which avoids an extra copy when the contents are produced on demand.
#[derive(Clone)]
pub struct TensorSource {
    shape: Shape,
    device: String,
    populate_fn: Arc<PopulateFn>,
}

impl TensorSource {
    /// Creates a new [`TensorSource`] with the provided [`Shape`], which is to be placed on the device with the
    /// provided name, and whose contents are produced by `populate_fn`.
    pub fn new<D, F>(shape: Shape, device: D, populate_fn: F) -> Self
    where
        D: Into<String>,
        F: Fn(&TensorSource, &mut [u8]) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self { shape, device: device.into(), populate_fn: Arc::new(populate_fn) }
    }

    /// Creates a new [`TensorSource`] whose contents are a copy of `bytes`. The number of bytes must match the size of
    /// the provided [`Shape`] or else the transfer will fail.
    pub fn from_bytes<D: Into<String>>(shape: Shape, device: D, bytes: Vec<u8>) -> Self {
        Self::new(shape, device, move |_, buffer| {
            if buffer.len() != bytes.len() {
                return Err(ryft_runtime::Error::invalid_argument(format!(
                    "expected {} byte(s) of tensor data but got {}",
                    buffer.len(),
                    bytes.len(),
                ))
                .into());
            }
            buffer.copy_from_slice(&bytes);
            Ok(())
        })
    }

    /// [`Shape`] of this [`TensorSource`].
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Name of the device that this [`TensorSource`] is to be placed on.
    pub fn device(&self) -> &str {
        self.device.as_str()
    }

    /// Writes the contents of this [`TensorSource`] into `buffer`.
    pub fn populate(&self, buffer: &mut [u8]) -> Result<(), Error> {
        (self.populate_fn)(self, buffer)
    }
}

impl Debug for TensorSource {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "TensorSource[{}; {}]", self.shape, self.device)
    }
}

/// Handle to device-resident data that is managed by a [`ComputationClient`](crate::ComputationClient). A handle
/// records the name of the device that the data lives on and its [`Shape`], and it may be a _placeholder_ that does
/// not yet hold a buffer (see
/// [`ComputationClient::create_data_placeholder`](crate::ComputationClient::create_data_placeholder)). Buffers are
/// shared between clones of a handle and between handles that were [`Data::assign`]ed from one another.
pub struct Data<B: RuntimeBuffer> {
    device: String,
    shape: Shape,
    buffer: Option<Arc<B>>,
}

impl<B: RuntimeBuffer> Data<B> {
    /// Creates a new [`Data`] handle that holds the provided buffer.
    pub fn new<D: Into<String>>(device: D, shape: Shape, buffer: B) -> Self {
        Self { device: device.into(), shape, buffer: Some(Arc::new(buffer)) }
    }

    /// Creates a new placeholder [`Data`] handle that does not hold a buffer.
    pub fn placeholder<D: Into<String>>(device: D, shape: Shape) -> Self {
        Self { device: device.into(), shape, buffer: None }
    }

    /// Name of the device that this [`Data`] lives on.
    pub fn device(&self) -> &str {
        self.device.as_str()
    }

    /// [`Shape`] of this [`Data`].
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns `true` if this [`Data`] holds a buffer (i.e., if it is not a placeholder).
    pub fn has_value(&self) -> bool {
        self.buffer.is_some()
    }

    /// Buffer held by this [`Data`], if any.
    pub fn buffer(&self) -> Option<&Arc<B>> {
        self.buffer.as_ref()
    }

    /// Returns the buffer held by this [`Data`], or an [`Error::MissingBuffer`] if this is a placeholder.
    pub fn require_buffer(&self) -> Result<&B, Error> {
        self.buffer.as_deref().ok_or_else(|| Error::missing_buffer(self.device.as_str()))
    }

    /// Makes this [`Data`] share the buffer of `other`, along with the name of the device that the buffer lives on.
    /// Assigning a handle's own buffer to itself is a no-op.
    pub fn assign(&mut self, other: &Data<B>) {
        let same_buffer = match (&self.buffer, &other.buffer) {
            (Some(buffer), Some(other)) => Arc::ptr_eq(buffer, other),
            _ => false,
        };
        if !same_buffer {
            self.device.clone_from(&other.device);
            self.buffer = other.buffer.clone();
        }
    }
}

impl<B: RuntimeBuffer> Clone for Data<B> {
    fn clone(&self) -> Self {
        Self { device: self.device.clone(), shape: self.shape.clone(), buffer: self.buffer.clone() }
    }
}

impl<B: RuntimeBuffer> Debug for Data<B> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.buffer {
            Some(_) => write!(formatter, "Data[{}; {}]", self.shape, self.device),
            None => write!(formatter, "Data[{}; {}; placeholder]", self.shape, self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ryft_runtime::{BufferType, HostRuntime, HostRuntimeOptions, Literal, Runtime, Shape};

    use crate::{Data, Error, TensorSource};

    #[test]
    fn test_tensor_source() {
        let shape = Shape::new(BufferType::U8, [4]);
        let source = TensorSource::new(shape.clone(), "CPU:0", |source, buffer| {
            buffer.iter_mut().enumerate().for_each(|(index, byte)| *byte = index as u8 * 2);
            assert_eq!(source.device(), "CPU:0");
            Ok(())
        });
        assert_eq!(source.shape(), &shape);
        assert_eq!(format!("{source:?}"), "TensorSource[u8[4]; CPU:0]");
        let mut buffer = vec![0; 4];
        assert_eq!(source.populate(&mut buffer), Ok(()));
        assert_eq!(buffer, vec![0, 2, 4, 6]);

        let source = TensorSource::from_bytes(shape, "CPU:0", vec![1, 2, 3]);
        assert!(matches!(source.populate(&mut buffer), Err(Error::Runtime(_))));
    }

    #[test]
    fn test_data() {
        let runtime = HostRuntime::new(HostRuntimeOptions::default()).unwrap();
        let device = runtime.devices().unwrap().remove(0);
        let literal = Literal::from_values([2], &[3i64, 4]).unwrap();
        let buffer = runtime.buffer_from_host_literal(&literal, &device).unwrap();

        let data = Data::new("CPU:0", literal.shape().clone(), buffer);
        assert!(data.has_value());
        assert!(data.require_buffer().is_ok());
        assert_eq!(format!("{data:?}"), "Data[i64[2]; CPU:0]");

        let mut placeholder = Data::placeholder("CPU:0", literal.shape().clone());
        assert!(!placeholder.has_value());
        assert_eq!(format!("{placeholder:?}"), "Data[i64[2]; CPU:0; placeholder]");
        assert!(matches!(placeholder.require_buffer(), Err(Error::MissingBuffer { device, .. }) if device == "CPU:0"));

        placeholder.assign(&data);
        assert!(placeholder.has_value());
        assert!(Arc::ptr_eq(placeholder.buffer().unwrap(), data.buffer().unwrap()));

        let clone = placeholder.clone();
        placeholder.assign(&clone);
        assert!(Arc::ptr_eq(placeholder.buffer().unwrap(), data.buffer().unwrap()));
        assert_eq!(Arc::strong_count(data.buffer().unwrap()), 3);

        let mut other = Data::placeholder("CPU:1", literal.shape().clone());
        other.assign(&data);
        assert_eq!(other.device(), "CPU:0");
        assert_eq!(format!("{other:?}"), "Data[i64[2]; CPU:0]");
    }
}
