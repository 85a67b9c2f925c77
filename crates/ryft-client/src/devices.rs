use std::collections::HashMap;
use std::fmt::Display;

use ryft_runtime::{DeviceId, RuntimeDevice};

use crate::Error;

/// Name of a device as seen by users of a [`ComputationClient`](crate::ComputationClient). Device names have the form
/// `<PLATFORM>:<index>`, where `<PLATFORM>` is the uppercase platform name of the runtime and `<index>` is the
/// runtime's ID for the device (e.g., `"TPU:0"` or `"CPU:3"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceName {
    platform: String,
    index: DeviceId,
}

impl DeviceName {
    /// Creates a new [`DeviceName`] for the device with the provided ID on the provided platform. The platform name
    /// is converted to uppercase.
    pub fn new<P: AsRef<str>>(platform: P, index: DeviceId) -> Self {
        Self { platform: platform.as_ref().to_uppercase(), index }
    }

    /// Parses a [`DeviceName`] from a string of the form `<PLATFORM>:<index>`. The platform must be non-empty and
    /// uppercase, and the index must be a non-negative integer.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(value: S) -> Result<Self, Error> {
        let value = value.as_ref();
        let (platform, index) = value.split_once(':').ok_or_else(|| Error::invalid_device_name(value))?;
        if platform.is_empty() || platform.chars().any(char::is_lowercase) {
            return Err(Error::invalid_device_name(value));
        }
        let index = index.parse::<DeviceId>().map_err(|_| Error::invalid_device_name(value))?;
        Ok(Self { platform: platform.to_string(), index })
    }

    /// Uppercase platform name of this [`DeviceName`] (e.g., `"TPU"`).
    pub fn platform(&self) -> &str {
        self.platform.as_str()
    }

    /// Device index of this [`DeviceName`].
    pub fn index(&self) -> DeviceId {
        self.index
    }
}

impl Display for DeviceName {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.platform, self.index)
    }
}

/// Mapping from device names to runtime devices. A directory is built once from the devices that a runtime exposes
/// and it is immutable afterwards. Every runtime device appears exactly once, in runtime order.
#[derive(Clone, Debug)]
pub struct DeviceDirectory<D: RuntimeDevice> {
    platform: String,
    names: Vec<String>,
    devices: HashMap<String, D>,
}

impl<D: RuntimeDevice> DeviceDirectory<D> {
    /// Creates a new [`DeviceDirectory`] for the provided devices of a runtime with the provided platform name.
    /// Returns an [`Error::DuplicateDevice`] if two devices map to the same name.
    pub fn new<P: AsRef<str>>(platform: P, devices: Vec<D>) -> Result<Self, Error> {
        let platform = platform.as_ref().to_uppercase();
        let mut names = Vec::with_capacity(devices.len());
        let mut directory = HashMap::with_capacity(devices.len());
        for device in devices {
            let name = DeviceName::new(&platform, device.id()).to_string();
            if directory.contains_key(&name) {
                return Err(Error::duplicate_device(name));
            }
            names.push(name.clone());
            directory.insert(name, device);
        }
        Ok(Self { platform, names, devices: directory })
    }

    /// Uppercase platform name used for the device names in this [`DeviceDirectory`].
    pub fn platform(&self) -> &str {
        self.platform.as_str()
    }

    /// Number of devices in this [`DeviceDirectory`].
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if this [`DeviceDirectory`] contains no devices.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names of all devices in this [`DeviceDirectory`], in runtime order.
    pub fn names(&self) -> &[String] {
        self.names.as_slice()
    }

    /// Looks up the device with the provided name, returning an [`Error::UnknownDevice`] if there is no such device.
    pub fn get(&self, name: &str) -> Result<&D, Error> {
        self.devices.get(name).ok_or_else(|| Error::unknown_device(name))
    }

    /// Looks up the device with the provided name and checks that it is _addressable_.
    pub fn get_addressable(&self, name: &str) -> Result<&D, Error> {
        let device = self.get(name)?;
        if device.is_addressable() { Ok(device) } else { Err(Error::non_addressable_device(name)) }
    }

    /// Returns the name of the provided device.
    pub fn name_of(&self, device: &D) -> String {
        DeviceName::new(&self.platform, device.id()).to_string()
    }

    /// Names of the provided devices, in the provided order.
    pub fn names_of(&self, devices: &[D]) -> Vec<String> {
        devices.iter().map(|device| self.name_of(device)).collect()
    }
}

#[cfg(test)]
mod tests {
    use ryft_runtime::{DeviceType, HostRuntime, HostRuntimeOptions, Runtime, RuntimeDevice};

    use crate::{DeviceDirectory, DeviceName, Error};

    #[test]
    fn test_device_name() {
        let name = DeviceName::new("tpu", 3);
        assert_eq!(name.platform(), "TPU");
        assert_eq!(name.index(), 3);
        assert_eq!(name.to_string(), "TPU:3");
        assert_eq!(DeviceName::from_str("TPU:3"), Ok(name));
        assert_eq!(DeviceName::from_str("CPU:12").map(|name| name.index()), Ok(12));
        assert!(matches!(DeviceName::from_str("CPU"), Err(Error::InvalidDeviceName { .. })));
        assert!(matches!(DeviceName::from_str(":0"), Err(Error::InvalidDeviceName { .. })));
        assert!(matches!(DeviceName::from_str("cpu:0"), Err(Error::InvalidDeviceName { .. })));
        assert!(matches!(DeviceName::from_str("CPU:-1"), Err(Error::InvalidDeviceName { .. })));
        assert!(matches!(DeviceName::from_str("CPU:x"), Err(Error::InvalidDeviceName { .. })));
        assert!(matches!(
            DeviceName::from_str("CPU:0:1"),
            Err(Error::InvalidDeviceName { name, .. }) if name == "CPU:0:1",
        ));
    }

    #[test]
    fn test_device_directory() {
        let runtime = HostRuntime::new(HostRuntimeOptions {
            device_type: DeviceType::TPU,
            device_count: 4,
            addressable_device_count: Some(2),
        })
        .unwrap();
        let devices = runtime.devices().unwrap();
        let directory = DeviceDirectory::new(runtime.platform_name(), devices.clone()).unwrap();
        assert_eq!(directory.platform(), "TPU");
        assert_eq!(directory.len(), 4);
        assert!(!directory.is_empty());
        assert_eq!(directory.names(), ["TPU:0", "TPU:1", "TPU:2", "TPU:3"]);
        for (name, device) in directory.names().iter().zip(&devices) {
            assert_eq!(directory.get(name), Ok(device));
            assert_eq!(&directory.name_of(device), name);
            assert_eq!(name, &format!("{}:{}", runtime.platform_name().to_uppercase(), device.id()));
        }
        assert_eq!(directory.names_of(&devices[1..3]), vec!["TPU:1", "TPU:2"]);
        assert_eq!(directory.get_addressable("TPU:1"), Ok(&devices[1]));
        assert!(matches!(
            directory.get_addressable("TPU:3"),
            Err(Error::NonAddressableDevice { name, .. }) if name == "TPU:3",
        ));
        assert!(matches!(directory.get("TPU:4"), Err(Error::UnknownDevice { name, .. }) if name == "TPU:4"));
        assert!(matches!(directory.get("CPU:0"), Err(Error::UnknownDevice { .. })));
    }

    #[test]
    fn test_device_directory_duplicate_devices() {
        let runtime = HostRuntime::new(HostRuntimeOptions { device_count: 2, ..Default::default() }).unwrap();
        let mut devices = runtime.devices().unwrap();
        devices.push(devices[0].clone());
        assert!(matches!(
            DeviceDirectory::new("cpu", devices),
            Err(Error::DuplicateDevice { name, .. }) if name == "CPU:0",
        ));
    }
}
