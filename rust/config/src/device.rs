//! Device names and the checkpoint device remapping table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of CUDA devices covered by the remapping table.
pub const MAX_CUDA_DEVICES: u32 = 8;

/// A compute device, written as `cpu` or `cuda:<index>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl Device {
    /// Device selected by a GPU id, where a negative id means "no GPU".
    pub fn from_gpu_id(gpu_id: i32) -> Self {
        u32::try_from(gpu_id).map_or(Self::Cpu, Self::Cuda)
    }

    /// All devices a saved checkpoint may reference.
    pub fn origins() -> impl Iterator<Item = Self> {
        std::iter::once(Self::Cpu).chain((0..MAX_CUDA_DEVICES).map(Self::Cuda))
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            other => other
                .strip_prefix("cuda:")
                .filter(|i| !i.is_empty() && i.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|i| i.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| format!("unknown device '{s}'. Use: cpu, cuda:<index>")),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Maps every origin device to a single target, for reloading checkpoints
/// saved on another machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceMapping(BTreeMap<Device, Device>);

impl DeviceMapping {
    /// Map all origins onto `target`.
    pub fn to_target(target: Device) -> Self {
        Self(Device::origins().map(|origin| (origin, target)).collect())
    }

    pub fn get(&self, origin: &Device) -> Option<Device> {
        self.0.get(origin).copied()
    }

    /// The device everything is remapped to.
    pub fn target(&self) -> Device {
        self.0.get(&Device::Cpu).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Device, Device)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Build the remapping table for `gpu_id` (negative means CPU).
pub fn get_device_mapping(gpu_id: i32) -> DeviceMapping {
    DeviceMapping::to_target(Device::from_gpu_id(gpu_id))
}
