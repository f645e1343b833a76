//! Capture-device capability: microphones and cameras are reached only
//! through this trait, never directly.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("No {0} devices found")]
    NoDevices(&'static str),
    #[error("Device not found: {0}")]
    NotFound(String),
    #[error("Permission denied for {0}")]
    PermissionDenied(String),
    #[error("Device disconnected: {0}")]
    Disconnected(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

pub trait CaptureDevice {
    /// Live stream handle. Holding one keeps the hardware busy.
    type Handle;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;
    fn open(&mut self, device_id: &str) -> Result<Self::Handle, DeviceError>;
    fn close(&mut self, handle: Self::Handle);
}

/// Keep the preferred device while it is still plugged in, otherwise fall
/// back to the first one listed.
pub fn select_device(devices: &[DeviceInfo], preferred: Option<&str>) -> Option<String> {
    preferred
        .and_then(|id| devices.iter().find(|d| d.id == id))
        .or_else(|| devices.first())
        .map(|d| d.id.clone())
}
