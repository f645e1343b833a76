pub mod audio;
pub mod devices;
pub mod live;
pub mod scheduler;
pub mod vision;

use thiserror::Error;

use devices::{select_device, CaptureDevice, DeviceError, DeviceInfo};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A detection pipeline that publishes into shared state while running.
pub trait Pipeline {
    fn start(&mut self);
    /// Return the pipeline's field group to idle.
    fn stop(&mut self);
}

/// At most one open stream on a capture device.
///
/// Starting again closes the current stream before the new one is opened.
/// Failures are kept as a user-facing status message and leave the session
/// idle; nothing is retried.
pub struct Session<D: CaptureDevice> {
    device: D,
    kind: &'static str,
    active: Option<(String, D::Handle)>,
    error: Option<DeviceError>,
}

impl<D: CaptureDevice> Session<D> {
    /// `kind` names the hardware in messages, e.g. "microphone".
    pub fn new(device: D, kind: &'static str) -> Self {
        Self {
            device,
            kind,
            active: None,
            error: None,
        }
    }

    pub fn devices(&mut self) -> Result<Vec<DeviceInfo>> {
        self.device.list_devices().map_err(|e| self.fail(e))
    }

    /// Open `preferred` if it is still available, else the first device.
    /// Returns the id actually opened.
    pub fn start(&mut self, preferred: Option<&str>) -> Result<String> {
        self.stop();
        self.error = None;

        let devices = self.devices()?;
        let Some(id) = select_device(&devices, preferred) else {
            return Err(self.fail(DeviceError::NoDevices(self.kind)));
        };

        match self.device.open(&id) {
            Ok(handle) => {
                log::info!("Opened {} {}", self.kind, id);
                self.active = Some((id.clone(), handle));
                Ok(id)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Release the open stream, if any.
    pub fn stop(&mut self) {
        if let Some((id, handle)) = self.active.take() {
            self.device.close(handle);
            log::info!("Closed {} {}", self.kind, id);
        }
    }

    fn fail(&mut self, error: DeviceError) -> PipelineError {
        log::warn!("{} error: {}", self.kind, error);
        self.stop();
        self.error = Some(error.clone());
        PipelineError::Device(error)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn handle_mut(&mut self) -> Option<&mut D::Handle> {
        self.active.as_mut().map(|(_, handle)| handle)
    }

    /// Description of the last failure, for display.
    pub fn status_message(&self) -> Option<String> {
        let kind = self.kind;
        self.error.as_ref().map(|e| match e {
            DeviceError::PermissionDenied(_) => format!(
                "{} permission denied. Please allow access in your system settings.",
                capitalize(kind)
            ),
            DeviceError::NoDevices(_) => {
                format!("No {} devices found. Please connect a {}.", kind, kind)
            }
            other => format!("Failed to access {}: {}", kind, other),
        })
    }
}

impl<D: CaptureDevice> Drop for Session<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records opens/closes; ids starting with "locked" refuse to open.
    #[derive(Clone, Default)]
    struct FakeDevice {
        devices: Vec<DeviceInfo>,
        open: Rc<RefCell<Vec<String>>>,
    }

    impl CaptureDevice for FakeDevice {
        type Handle = String;

        fn list_devices(&self) -> std::result::Result<Vec<DeviceInfo>, DeviceError> {
            Ok(self.devices.clone())
        }

        fn open(&mut self, device_id: &str) -> std::result::Result<String, DeviceError> {
            if device_id.starts_with("locked") {
                return Err(DeviceError::PermissionDenied(device_id.to_string()));
            }
            self.open.borrow_mut().push(device_id.to_string());
            Ok(device_id.to_string())
        }

        fn close(&mut self, handle: String) {
            self.open.borrow_mut().retain(|id| *id != handle);
        }
    }

    fn fake(ids: &[&str]) -> FakeDevice {
        FakeDevice {
            devices: ids.iter().map(|id| DeviceInfo::new(*id, *id)).collect(),
            open: Rc::default(),
        }
    }

    #[test]
    fn test_start_opens_preferred() {
        let dev = fake(&["a", "b"]);
        let open = dev.open.clone();
        let mut session = Session::new(dev, "microphone");
        assert_eq!(session.start(Some("b")).unwrap(), "b");
        assert_eq!(session.device_id(), Some("b"));
        assert_eq!(*open.borrow(), vec!["b".to_string()]);
    }

    #[test]
    fn test_restart_closes_previous_stream() {
        let dev = fake(&["a", "b"]);
        let open = dev.open.clone();
        let mut session = Session::new(dev, "microphone");
        session.start(Some("a")).unwrap();
        session.start(Some("b")).unwrap();
        assert_eq!(*open.borrow(), vec!["b".to_string()]);

        session.stop();
        assert!(!session.is_running());
        assert!(open.borrow().is_empty());
    }

    #[test]
    fn test_open_failure_leaves_session_idle() {
        let dev = fake(&["a", "locked-cam"]);
        let open = dev.open.clone();
        let mut session = Session::new(dev, "camera");
        session.start(Some("a")).unwrap();

        let err = session.start(Some("locked-cam")).unwrap_err();
        assert!(matches!(err, PipelineError::Device(DeviceError::PermissionDenied(_))));
        assert!(!session.is_running());
        assert!(open.borrow().is_empty());
        assert_eq!(
            session.status_message().as_deref(),
            Some("Camera permission denied. Please allow access in your system settings.")
        );

        // A successful start clears the message
        session.start(Some("a")).unwrap();
        assert!(session.status_message().is_none());
    }

    #[test]
    fn test_no_devices() {
        let mut session = Session::new(fake(&[]), "microphone");
        assert!(session.start(None).is_err());
        assert_eq!(
            session.status_message().as_deref(),
            Some("No microphone devices found. Please connect a microphone.")
        );
    }

    #[test]
    fn test_drop_releases_handle() {
        let dev = fake(&["a"]);
        let open = dev.open.clone();
        {
            let mut session = Session::new(dev, "camera");
            session.start(None).unwrap();
            assert_eq!(open.borrow().len(), 1);
        }
        assert!(open.borrow().is_empty());
    }
}
