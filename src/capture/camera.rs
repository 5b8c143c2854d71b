use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use image::RgbImage;

use crate::error::CaptureDeviceError;

/// Live access to an opened camera. Dropping the grabber releases the device.
pub trait FrameGrabber: Send {
    /// Synchronously grab whatever frame the device is showing right now.
    fn grab(&mut self) -> Result<RgbImage, CaptureDeviceError>;
}

pub trait CameraDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameGrabber>, CaptureDeviceError>;

    fn name(&self) -> &str;
}

/// Exclusive ownership flag for a physical device.
#[derive(Clone, Default)]
pub struct DeviceLease {
    held: Arc<AtomicBool>,
}

impl DeviceLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, device: &str) -> Result<LeaseGuard, CaptureDeviceError> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureDeviceError::Busy(format!(
                "{device} is held by another session"
            )));
        }
        Ok(LeaseGuard {
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

pub struct LeaseGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Camera backed by still images on disk, cycled in order on every grab.
pub struct StillImageCamera {
    frames: Vec<PathBuf>,
    lease: DeviceLease,
}

impl StillImageCamera {
    pub fn new(frames: Vec<PathBuf>) -> Self {
        Self {
            frames,
            lease: DeviceLease::new(),
        }
    }

    pub fn lease(&self) -> &DeviceLease {
        &self.lease
    }
}

impl CameraDevice for StillImageCamera {
    fn open(&self) -> Result<Box<dyn FrameGrabber>, CaptureDeviceError> {
        if self.frames.is_empty() {
            return Err(CaptureDeviceError::NotFound("no image files configured".into()));
        }

        for path in &self.frames {
            if let Err(err) = std::fs::metadata(path) {
                return Err(match err.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        CaptureDeviceError::PermissionDenied(path.display().to_string())
                    }
                    _ => CaptureDeviceError::NotFound(path.display().to_string()),
                });
            }
        }

        let guard = self.lease.acquire(self.name())?;
        Ok(Box::new(StillImageGrabber {
            frames: self.frames.clone(),
            next: 0,
            _guard: guard,
        }))
    }

    fn name(&self) -> &str {
        "still-image camera"
    }
}

struct StillImageGrabber {
    frames: Vec<PathBuf>,
    next: usize,
    _guard: LeaseGuard,
}

impl FrameGrabber for StillImageGrabber {
    fn grab(&mut self) -> Result<RgbImage, CaptureDeviceError> {
        let path = &self.frames[self.next % self.frames.len()];
        self.next = self.next.wrapping_add(1);

        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|err| CaptureDeviceError::Unreadable(format!("{}: {err}", path.display())))
    }
}
