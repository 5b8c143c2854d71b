pub mod camera;
pub mod frame;

pub use camera::{CameraDevice, DeviceLease, FrameGrabber, LeaseGuard, StillImageCamera};
pub use frame::{
    capture, compute_quality, encode, enhance_contrast, preprocess, EncodedFrame, Frame,
    PreprocessProfile, QualityLabel, QualityReading,
};
