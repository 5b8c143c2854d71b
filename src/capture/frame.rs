use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use serde::Serialize;

use crate::error::CaptureDeviceError;

use super::camera::FrameGrabber;

const DARK_BELOW: f64 = 50.0;
const MEDIUM_BELOW: f64 = 100.0;
const GOOD_UP_TO: f64 = 180.0;
const BRIGHT_ABOVE: f64 = 220.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLabel {
    PoorDark,
    Medium,
    Good,
    PoorBright,
}

impl QualityLabel {
    pub fn from_score(score: f64) -> Self {
        if score < DARK_BELOW {
            QualityLabel::PoorDark
        } else if score < MEDIUM_BELOW {
            QualityLabel::Medium
        } else if score <= GOOD_UP_TO {
            QualityLabel::Good
        } else if score <= BRIGHT_ABOVE {
            QualityLabel::Medium
        } else {
            QualityLabel::PoorBright
        }
    }

    /// Spoken hint for poor captures, `None` when the frame is usable.
    pub fn warning(self) -> Option<&'static str> {
        match self {
            QualityLabel::PoorDark => Some("Imagem muito escura. Aumente a iluminação."),
            QualityLabel::PoorBright => {
                Some("Imagem muito clara. Reduza a luz ou afaste de reflexos.")
            }
            QualityLabel::Medium | QualityLabel::Good => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityReading {
    /// Mean of (R+G+B)/3 over all pixels, `0.0..=255.0`.
    pub score: f64,
    pub label: QualityLabel,
}

/// One snapshot of the camera. Never persisted.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: RgbImage,
    pub captured_at: DateTime<Utc>,
    pub quality: QualityReading,
    /// Set once contrast enhancement has run on these pixels.
    pub enhanced: bool,
}

impl Frame {
    pub fn new(pixels: RgbImage, captured_at: DateTime<Utc>) -> Self {
        let quality = compute_quality(&pixels);
        Self {
            pixels,
            captured_at,
            quality,
            enhanced: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl EncodedFrame {
    pub const MIME: &'static str = "image/jpeg";
}

/// How a frame is prepared before it leaves the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessProfile {
    pub enhance_contrast: bool,
    pub encode_quality: f32,
}

/// Snapshot the current frame at native resolution and score it.
pub fn capture(grabber: &mut dyn FrameGrabber) -> Result<Frame, CaptureDeviceError> {
    let pixels = grabber.grab()?;
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(CaptureDeviceError::Unreadable("camera returned an empty frame".into()));
    }
    Ok(Frame::new(pixels, Utc::now()))
}

pub fn compute_quality(pixels: &RgbImage) -> QualityReading {
    let pixel_count = u64::from(pixels.width()) * u64::from(pixels.height());
    let score = if pixel_count == 0 {
        0.0
    } else {
        let total: f64 = pixels
            .pixels()
            .map(|p| (f64::from(p[0]) + f64::from(p[1]) + f64::from(p[2])) / 3.0)
            .sum();
        total / pixel_count as f64
    };

    QualityReading {
        score,
        label: QualityLabel::from_score(score),
    }
}

fn contrast_factor(score: f64) -> f64 {
    let contrast = if score > GOOD_UP_TO { 2.0 } else { 1.5 };
    (259.0 * (contrast * 255.0 + 255.0)) / (255.0 * (259.0 - contrast * 255.0))
}

/// Adaptive contrast stretch around mid-grey. Not idempotent: callers apply it at most
/// once per captured frame (see [`preprocess`]).
pub fn enhance_contrast(frame: &Frame, score: f64) -> Frame {
    let factor = contrast_factor(score);
    let mut pixels = frame.pixels.clone();

    for pixel in pixels.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = factor * (f64::from(*channel) - 128.0) + 128.0;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame {
        pixels,
        captured_at: frame.captured_at,
        quality: frame.quality,
        enhanced: true,
    }
}

pub fn encode(frame: &Frame, quality: f32) -> Result<EncodedFrame, image::ImageError> {
    let jpeg_quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, jpeg_quality).write_image(
        frame.pixels.as_raw(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;

    Ok(EncodedFrame {
        bytes,
        width: frame.width(),
        height: frame.height(),
        captured_at: frame.captured_at,
    })
}

/// Mode-specific path from a raw capture to transmittable bytes. Quality is always read
/// from the raw capture, before any enhancement.
pub fn preprocess(
    frame: &Frame,
    profile: PreprocessProfile,
) -> Result<EncodedFrame, image::ImageError> {
    if profile.enhance_contrast && !frame.enhanced {
        let enhanced = enhance_contrast(frame, frame.quality.score);
        encode(&enhanced, profile.encode_quality)
    } else {
        encode(frame, profile.encode_quality)
    }
}
