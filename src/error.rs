use std::time::Duration;

use thiserror::Error;

/// Failures opening or reading the capture device. Fatal to session start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureDeviceError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("no camera found: {0}")]
    NotFound(String),

    #[error("camera busy: {0}")]
    Busy(String),

    #[error("camera frame unreadable: {0}")]
    Unreadable(String),
}

impl CaptureDeviceError {
    /// Message narrated to the user when a session cannot start.
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureDeviceError::PermissionDenied(_) => {
                "Permissão de câmera negada. Permita o acesso à câmera e tente novamente."
            }
            CaptureDeviceError::NotFound(_) => {
                "Nenhuma câmera encontrada. Verifique se há uma câmera conectada."
            }
            CaptureDeviceError::Busy(_) => {
                "Câmera em uso. Feche outros programas e tente novamente."
            }
            CaptureDeviceError::Unreadable(_) => "Erro ao acessar câmera. Verifique as permissões.",
        }
    }
}

/// Per-tick failures talking to the description service. Never fatal.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("analysis timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("service returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("response could not be decoded: {0}")]
    Decode(String),
}

/// The service answered, but without anything the extractor can read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed description: {0}")]
pub struct MalformedDescription(pub String);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    CaptureDevice(#[from] CaptureDeviceError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Malformed(#[from] MalformedDescription),

    #[error("search query must not be empty")]
    InvalidQuery,

    #[error("speech error: {0}")]
    Speech(String),

    #[error("tone error: {0}")]
    Tone(String),
}
