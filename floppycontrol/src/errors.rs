use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControlError>;

/// Failures reported by a playback backend (cloud API or renderer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Device {0} not found")]
    DeviceNotFound(String),
    /// Timeouts, refused connections and 5xx answers; worth one retry
    #[error("Network error: {0}")]
    Network(String),
    /// The backend understood the request and refused it
    #[error("Request rejected: {0}")]
    Rejected(String),
    /// The access token was refused; only a new authorization helps
    #[error("Access token refused: {0}")]
    Unauthorized(String),
}

impl BackendError {
    pub fn device_not_found(device_id: &str) -> Self {
        BackendError::DeviceNotFound(device_id.to_string())
    }

    pub fn network(message: impl Into<String>) -> Self {
        BackendError::Network(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        BackendError::Rejected(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BackendError::Unauthorized(message.into())
    }

    pub fn is_device_not_found(&self) -> bool {
        matches!(self, BackendError::DeviceNotFound(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}

/// Outcome of a scan that did not end with sounding audio.
///
/// Every variant is scoped to the scan that raised it.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Tag {0} is not registered")]
    TagNotRegistered(String),
    #[error("Authorization required: {0}")]
    AuthRequired(String),
    #[error("Device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("Several active devices are named {device}: {ids:?}")]
    AmbiguousDevice { device: String, ids: Vec<String> },
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Settings storage error: {0}")]
    Storage(String),
}

impl ControlError {
    pub fn auth_required(reason: impl Into<String>) -> Self {
        ControlError::AuthRequired(reason.into())
    }

    pub fn device_unavailable(device: &str, reason: impl Into<String>) -> Self {
        ControlError::DeviceUnavailable {
            device: device.to_string(),
            reason: reason.into(),
        }
    }

    pub fn playback_failed(reason: impl Into<String>) -> Self {
        ControlError::PlaybackFailed(reason.into())
    }

    /// Configuration mistakes the operator has to fix by hand.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ControlError::AmbiguousDevice { .. })
    }
}

impl From<anyhow::Error> for ControlError {
    fn from(err: anyhow::Error) -> Self {
        ControlError::Storage(format!("{:#}", err))
    }
}
