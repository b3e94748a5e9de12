//! Error taxonomy for the capture pipeline

/// Errors that can occur while configuring, running, or finalising a capture session.
///
/// Variants are compared by kind (see [`CaptureError::eq`]); the attached
/// message is informational only and is not considered when two errors are
/// compared for equality.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    /// The caller lacks permission to use the requested capture source.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A requested capture device or source is not available.
    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    /// The supplied `CaptureConfiguration` failed validation.
    #[error("invalid configuration: {0}")]
    ConfigurationFailed(String),

    /// A requested state transition is not valid from the current state.
    #[error("invalid state transition: {0}")]
    InvalidState(String),

    /// Writing to the WAV output failed.
    #[error("storage error: {0}")]
    StorageError(String),

    /// PCM encoding (resampling, mixing, or int16 conversion) failed.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// Encryption or decryption of an audio chunk failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// An operation did not complete within its allotted time.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Catch-all for conditions that don't fit another variant.
    #[error("unknown capture error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// A short, stable identifier for the error's variant, independent of its message.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "permission_denied",
            CaptureError::DeviceNotAvailable(_) => "device_not_available",
            CaptureError::ConfigurationFailed(_) => "configuration_failed",
            CaptureError::InvalidState(_) => "invalid_state",
            CaptureError::StorageError(_) => "storage_error",
            CaptureError::EncodingFailed(_) => "encoding_failed",
            CaptureError::EncryptionFailed(_) => "encryption_failed",
            CaptureError::Timeout(_) => "timeout",
            CaptureError::Unknown(_) => "unknown",
        }
    }
}

impl PartialEq for CaptureError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::StorageError(err.to_string())
    }
}
