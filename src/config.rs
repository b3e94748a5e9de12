//! Capture session configuration

use crate::crypto::Encryptor;
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration applied to a [`crate::CaptureSession`] via `configure()`.
///
/// `encryptor` is not `Serialize`/`Deserialize`: configurations that travel
/// across a process boundary (IPC, disk) carry no cipher and must have one
/// attached locally before being passed to `configure()`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CaptureConfiguration {
    /// Requested output sample rate in Hz. The mic rate probe (when the
    /// microphone is enabled) may lower this but never raise it.
    pub sample_rate: f64,
    /// Output bits per sample; 16, 24, or 32.
    pub bit_depth: u16,
    /// Output channel count; 1 (mono) or 2 (stereo). The mixer always works
    /// in interleaved stereo internally; a mono request downmixes the final
    /// mixed frame before it reaches the WAV writer.
    pub channels: u16,
    /// Directory the output WAV file is written into. Created if missing.
    pub output_directory: PathBuf,
    /// Optional ceiling on capture duration. When reached, the session
    /// stops itself as if `stop()` had been called externally.
    pub max_duration: Option<Duration>,
    /// Provider-specific identifier of the microphone device to use, or
    /// `None` to let the provider pick a default.
    pub mic_device_id: Option<String>,
    /// Whether the microphone track is captured.
    pub enable_mic: bool,
    /// Whether the system-audio track is captured. May be silently
    /// downgraded at `start()` time if the system provider is unavailable.
    pub enable_system: bool,
    /// Optional cipher applied to each chunk written to the output file.
    /// When `None`, the file is plain PCM WAV. Never (de)serialized: a live
    /// trait object can't cross a process boundary, so configurations that
    /// travel over IPC or disk arrive with no cipher attached and the
    /// caller must attach one locally before calling `configure()`.
    #[serde(skip)]
    pub encryptor: Option<Arc<dyn Encryptor>>,
}

impl std::fmt::Debug for CaptureConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureConfiguration")
            .field("sample_rate", &self.sample_rate)
            .field("bit_depth", &self.bit_depth)
            .field("channels", &self.channels)
            .field("output_directory", &self.output_directory)
            .field("max_duration", &self.max_duration)
            .field("mic_device_id", &self.mic_device_id)
            .field("enable_mic", &self.enable_mic)
            .field("enable_system", &self.enable_system)
            .field("encryptor", &self.encryptor.is_some())
            .finish()
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            bit_depth: 16,
            channels: 2,
            output_directory: std::env::temp_dir(),
            max_duration: None,
            mic_device_id: None,
            enable_mic: true,
            enable_system: true,
            encryptor: None,
        }
    }
}

const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

impl CaptureConfiguration {
    /// Validate the configuration, returning a [`CaptureError::ConfigurationFailed`]
    /// describing the first problem found.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "sample_rate must be positive and finite, got {}",
                self.sample_rate
            )));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "bit_depth must be one of {:?}, got {}",
                SUPPORTED_BIT_DEPTHS, self.bit_depth
            )));
        }
        if self.channels < 1 || self.channels > 2 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if !self.enable_mic && !self.enable_system {
            return Err(CaptureError::ConfigurationFailed(
                "at least one of enable_mic/enable_system must be true".to_string(),
            ));
        }
        if let Some(max) = self.max_duration {
            if max.is_zero() {
                return Err(CaptureError::ConfigurationFailed(
                    "max_duration must be greater than zero when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CaptureConfiguration::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_sample_rate() {
        let mut config = CaptureConfiguration::default();
        config.sample_rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let mut config = CaptureConfiguration::default();
        config.bit_depth = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unsupported_channel_count() {
        let mut config = CaptureConfiguration::default();
        config.channels = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_mono_channel_count() {
        let mut config = CaptureConfiguration::default();
        config.channels = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_both_sources_disabled() {
        let mut config = CaptureConfiguration::default();
        config.enable_mic = false;
        config.enable_system = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json_without_the_encryptor() {
        let config = CaptureConfiguration::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("encryptor"));
        let restored: CaptureConfiguration = serde_json::from_str(&json).unwrap();
        assert!(restored.encryptor.is_none());
        assert_eq!(restored.sample_rate, config.sample_rate);
    }

    #[test]
    fn rejects_zero_max_duration() {
        let mut config = CaptureConfiguration::default();
        config.max_duration = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
