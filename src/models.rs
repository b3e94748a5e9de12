//! Data model types shared across the capture pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a capture source reaches the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// An integrated, non-removable device (e.g. a laptop's built-in mic).
    BuiltIn,
    /// A classic Bluetooth audio link (A2DP/HFP).
    Bluetooth,
    /// A Bluetooth Low Energy audio link.
    BluetoothLe,
    /// A USB-attached device.
    Usb,
    /// A virtual/loopback tap with no enumerable hardware device behind it
    /// (e.g. the synthetic system-audio source).
    Virtual,
    /// Transport could not be determined.
    Unknown,
}

/// A capture source as reported by a provider, for presentation to a caller
/// choosing which device or tap to record from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    /// Opaque identifier a caller can feed back into [`crate::CaptureConfiguration::mic_device_id`].
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// How this source is reached.
    pub transport: TransportType,
}

/// Instantaneous RMS/peak levels for both capture sources.
///
/// Peaks are monotonically non-decreasing for the lifetime of a session;
/// they are not reset until the session is reconfigured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioLevels {
    /// Microphone RMS level, normalised 0.0-1.0.
    pub mic_rms: f32,
    /// Microphone peak level (monotonic within the session), normalised 0.0-1.0.
    pub mic_peak: f32,
    /// System-audio RMS level, normalised 0.0-1.0.
    pub system_rms: f32,
    /// System-audio peak level (monotonic within the session), normalised 0.0-1.0.
    pub system_peak: f32,
}

/// Non-authoritative counters useful for diagnosing a session; never used to
/// gate control-flow decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureSessionDiagnostics {
    /// Number of PCM callbacks received from the microphone provider.
    pub mic_callback_count: u64,
    /// Number of PCM callbacks received from the system-audio provider.
    pub system_callback_count: u64,
    /// Total raw mic samples observed (pre-resample).
    pub mic_samples_observed: u64,
    /// Total raw system samples observed (pre-resample).
    pub system_samples_observed: u64,
    /// Number of samples dropped by ring buffer overflow, mic side.
    pub mic_samples_dropped: u64,
    /// Number of samples dropped by ring buffer overflow, system side.
    pub system_samples_dropped: u64,
    /// Sample rate the mic rate probe detected, if it ran.
    pub detected_mic_rate: Option<f64>,
    /// Whether the system-audio provider was actually active for this session
    /// (distinct from whether it was requested in configuration).
    pub system_capture_active: bool,
    /// Human-readable description (`"{rate} Hz, {channels}ch"`) of the most
    /// recent mic buffer's reported format.
    pub last_mic_format: Option<String>,
    /// Human-readable description of the most recent system-audio buffer's
    /// reported format.
    pub last_system_format: Option<String>,
    /// Total bytes handed to the WAV writer so far (including any encryption
    /// framing), mirroring `WavWriter`'s own running counter.
    pub bytes_written: u64,
    /// Number of completed processing-loop mix ticks.
    pub mix_cycles: u64,
}

/// Per-track metadata recorded alongside the final mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Human-readable label, e.g. "microphone" or "system-audio".
    pub label: String,
    /// The sample rate this track was captured or detected at, before
    /// resampling into the shared output rate.
    pub source_sample_rate: f64,
}

/// Metadata describing a finished recording, independent of where the bytes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Unique identifier assigned at session start.
    pub recording_id: uuid::Uuid,
    /// Wall-clock time the recording started.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Wall-clock time the recording finished.
    pub finished_at: chrono::DateTime<chrono::Utc>,
    /// Total captured duration, excluding paused time.
    pub duration_seconds: f64,
    /// Output sample rate actually written to the WAV file.
    pub sample_rate: u32,
    /// Output channel count (1 mono or 2 mixed stereo).
    pub channels: u16,
    /// Output bit depth.
    pub bit_depth: u16,
    /// Whether the file on disk is stream-encrypted.
    pub encrypted: bool,
    /// Name of the encryption algorithm in use, when encrypted.
    pub encryption_algorithm: Option<String>,
    /// Opaque, non-secret identifier for the encryption key in use, when encrypted.
    pub encryption_key_id: Option<String>,
    /// Per-track capture details.
    pub tracks: Vec<TrackInfo>,
}

/// The result of a completed recording: where it lives and how to verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    /// Path to the written WAV file.
    pub output_path: PathBuf,
    /// SHA-256 checksum of the file, hex-encoded, computed after the header
    /// fix-up so it covers the final bytes on disk.
    pub checksum: String,
    /// Total bytes written to disk (including any encryption framing).
    pub bytes_written: u64,
    /// Descriptive metadata about the recording.
    pub metadata: RecordingMetadata,
}
