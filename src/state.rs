//! Session lifecycle state

use crate::error::CaptureError;
use crate::models::{AudioLevels, CaptureSessionDiagnostics, RecordingResult};
use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle state of a [`crate::CaptureSession`].
///
/// `Capturing`/`Paused` carry the elapsed capture duration in seconds
/// (excluding paused time), sampled at the moment the state was read.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// No configuration has been applied yet.
    Idle,
    /// A `configure()` call is validating and applying a new configuration.
    /// Always immediately followed by `Ready` or `Failed`.
    Configuring,
    /// Configured and ready to `start()`.
    Ready,
    /// Actively capturing; carries elapsed seconds.
    Capturing(f64),
    /// Paused; carries elapsed seconds at the moment of pausing.
    Paused(f64),
    /// Stop has been requested; providers and the processing loop are
    /// winding down.
    Stopping,
    /// Finished successfully.
    Completed(RecordingResult),
    /// Finished with an error.
    Failed(CaptureError),
}

impl Default for CaptureState {
    fn default() -> Self {
        CaptureState::Idle
    }
}

impl CaptureState {
    /// True for the states in which a `start()` call is valid.
    pub fn can_start(&self) -> bool {
        matches!(self, CaptureState::Ready)
    }

    /// True for the states in which `pause()`/`resume()`/`stop()` apply.
    pub fn is_active(&self) -> bool {
        matches!(self, CaptureState::Capturing(_) | CaptureState::Paused(_))
    }
}

/// Internal, mutex-guarded state owned by a [`crate::CaptureSession`].
///
/// Held behind `parking_lot::Mutex` and never across an `.await` point; all
/// mutation is a short, synchronous critical section.
pub(crate) struct SessionState {
    pub(crate) state: CaptureState,
    pub(crate) config: Option<crate::config::CaptureConfiguration>,
    pub(crate) levels: AudioLevels,
    pub(crate) diagnostics: CaptureSessionDiagnostics,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) capture_start: Option<Instant>,
    pub(crate) paused_accum: std::time::Duration,
    pub(crate) last_pause_at: Option<Instant>,
    pub(crate) detected_mic_rate: Option<f64>,
    pub(crate) output_sample_rate: Option<f64>,
    pub(crate) started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub(crate) encrypted: bool,
    pub(crate) recording_id: Option<uuid::Uuid>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: CaptureState::Idle,
            config: None,
            levels: AudioLevels::default(),
            diagnostics: CaptureSessionDiagnostics::default(),
            output_path: None,
            capture_start: None,
            paused_accum: std::time::Duration::ZERO,
            last_pause_at: None,
            detected_mic_rate: None,
            output_sample_rate: None,
            started_at: None,
            encrypted: false,
            recording_id: None,
        }
    }
}

impl SessionState {
    /// Elapsed capture time so far, excluding time spent paused.
    pub(crate) fn elapsed_seconds(&self) -> f64 {
        match self.capture_start {
            None => 0.0,
            Some(start) => {
                let mut elapsed = start.elapsed();
                if let Some(pause_start) = self.last_pause_at {
                    elapsed -= pause_start.elapsed().min(elapsed);
                }
                (elapsed.saturating_sub(self.paused_accum)).as_secs_f64()
            }
        }
    }
}
