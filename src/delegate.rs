//! Event sink for a running [`crate::CaptureSession`]

use crate::error::CaptureError;
use crate::models::{AudioLevels, RecordingResult};
use crate::state::CaptureState;

/// Receives lifecycle notifications from a [`crate::CaptureSession`].
///
/// All methods have no-op default implementations; implementers override
/// only the events they care about. Callbacks run on whichever async task
/// produced the event and must not block.
pub trait CaptureDelegate: Send + Sync {
    /// The session transitioned to a new state.
    fn on_state_changed(&self, _state: CaptureState) {}

    /// Updated audio levels are available.
    fn on_levels_updated(&self, _levels: AudioLevels) {}

    /// A non-fatal error occurred (e.g. the system-audio provider failed to
    /// start but the mic-only recording continues, or a single chunk failed
    /// to encrypt and was skipped).
    fn on_encountered_error(&self, _error: CaptureError) {}

    /// The session finished successfully.
    fn on_finished(&self, _result: RecordingResult) {}
}
