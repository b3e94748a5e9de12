//! In-memory test doubles for [`CaptureProvider`] and [`CaptureDelegate`]
//!
//! Not `#[cfg(test)]`-gated: integration tests in `tests/` live in separate
//! crates and need these types to be part of the compiled public API, the
//! same way a library ships a `mock`/`testing` module for its consumers.

use crate::delegate::CaptureDelegate;
use crate::error::CaptureError;
use crate::models::{AudioLevels, RecordingResult};
use crate::provider::{CaptureProvider, PcmBuffer, PcmCallback};
use crate::state::CaptureState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A [`CaptureProvider`] that replays a fixed script of buffers on a
/// background thread, at a fixed interval, then stops.
///
/// Useful for deterministic tests: the script fully determines what the
/// session observes, including rate changes mid-capture (just vary
/// `sample_rate` across scripted buffers).
pub struct ScriptedProvider {
    script: Vec<PcmBuffer>,
    interval: Duration,
    available: AtomicBool,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ScriptedProvider {
    /// Build a provider that plays `script` back at `interval` between
    /// buffers once started.
    pub fn new(script: Vec<PcmBuffer>, interval: Duration) -> Self {
        Self {
            script,
            interval,
            available: AtomicBool::new(true),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Build a provider that reports itself unavailable and always fails to
    /// start, for exercising device-not-available paths.
    pub fn unavailable() -> Self {
        Self {
            script: Vec::new(),
            interval: Duration::from_millis(10),
            available: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CaptureProvider for ScriptedProvider {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn start(&self, callback: PcmCallback) -> Result<(), CaptureError> {
        if !self.is_available().await {
            return Err(CaptureError::DeviceNotAvailable(
                "scripted provider marked unavailable".to_string(),
            ));
        }
        self.running.store(true, Ordering::SeqCst);
        let script = self.script.clone();
        let interval = self.interval;
        let running = self.running.clone();

        let handle = std::thread::spawn(move || {
            for buffer in script {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                callback(buffer, Instant::now());
                std::thread::sleep(interval);
            }
        });
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// A [`CaptureDelegate`] that records every event it receives, for
/// assertions in tests.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<CaptureState>>,
    pub levels: Mutex<Vec<AudioLevels>>,
    pub warnings: Mutex<Vec<CaptureError>>,
    pub finished: Mutex<Option<RecordingResult>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        self.states.lock().push(state);
    }

    fn on_levels_updated(&self, levels: AudioLevels) {
        self.levels.lock().push(levels);
    }

    fn on_encountered_error(&self, error: CaptureError) {
        self.warnings.lock().push(error);
    }

    fn on_finished(&self, result: RecordingResult) {
        *self.finished.lock() = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_provider_refuses_to_start() {
        let provider = ScriptedProvider::unavailable();
        let callback: PcmCallback = Arc::new(|_, _| {});
        assert!(provider.start(callback).await.is_err());
    }

    #[tokio::test]
    async fn scripted_provider_replays_every_buffer() {
        let script = vec![
            PcmBuffer {
                samples: vec![0.1],
                sample_rate: 16_000.0,
                channels: 1,
            },
            PcmBuffer {
                samples: vec![0.2],
                sample_rate: 16_000.0,
                channels: 1,
            },
        ];
        let provider = ScriptedProvider::new(script, Duration::from_millis(5));
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let callback: PcmCallback = Arc::new(move |buf, _| {
            received_cb.lock().push(buf.samples[0]);
        });
        provider.start(callback).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        provider.stop().await;
        assert_eq!(*received.lock(), vec![0.1, 0.2]);
    }

    #[test]
    fn recording_delegate_captures_events() {
        let delegate = RecordingDelegate::new();
        delegate.on_state_changed(CaptureState::Idle);
        delegate.on_encountered_error(CaptureError::Timeout("probe".to_string()));
        assert_eq!(delegate.states.lock().len(), 1);
        assert_eq!(delegate.warnings.lock().len(), 1);
    }
}
