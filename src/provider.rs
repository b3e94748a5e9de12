//! Capture backend contract
//!
//! A `CaptureProvider` is the only seam between this crate and a real audio
//! backend. No concrete OS implementation ships here; callers either bring
//! their own (wrapping a platform capture API) or use
//! [`crate::testutil::ScriptedProvider`] for tests.

use crate::error::CaptureError;
use crate::models::AudioSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// A batch of PCM samples delivered by a provider.
///
/// `samples` is interleaved across `channels` (so `samples.len()` is always
/// a multiple of `channels`, except in deliberately malformed test inputs).
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// The rate this buffer was captured at. Providers may report a rate
    /// that differs from what a caller requested; callers resample.
    pub sample_rate: f64,
    /// Number of interleaved channels.
    pub channels: u16,
}

/// Callback a provider invokes once per delivered buffer.
///
/// Must return quickly and must never block on the tokio runtime (no
/// `.await`, no acquiring an async lock): providers may invoke it from a
/// dedicated capture thread outside of any async context.
pub type PcmCallback = Arc<dyn Fn(PcmBuffer, Instant) + Send + Sync>;

/// Contract a capture backend implements to supply PCM audio to a
/// [`crate::CaptureSession`].
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Whether this provider can currently be started (device present,
    /// permission granted, etc).
    async fn is_available(&self) -> bool;

    /// Enumerate the concrete sources this provider can capture from.
    /// Providers with nothing to enumerate (e.g. a single virtual tap)
    /// may return an empty list.
    async fn list_sources(&self) -> Vec<AudioSource> {
        Vec::new()
    }

    /// Begin capture, invoking `callback` for each buffer until `stop()` is
    /// called. Must not invoke `callback` after returning an `Err`, and must
    /// not invoke it again once `stop()` has returned.
    async fn start(&self, callback: PcmCallback) -> Result<(), CaptureError>;

    /// Stop capture. Must not return until no further `callback` invocation
    /// from `start()` is possible. Calling `stop()` when not started is a
    /// no-op.
    async fn stop(&self);
}
