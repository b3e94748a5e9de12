//! duocapture - dual-source (microphone + system-audio) recording
//!
//! Wires a microphone [`CaptureProvider`] and a system-audio `CaptureProvider`
//! into one time-aligned stereo mix, written to disk as a streaming WAV file
//! with optional per-chunk encryption. No concrete OS capture backend ships
//! here; callers implement `CaptureProvider` against whatever platform API
//! they have (CoreAudio, WASAPI, PulseAudio, ...), or use [`testutil`] for
//! tests and examples.

pub mod config;
pub mod crypto;
pub mod delegate;
pub mod error;
pub mod metering;
pub mod mixer;
pub mod models;
pub mod probe;
pub mod provider;
pub mod ring_buffer;
pub mod session;
pub mod state;
pub mod testutil;
pub mod wav;

pub use config::CaptureConfiguration;
pub use crypto::{Aes256GcmCipher, Decryptor, Encryptor};
pub use delegate::CaptureDelegate;
pub use error::CaptureError;
pub use metering::{calculate_peak, calculate_rms};
pub use mixer::StereoMixer;
pub use models::{
    AudioLevels, AudioSource, CaptureSessionDiagnostics, RecordingMetadata, RecordingResult,
    TrackInfo, TransportType,
};
pub use probe::MicRateProbe;
pub use provider::{CaptureProvider, PcmBuffer, PcmCallback};
pub use ring_buffer::RingBuffer;
pub use session::CaptureSession;
pub use state::CaptureState;
pub use wav::{WavWriter, WavWriterConfig};

/// Install a `tracing` subscriber suitable for a standalone binary embedding
/// this crate: `RUST_LOG`-driven env filter, falling back to `info`.
///
/// Library consumers that already run their own subscriber should not call
/// this; it is a convenience for examples and small host binaries, not
/// something `CaptureSession` depends on internally.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
