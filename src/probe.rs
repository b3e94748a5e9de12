//! Microphone rate detection
//!
//! Some platforms report a nominal device sample rate that the hardware
//! doesn't actually deliver at. `MicRateProbe` starts the mic provider
//! briefly, watches what rate its buffers actually carry, and stops again
//! before the real session starts — so `CaptureSession::start()` can pick an
//! output rate that the mic never needs upsampling to reach.

use crate::provider::{CaptureProvider, PcmBuffer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long the probe listens before concluding.
const PROBE_WINDOW: Duration = Duration::from_millis(500);

/// One-shot probe of a provider's actual delivered sample rate.
pub struct MicRateProbe;

impl MicRateProbe {
    /// Start `provider`, observe the minimum sample rate reported across all
    /// buffers delivered within the probe window, then stop it again.
    ///
    /// Returns `configured_rate` unchanged if the provider fails to start or
    /// delivers no buffers in time.
    pub async fn run(provider: Arc<dyn CaptureProvider>, configured_rate: f64) -> f64 {
        let observed: Arc<Mutex<Option<f64>>> = Arc::new(Mutex::new(None));
        let observed_cb = observed.clone();

        let callback = Arc::new(move |buffer: PcmBuffer, _timestamp: Instant| {
            let mut guard = observed_cb.lock();
            *guard = Some(match *guard {
                Some(current) => current.min(buffer.sample_rate),
                None => buffer.sample_rate,
            });
        });

        if provider.start(callback).await.is_err() {
            return configured_rate;
        }

        tokio::time::sleep(PROBE_WINDOW).await;
        provider.stop().await;

        observed.lock().unwrap_or(configured_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedProvider;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn falls_back_to_configured_rate_when_unavailable() {
        let provider: Arc<dyn CaptureProvider> = Arc::new(ScriptedProvider::unavailable());
        let rate = MicRateProbe::run(provider, 48_000.0).await;
        assert_eq!(rate, 48_000.0);
    }

    #[tokio::test]
    async fn detects_a_lower_reported_rate() {
        let script = vec![PcmBuffer {
            samples: vec![0.0; 160],
            sample_rate: 44_100.0,
            channels: 1,
        }];
        let provider: Arc<dyn CaptureProvider> =
            Arc::new(ScriptedProvider::new(script, StdDuration::from_millis(10)));
        let rate = MicRateProbe::run(provider, 48_000.0).await;
        assert_eq!(rate, 44_100.0);
    }
}
