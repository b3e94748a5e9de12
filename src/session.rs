//! Session orchestration: wires a mic and a system-audio provider into one
//! time-aligned, mixed-down, optionally encrypted WAV recording.

use crate::config::CaptureConfiguration;
use crate::delegate::CaptureDelegate;
use crate::error::CaptureError;
use crate::metering::{calculate_peak, calculate_rms};
use crate::mixer::{interleave, to_int16_pcm, StereoMixer};
use crate::models::{AudioLevels, AudioSource, CaptureSessionDiagnostics, RecordingMetadata, RecordingResult, TrackInfo};
use crate::probe::MicRateProbe;
use crate::provider::{CaptureProvider, PcmBuffer, PcmCallback};
use crate::ring_buffer::RingBuffer;
use crate::state::{CaptureState, SessionState};
use crate::wav::{WavWriter, WavWriterConfig};
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Tick interval for the processing loop that drains both rings into the
/// WAV writer.
const PROCESS_TICK: Duration = Duration::from_millis(100);
/// Tick interval for the duration timer / auto-stop watchdog.
const DURATION_TICK: Duration = Duration::from_millis(250);
/// How many seconds of audio each ring buffer can hold before the producer
/// starts overwriting unread samples.
const RING_SECONDS: f64 = 5.0;

struct RuntimeHandles {
    duration_handle: JoinHandle<()>,
    processing_handle: JoinHandle<()>,
    stop_tx: mpsc::Sender<StopRequest>,
}

struct StopRequest {
    reply: oneshot::Sender<Result<(u64, String), CaptureError>>,
}

struct Inner {
    state: Arc<SyncMutex<SessionState>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    mic_provider: Arc<dyn CaptureProvider>,
    system_provider: Arc<dyn CaptureProvider>,
    runtime: AsyncMutex<Option<RuntimeHandles>>,
}

impl Inner {
    fn notify_state(&self, state: CaptureState) {
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn notify_levels(&self, levels: AudioLevels) {
        if let Some(delegate) = &self.delegate {
            delegate.on_levels_updated(levels);
        }
    }

    fn notify_warning(&self, error: CaptureError) {
        if let Some(delegate) = &self.delegate {
            delegate.on_encountered_error(error);
        }
    }

    fn notify_finished(&self, result: RecordingResult) {
        if let Some(delegate) = &self.delegate {
            delegate.on_finished(result);
        }
    }

    async fn configure(&self, config: CaptureConfiguration) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock();
            if let CaptureState::Failed(_) = &state.state {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot configure when the session has already failed terminally; construct a new session".to_string(),
                ));
            }
            if state.state.is_active() {
                return Err(CaptureError::InvalidState(
                    "cannot reconfigure while capturing".to_string(),
                ));
            }
            state.state = CaptureState::Configuring;
        }
        self.notify_state(CaptureState::Configuring);

        if let Err(err) = config.validate() {
            let mut state = self.state.lock();
            state.state = CaptureState::Failed(err.clone());
            drop(state);
            self.notify_state(CaptureState::Failed(err.clone()));
            return Err(err);
        }

        {
            let mut state = self.state.lock();
            state.config = Some(config);
            state.state = CaptureState::Ready;
            state.levels = AudioLevels::default();
            state.diagnostics = CaptureSessionDiagnostics::default();
            state.detected_mic_rate = None;
            state.output_sample_rate = None;
            state.encrypted = false;
        }
        self.notify_state(CaptureState::Ready);
        Ok(())
    }

    async fn list_sources(&self) -> Vec<AudioSource> {
        let mut sources = self.mic_provider.list_sources().await;
        if self.system_provider.is_available().await {
            sources.push(AudioSource {
                id: "system-audio".to_string(),
                name: "System Audio".to_string(),
                transport: crate::models::TransportType::Virtual,
            });
        }
        sources
    }

    async fn start(self: &Arc<Self>) -> Result<(), CaptureError> {
        let config = {
            let state = self.state.lock();
            if let CaptureState::Failed(_) = &state.state {
                return Err(failed_terminally_error());
            }
            if !state.state.can_start() {
                return Err(CaptureError::InvalidState(format!(
                    "cannot start from {:?}",
                    state.state
                )));
            }
            state
                .config
                .clone()
                .ok_or_else(|| CaptureError::ConfigurationFailed("no configuration set".to_string()))?
        };

        let probed_rate = if config.enable_mic {
            Some(MicRateProbe::run(self.mic_provider.clone(), config.sample_rate).await)
        } else {
            None
        };
        let output_rate = probed_rate
            .map(|probed| probed.min(config.sample_rate))
            .unwrap_or(config.sample_rate);

        let mic_capacity = ((output_rate * RING_SECONDS).round().max(1.0)) as usize;
        let system_capacity = mic_capacity * 2;
        let mic_ring = Arc::new(RingBuffer::new(mic_capacity));
        let system_ring = Arc::new(RingBuffer::new(system_capacity));
        let mixer = StereoMixer::new(output_rate);

        let recording_id = uuid::Uuid::new_v4();
        let encrypted = config.encryptor.is_some();
        let extension = if encrypted { "enc.wav" } else { "wav" };
        let output_path = config
            .output_directory
            .join(format!("recording_{recording_id}.{extension}"));

        let wav_config = WavWriterConfig {
            sample_rate: output_rate.round() as u32,
            channels: config.channels,
            bit_depth: config.bit_depth,
            encryptor: config.encryptor.clone(),
        };
        let mut writer = WavWriter::new();
        if let Err(err) = writer.open(&output_path, wav_config) {
            return self.fail_start(err).await;
        }

        if config.enable_mic {
            let ring = mic_ring.clone();
            let state_cb = self.state.clone();
            let callback: PcmCallback = Arc::new(move |buffer: PcmBuffer, _ts: Instant| {
                let mono = downmix_to_mono(&buffer.samples, buffer.channels);
                let resampled = mixer.resample_mono(&mono, buffer.sample_rate);
                let dropped = ring.write(&resampled);
                let rms = calculate_rms(&resampled);
                let peak = calculate_peak(&resampled);
                let mut state = state_cb.lock();
                state.levels.mic_rms = rms;
                state.levels.mic_peak = state.levels.mic_peak.max(peak);
                state.diagnostics.mic_callback_count += 1;
                state.diagnostics.mic_samples_observed += buffer.samples.len() as u64;
                state.diagnostics.mic_samples_dropped += dropped as u64;
                state.diagnostics.last_mic_format =
                    Some(format!("{} Hz, {}ch", buffer.sample_rate, buffer.channels));
            });
            if let Err(err) = self.mic_provider.start(callback).await {
                let _ = writer.close(None);
                return self
                    .fail_start(CaptureError::DeviceNotAvailable(format!(
                        "microphone provider failed to start: {err}"
                    )))
                    .await;
            }
        }

        let mut system_active = false;
        if config.enable_system {
            let ring = system_ring.clone();
            let state_cb = self.state.clone();
            let callback: PcmCallback = Arc::new(move |buffer: PcmBuffer, _ts: Instant| {
                // The system tap's reported rate is untrustworthy once the
                // output device renegotiates (e.g. a Bluetooth HFP switch):
                // it still delivers at the target rate even when it claims
                // otherwise, so resampling always treats source == target.
                let target = mixer.target_sample_rate();
                let interleaved = if buffer.channels <= 1 {
                    let resampled = mixer.resample_mono(&buffer.samples, target);
                    interleave(&resampled, &resampled)
                } else {
                    mixer.resample_stereo(&buffer.samples, target)
                };
                let dropped = ring.write(&interleaved);
                let mono_for_levels = downmix_to_mono(&interleaved, 2);
                let rms = calculate_rms(&mono_for_levels);
                let peak = calculate_peak(&mono_for_levels);
                let mut state = state_cb.lock();
                state.levels.system_rms = rms;
                state.levels.system_peak = state.levels.system_peak.max(peak);
                state.diagnostics.system_callback_count += 1;
                state.diagnostics.system_samples_observed += buffer.samples.len() as u64;
                state.diagnostics.system_samples_dropped += dropped as u64;
                state.diagnostics.last_system_format =
                    Some(format!("{} Hz, {}ch", buffer.sample_rate, buffer.channels));
            });
            match self.system_provider.start(callback).await {
                Ok(()) => system_active = true,
                Err(err) => {
                    self.notify_warning(CaptureError::ConfigurationFailed(format!(
                        "system audio unavailable, continuing mic-only: {err}"
                    )));
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.detected_mic_rate = probed_rate;
            state.output_sample_rate = Some(output_rate);
            state.diagnostics.detected_mic_rate = probed_rate;
            state.diagnostics.system_capture_active = system_active;
            state.output_path = Some(output_path.clone());
            state.capture_start = Some(Instant::now());
            state.paused_accum = Duration::ZERO;
            state.last_pause_at = None;
            state.started_at = Some(chrono::Utc::now());
            state.encrypted = encrypted;
            state.recording_id = Some(recording_id);
            state.state = CaptureState::Capturing(0.0);
        }
        self.notify_state(CaptureState::Capturing(0.0));

        // Per-tick frame budget is derived from the configured sample rate,
        // not the (possibly lower) negotiated output rate.
        let tick_frame_cap = (config.sample_rate * PROCESS_TICK.as_secs_f64())
            .floor()
            .max(0.0) as usize;

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let processing_handle = tokio::spawn(run_processing_loop(
            mic_ring,
            system_ring,
            mixer,
            writer,
            system_active,
            config.channels,
            tick_frame_cap,
            stop_rx,
            self.delegate.clone(),
            self.state.clone(),
        ));
        let duration_handle = tokio::spawn(run_duration_timer(self.clone(), config.max_duration));

        *self.runtime.lock().await = Some(RuntimeHandles {
            duration_handle,
            processing_handle,
            stop_tx,
        });

        Ok(())
    }

    async fn fail_start(&self, err: CaptureError) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock();
            state.state = CaptureState::Failed(err.clone());
        }
        self.notify_state(CaptureState::Failed(err.clone()));
        Err(err)
    }

    fn pause(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        let elapsed = match state.state {
            CaptureState::Capturing(_) => state.elapsed_seconds(),
            CaptureState::Failed(_) => return Err(failed_terminally_error()),
            _ => {
                return Err(CaptureError::InvalidState(format!(
                    "cannot pause from {:?}",
                    state.state
                )))
            }
        };
        state.last_pause_at = Some(Instant::now());
        state.state = CaptureState::Paused(elapsed);
        let new_state = state.state.clone();
        drop(state);
        self.notify_state(new_state);
        Ok(())
    }

    fn resume(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        let elapsed = match state.state {
            CaptureState::Paused(elapsed) => elapsed,
            CaptureState::Failed(_) => return Err(failed_terminally_error()),
            _ => {
                return Err(CaptureError::InvalidState(format!(
                    "cannot resume from {:?}",
                    state.state
                )))
            }
        };
        if let Some(pause_start) = state.last_pause_at.take() {
            state.paused_accum += pause_start.elapsed();
        }
        state.state = CaptureState::Capturing(elapsed);
        let new_state = state.state.clone();
        drop(state);
        self.notify_state(new_state);
        Ok(())
    }

    async fn stop(&self) -> Result<RecordingResult, CaptureError> {
        {
            let mut state = self.state.lock();
            if let CaptureState::Failed(_) = &state.state {
                return Err(failed_terminally_error());
            }
            if !state.state.is_active() {
                return Err(CaptureError::InvalidState(format!(
                    "cannot stop from {:?}",
                    state.state
                )));
            }
            state.state = CaptureState::Stopping;
        }
        self.notify_state(CaptureState::Stopping);

        self.mic_provider.stop().await;
        self.system_provider.stop().await;

        let handles = {
            let mut guard = self.runtime.lock().await;
            guard.take()
        };
        let handles = match handles {
            Some(handles) => handles,
            None => {
                return self
                    .fail_stop(CaptureError::InvalidState(
                        "no active capture runtime".to_string(),
                    ))
                    .await
            }
        };
        handles.duration_handle.abort();

        let (reply_tx, reply_rx) = oneshot::channel();
        if handles
            .stop_tx
            .send(StopRequest { reply: reply_tx })
            .await
            .is_err()
        {
            handles.processing_handle.abort();
            return self
                .fail_stop(CaptureError::Unknown(
                    "processing task is no longer running".to_string(),
                ))
                .await;
        }

        let outcome = match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                return self
                    .fail_stop(CaptureError::Unknown(
                        "processing task dropped without replying".to_string(),
                    ))
                    .await
            }
        };

        match outcome {
            Ok((bytes_written, checksum)) => {
                let result = self.build_result(bytes_written, checksum)?;
                {
                    let mut state = self.state.lock();
                    state.state = CaptureState::Completed(result.clone());
                }
                self.notify_state(CaptureState::Completed(result.clone()));
                self.notify_finished(result.clone());
                Ok(result)
            }
            Err(err) => self.fail_stop(err).await,
        }
    }

    async fn fail_stop(&self, err: CaptureError) -> Result<RecordingResult, CaptureError> {
        {
            let mut state = self.state.lock();
            state.state = CaptureState::Failed(err.clone());
        }
        self.notify_state(CaptureState::Failed(err.clone()));
        Err(err)
    }

    fn build_result(&self, bytes_written: u64, checksum: String) -> Result<RecordingResult, CaptureError> {
        let state = self.state.lock();
        let config = state
            .config
            .as_ref()
            .ok_or_else(|| CaptureError::Unknown("missing configuration at finish".to_string()))?;
        let output_path = state
            .output_path
            .clone()
            .ok_or_else(|| CaptureError::Unknown("missing output path at finish".to_string()))?;
        let started_at = state
            .started_at
            .ok_or_else(|| CaptureError::Unknown("missing start time at finish".to_string()))?;
        let output_rate = state.output_sample_rate.unwrap_or(config.sample_rate);
        let recording_id = state.recording_id.unwrap_or_else(uuid::Uuid::new_v4);
        let duration_seconds = state.elapsed_seconds();

        let mut tracks = Vec::new();
        if config.enable_mic {
            tracks.push(TrackInfo {
                label: "microphone".to_string(),
                source_sample_rate: state.detected_mic_rate.unwrap_or(config.sample_rate),
            });
        }
        if state.diagnostics.system_capture_active {
            tracks.push(TrackInfo {
                label: "system-audio".to_string(),
                source_sample_rate: output_rate,
            });
        }

        let (encryption_algorithm, encryption_key_id) = match &config.encryptor {
            Some(encryptor) => (
                Some(encryptor.algorithm_name().to_string()),
                encryptor.key_id(),
            ),
            None => (None, None),
        };

        let metadata = RecordingMetadata {
            recording_id,
            started_at,
            finished_at: chrono::Utc::now(),
            duration_seconds,
            sample_rate: output_rate.round() as u32,
            channels: config.channels,
            bit_depth: config.bit_depth,
            encrypted: state.encrypted,
            encryption_algorithm,
            encryption_key_id,
            tracks,
        };

        Ok(RecordingResult {
            output_path,
            checksum,
            bytes_written,
            metadata,
        })
    }
}

/// The stable rejection every public operation returns once a session has
/// failed terminally: no path recovers a `Failed` session in place, the
/// caller must construct a new one.
fn failed_terminally_error() -> CaptureError {
    CaptureError::ConfigurationFailed(
        "cannot … when not ready: this session has already failed terminally; construct a new session".to_string(),
    )
}

/// Downmix interleaved multi-channel samples to mono by averaging channels.
fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

async fn run_processing_loop(
    mic_ring: Arc<RingBuffer>,
    system_ring: Arc<RingBuffer>,
    mixer: StereoMixer,
    mut writer: WavWriter,
    system_active: bool,
    output_channels: u16,
    tick_frame_cap: usize,
    mut stop_rx: mpsc::Receiver<StopRequest>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    state: Arc<SyncMutex<SessionState>>,
) {
    let mut ticker = tokio::time::interval(PROCESS_TICK);
    let mut write_error: Option<CaptureError> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if write_error.is_none() {
                    match drain_and_write(&mic_ring, &system_ring, &mixer, &mut writer, system_active, output_channels, Some(tick_frame_cap)) {
                        Ok(wrote) => if wrote {
                            let mut guard = state.lock();
                            guard.diagnostics.bytes_written = writer.bytes_written();
                            guard.diagnostics.mix_cycles += 1;
                        },
                        Err(err) => {
                            tracing::error!("capture processing loop: write failed: {}", err);
                            if let Some(delegate) = &delegate {
                                delegate.on_encountered_error(err.clone());
                            }
                            write_error = Some(err);
                        }
                    }
                } else {
                    // Still drain the rings so producers never block or overflow
                    // silently while the session waits to be stopped.
                    mic_ring.read_all();
                    if system_active {
                        system_ring.read_all();
                    }
                }
            }
            Some(request) = stop_rx.recv() => {
                let outcome = if let Some(err) = write_error.take() {
                    Err(err)
                } else {
                    // Final flush: drain everything remaining, uncapped, rather
                    // than waiting for further ticks.
                    match drain_and_write(&mic_ring, &system_ring, &mixer, &mut writer, system_active, output_channels, None) {
                        Ok(wrote) => {
                            if wrote {
                                let mut guard = state.lock();
                                guard.diagnostics.bytes_written = writer.bytes_written();
                                guard.diagnostics.mix_cycles += 1;
                            }
                            writer.close(None)
                        }
                        Err(err) => Err(err),
                    }
                };
                let _ = request.reply.send(outcome);
                break;
            }
        }
    }
}

/// Drains both rings, mixes, and writes one PCM chunk. Returns `true` if a
/// chunk was actually written (there was anything to drain).
///
/// When the system track is active, it drives the clock: the number of
/// frames processed this call is `system_ring.len()/2`, capped at
/// `frame_cap` (or uncapped, for the final flush on `stop()`), and the mic
/// ring only ever contributes up to that many frames — an under-running mic
/// is zero-padded by the mixer rather than letting it decide the length.
/// When the system track is inactive, the mic ring alone drives the clock,
/// capped the same way.
fn drain_and_write(
    mic_ring: &RingBuffer,
    system_ring: &RingBuffer,
    mixer: &StereoMixer,
    writer: &mut WavWriter,
    system_active: bool,
    output_channels: u16,
    frame_cap: Option<usize>,
) -> Result<bool, CaptureError> {
    let (mic_samples, system_samples) = if system_active {
        let frames_available = system_ring.len() / 2;
        let frames = match frame_cap {
            Some(cap) => frames_available.min(cap),
            None => frames_available,
        };
        if frames == 0 {
            return Ok(false);
        }
        let system_samples = system_ring.read(frames * 2);
        let mic_samples = mic_ring.read(frames);
        (mic_samples, system_samples)
    } else {
        let mic_samples = match frame_cap {
            Some(cap) => mic_ring.read(cap),
            None => mic_ring.read_all(),
        };
        if mic_samples.is_empty() {
            return Ok(false);
        }
        (mic_samples, Vec::new())
    };

    let mixed = mixer.mix_mono_mic_with_stereo_system(&mic_samples, &system_samples);
    let output = if output_channels == 1 {
        downmix_to_mono(&mixed, 2)
    } else {
        mixed
    };
    let pcm = to_int16_pcm(&output);
    let bytes: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
    writer.write(&bytes)?;
    Ok(true)
}

async fn run_duration_timer(inner: Arc<Inner>, max_duration: Option<Duration>) {
    let mut ticker = tokio::time::interval(DURATION_TICK);
    loop {
        ticker.tick().await;
        let (elapsed, is_capturing, terminal) = {
            let state = inner.state.lock();
            (
                state.elapsed_seconds(),
                matches!(state.state, CaptureState::Capturing(_)),
                matches!(
                    state.state,
                    CaptureState::Completed(_) | CaptureState::Failed(_)
                ),
            )
        };
        if terminal {
            break;
        }
        if !is_capturing {
            continue;
        }
        {
            let mut state = inner.state.lock();
            if matches!(state.state, CaptureState::Capturing(_)) {
                state.state = CaptureState::Capturing(elapsed);
            }
        }
        inner.notify_state(CaptureState::Capturing(elapsed));

        if let Some(max) = max_duration {
            if elapsed >= max.as_secs_f64() {
                let _ = inner.stop().await;
                break;
            }
        }
    }
}

/// A recording session coordinating a microphone provider and a
/// system-audio provider into one mixed, time-aligned WAV output.
///
/// Cheap to clone: internally an `Arc` handle, so the same session can be
/// shared with whatever owns the UI/command layer and with its own
/// background tasks without lifetime gymnastics.
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<Inner>,
}

impl CaptureSession {
    /// Build a session around a microphone provider and a system-audio
    /// provider, with no delegate attached.
    pub fn new(mic_provider: Arc<dyn CaptureProvider>, system_provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(SyncMutex::new(SessionState::default())),
                delegate: None,
                mic_provider,
                system_provider,
                runtime: AsyncMutex::new(None),
            }),
        }
    }

    /// Attach a delegate that receives lifecycle notifications.
    pub fn with_delegate(
        mic_provider: Arc<dyn CaptureProvider>,
        system_provider: Arc<dyn CaptureProvider>,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(SyncMutex::new(SessionState::default())),
                delegate: Some(delegate),
                mic_provider,
                system_provider,
                runtime: AsyncMutex::new(None),
            }),
        }
    }

    /// Apply a configuration. Valid from `Idle`, `Ready`, or `Completed`;
    /// invalid while capturing or paused, and permanently invalid once the
    /// session has reached `Failed` (construct a new session instead).
    pub async fn configure(&self, config: CaptureConfiguration) -> Result<(), CaptureError> {
        self.inner.configure(config).await
    }

    /// List available capture sources across both providers.
    pub async fn list_sources(&self) -> Vec<AudioSource> {
        self.inner.list_sources().await
    }

    /// Begin capture. Requires a prior successful `configure()`.
    pub async fn start(&self) -> Result<(), CaptureError> {
        self.inner.start().await
    }

    /// Pause capture. The duration timer freezes; the processing loop keeps
    /// draining buffered audio so neither ring overflows while paused.
    pub fn pause(&self) -> Result<(), CaptureError> {
        self.inner.pause()
    }

    /// Resume a paused capture.
    pub fn resume(&self) -> Result<(), CaptureError> {
        self.inner.resume()
    }

    /// Stop capture, finalise the WAV file, and return its metadata.
    pub async fn stop(&self) -> Result<RecordingResult, CaptureError> {
        self.inner.stop().await
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.inner.state.lock().state.clone()
    }

    /// The most recently observed audio levels.
    pub fn levels(&self) -> AudioLevels {
        self.inner.state.lock().levels
    }

    /// Non-authoritative diagnostic counters for the current or most recent
    /// recording.
    pub fn diagnostics(&self) -> CaptureSessionDiagnostics {
        self.inner.state.lock().diagnostics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingDelegate, ScriptedProvider};
    use std::time::Duration as StdDuration;

    fn scripted_pair(
        mic_script: Vec<PcmBuffer>,
        system_script: Vec<PcmBuffer>,
    ) -> (Arc<dyn CaptureProvider>, Arc<dyn CaptureProvider>) {
        let mic = Arc::new(ScriptedProvider::new(mic_script, StdDuration::from_millis(5)));
        let system = Arc::new(ScriptedProvider::new(system_script, StdDuration::from_millis(5)));
        (mic, system)
    }

    fn sine_buffer(n: usize, rate: f64, channels: u16) -> PcmBuffer {
        let samples: Vec<f32> = (0..n * channels as usize)
            .map(|i| ((i as f32) * 0.05).sin() * 0.3)
            .collect();
        PcmBuffer {
            samples,
            sample_rate: rate,
            channels,
        }
    }

    #[tokio::test]
    async fn full_session_round_trip_produces_a_playable_header() {
        let dir = tempfile::tempdir().unwrap();
        let mic_script = vec![sine_buffer(480, 16_000.0, 1); 5];
        let system_script = vec![sine_buffer(480, 16_000.0, 2); 5];
        let (mic, system) = scripted_pair(mic_script, system_script);

        let delegate = Arc::new(RecordingDelegate::new());
        let session = CaptureSession::with_delegate(mic, system, delegate.clone());

        let mut config = CaptureConfiguration::default();
        config.sample_rate = 16_000.0;
        config.output_directory = dir.path().to_path_buf();
        session.configure(config).await.unwrap();
        session.start().await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(300)).await;
        let result = session.stop().await.unwrap();

        assert!(result.output_path.exists());
        assert_eq!(result.checksum.len(), 64);
        assert_eq!(result.metadata.channels, 2);
        assert!(delegate.finished.lock().is_some());

        let contents = std::fs::read(&result.output_path).unwrap();
        assert_eq!(&contents[0..4], b"RIFF");
        assert_eq!(&contents[8..12], b"WAVE");
    }

    #[tokio::test]
    async fn system_unavailable_falls_back_to_mic_only() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Arc::new(ScriptedProvider::new(
            vec![sine_buffer(480, 16_000.0, 1); 3],
            StdDuration::from_millis(5),
        ));
        let system = Arc::new(ScriptedProvider::unavailable());
        let delegate = Arc::new(RecordingDelegate::new());
        let session = CaptureSession::with_delegate(mic, system, delegate.clone());

        let mut config = CaptureConfiguration::default();
        config.sample_rate = 16_000.0;
        config.output_directory = dir.path().to_path_buf();
        session.configure(config).await.unwrap();
        session.start().await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(150)).await;
        let result = session.stop().await.unwrap();

        assert_eq!(result.metadata.tracks.len(), 1);
        assert_eq!(result.metadata.tracks[0].label, "microphone");
        assert!(!delegate.warnings.lock().is_empty());
    }

    #[tokio::test]
    async fn pause_then_resume_keeps_session_active() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Arc::new(ScriptedProvider::new(
            vec![sine_buffer(480, 16_000.0, 1); 10],
            StdDuration::from_millis(5),
        ));
        let system = Arc::new(ScriptedProvider::unavailable());
        let session = CaptureSession::new(mic, system);

        let mut config = CaptureConfiguration::default();
        config.sample_rate = 16_000.0;
        config.enable_system = false;
        config.output_directory = dir.path().to_path_buf();
        session.configure(config).await.unwrap();
        session.start().await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        session.pause().unwrap();
        assert!(matches!(session.state(), CaptureState::Paused(_)));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        session.resume().unwrap();
        assert!(matches!(session.state(), CaptureState::Capturing(_)));

        let result = session.stop().await.unwrap();
        assert!(result.output_path.exists());
    }

    #[tokio::test]
    async fn cannot_start_without_configure() {
        let mic = Arc::new(ScriptedProvider::new(Vec::new(), StdDuration::from_millis(5)));
        let system = Arc::new(ScriptedProvider::unavailable());
        let session = CaptureSession::new(mic, system);
        assert!(session.start().await.is_err());
    }

    #[tokio::test]
    async fn cannot_stop_when_idle() {
        let mic = Arc::new(ScriptedProvider::new(Vec::new(), StdDuration::from_millis(5)));
        let system = Arc::new(ScriptedProvider::unavailable());
        let session = CaptureSession::new(mic, system);
        assert!(session.stop().await.is_err());
    }

    #[tokio::test]
    async fn configure_passes_through_configuring_before_ready() {
        let mic = Arc::new(ScriptedProvider::new(Vec::new(), StdDuration::from_millis(5)));
        let system = Arc::new(ScriptedProvider::unavailable());
        let delegate = Arc::new(RecordingDelegate::new());
        let session = CaptureSession::with_delegate(mic, system, delegate.clone());

        let mut config = CaptureConfiguration::default();
        config.output_directory = std::env::temp_dir();
        session.configure(config).await.unwrap();

        let states = delegate.states.lock();
        assert_eq!(states.len(), 2);
        assert!(matches!(states[0], CaptureState::Configuring));
        assert!(matches!(states[1], CaptureState::Ready));
    }

    #[tokio::test]
    async fn invalid_configuration_fails_terminally_and_locks_out_the_session() {
        let mic = Arc::new(ScriptedProvider::new(Vec::new(), StdDuration::from_millis(5)));
        let system = Arc::new(ScriptedProvider::unavailable());
        let session = CaptureSession::new(mic, system);

        let mut bad = CaptureConfiguration::default();
        bad.sample_rate = -1.0;
        assert!(session.configure(bad).await.is_err());
        assert!(matches!(session.state(), CaptureState::Failed(_)));

        let mut good = CaptureConfiguration::default();
        good.output_directory = std::env::temp_dir();
        let err = session.configure(good).await.unwrap_err();
        assert_eq!(err, CaptureError::ConfigurationFailed(String::new()));
        assert!(matches!(session.state(), CaptureState::Failed(_)));
    }

    #[tokio::test]
    async fn max_duration_auto_stops_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Arc::new(ScriptedProvider::new(
            vec![sine_buffer(480, 16_000.0, 1); 50],
            StdDuration::from_millis(5),
        ));
        let system = Arc::new(ScriptedProvider::unavailable());
        let delegate = Arc::new(RecordingDelegate::new());
        let session = CaptureSession::with_delegate(mic, system, delegate.clone());

        let mut config = CaptureConfiguration::default();
        config.sample_rate = 16_000.0;
        config.enable_system = false;
        config.output_directory = dir.path().to_path_buf();
        config.max_duration = Some(StdDuration::from_millis(300));
        session.configure(config).await.unwrap();
        session.start().await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(800)).await;
        assert!(matches!(session.state(), CaptureState::Completed(_)));
        assert!(delegate.finished.lock().is_some());
    }
}
