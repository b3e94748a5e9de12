//! Resampling, channel layout, and stereo mixing for the two capture tracks
//!
//! Resampling here is deliberately linear interpolation, not a sinc-based
//! method: this crate trades a little aliasing for a resampler with no
//! internal buffering state, which keeps the per-callback processing path
//! simple and allocation-light.

/// Resamples and mixes mono microphone audio against stereo (or mono)
/// system audio into a single target sample rate.
#[derive(Debug, Clone, Copy)]
pub struct StereoMixer {
    target_sample_rate: f64,
}

impl StereoMixer {
    /// Create a mixer that resamples everything to `target_sample_rate`.
    pub fn new(target_sample_rate: f64) -> Self {
        Self { target_sample_rate }
    }

    /// The sample rate every resample operation converges to.
    pub fn target_sample_rate(&self) -> f64 {
        self.target_sample_rate
    }

    /// Linearly resample a mono signal from `source_rate` to the target rate.
    ///
    /// Returns the input unchanged (cloned) when the rates already match.
    pub fn resample_mono(&self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        resample_linear(samples, source_rate, self.target_sample_rate)
    }

    /// Linearly resample an interleaved stereo signal from `source_rate` to
    /// the target rate, preserving the interleaving.
    pub fn resample_stereo(&self, interleaved: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.target_sample_rate).abs() < f64::EPSILON {
            return interleaved.to_vec();
        }
        let left: Vec<f32> = interleaved.iter().step_by(2).copied().collect();
        let right: Vec<f32> = interleaved.iter().skip(1).step_by(2).copied().collect();
        let left = resample_linear(&left, source_rate, self.target_sample_rate);
        let right = resample_linear(&right, source_rate, self.target_sample_rate);
        interleave(&left, &right)
    }

    /// Mix a mono microphone track onto both channels of a stereo (or mono,
    /// pre-duplicated) system track, sample-for-sample.
    ///
    /// `mic_mono` is treated as already resampled to the target rate and is
    /// duplicated onto both channels before summation; shorter input is
    /// padded with silence so both tracks contribute for their full length.
    /// No saturation is applied here — values may exceed `[-1.0, 1.0]`;
    /// clamping happens in [`to_int16_pcm`].
    pub fn mix_mono_mic_with_stereo_system(
        &self,
        mic_mono: &[f32],
        system_interleaved: &[f32],
    ) -> Vec<f32> {
        let frames = mic_mono.len().max(system_interleaved.len() / 2);
        let mut out = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let mic = mic_mono.get(i).copied().unwrap_or(0.0);
            let sys_l = system_interleaved.get(i * 2).copied().unwrap_or(0.0);
            let sys_r = system_interleaved.get(i * 2 + 1).copied().unwrap_or(0.0);
            out.push(mic + sys_l);
            out.push(mic + sys_r);
        }
        out
    }
}

/// Interleave two equal-or-unequal length mono channels into `[L, R, L, R, ...]`,
/// padding the shorter channel with silence.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frames = left.len().max(right.len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(left.get(i).copied().unwrap_or(0.0));
        out.push(right.get(i).copied().unwrap_or(0.0));
    }
    out
}

/// Convert interleaved or mono `f32` PCM in `[-1.0, 1.0]` to clamped 16-bit PCM.
pub fn to_int16_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

fn resample_linear(samples: &[f32], source_rate: f64, target_rate: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    if (source_rate - target_rate).abs() < f64::EPSILON {
        return samples.to_vec();
    }
    let ratio = source_rate / target_rate;
    let out_len = ((samples.len() as f64) / ratio).floor().max(0.0) as usize;
    let mut out = Vec::with_capacity(out_len);
    let last_index = (samples.len() - 1) as f64;
    for i in 0..out_len {
        let src_pos = (i as f64 * ratio).min(last_index);
        let lower = src_pos.floor() as usize;
        let upper = (lower + 1).min(samples.len() - 1);
        let frac = (src_pos - lower as f64) as f32;
        let value = samples[lower] + (samples[upper] - samples[lower]) * frac;
        out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_when_rates_match() {
        let mixer = StereoMixer::new(16_000.0);
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(mixer.resample_mono(&samples, 16_000.0), samples);
    }

    #[test]
    fn resample_mono_downsamples_by_half() {
        let mixer = StereoMixer::new(16_000.0);
        let samples: Vec<f32> = (0..32_000).map(|i| i as f32).collect();
        let resampled = mixer.resample_mono(&samples, 32_000.0);
        assert!((resampled.len() as i64 - 16_000).abs() <= 1);
    }

    #[test]
    fn resample_mono_upsamples() {
        let mixer = StereoMixer::new(32_000.0);
        let samples = vec![0.0, 1.0];
        let resampled = mixer.resample_mono(&samples, 16_000.0);
        assert!(resampled.len() >= 3);
    }

    #[test]
    fn resample_length_matches_exact_upsample_ratio() {
        let mixer = StereoMixer::new(48_000.0);
        let samples = vec![0.0f32; 4410];
        assert_eq!(mixer.resample_mono(&samples, 44_100.0).len(), 4800);
    }

    #[test]
    fn resample_length_floors_a_fractional_ratio() {
        let mixer = StereoMixer::new(48_000.0);
        let samples = vec![0.0f32; 100];
        // 100 * 48000 / 44100 = 108.84...; the spec mandates floor, not round.
        assert_eq!(mixer.resample_mono(&samples, 44_100.0).len(), 108);
    }

    #[test]
    fn interleave_pads_shorter_channel() {
        let left = vec![1.0, 2.0, 3.0];
        let right = vec![9.0];
        let out = interleave(&left, &right);
        assert_eq!(out, vec![1.0, 9.0, 2.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn to_int16_pcm_clamps_and_scales() {
        let samples = vec![1.0, -1.0, 0.0, 2.0, -2.0];
        let pcm = to_int16_pcm(&samples);
        assert_eq!(pcm[0], 32767);
        assert_eq!(pcm[1], -32767);
        assert_eq!(pcm[2], 0);
        assert_eq!(pcm[3], 32767);
        assert_eq!(pcm[4], -32767);
    }

    #[test]
    fn mix_sums_without_saturating() {
        let mixer = StereoMixer::new(16_000.0);
        let mic = vec![0.6, 0.6];
        let system = vec![0.6, 0.6, 0.6, 0.6];
        let mixed = mixer.mix_mono_mic_with_stereo_system(&mic, &system);
        assert_eq!(mixed, vec![1.2, 1.2, 1.2, 1.2]);
    }

    #[test]
    fn mono_mic_duplicated_onto_both_channels() {
        let mixer = StereoMixer::new(16_000.0);
        let mixed = mixer.mix_mono_mic_with_stereo_system(&[1.0, 2.0, 3.0], &[]);
        assert_eq!(mixed, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn lagging_mic_is_zero_padded() {
        let mixer = StereoMixer::new(16_000.0);
        let mixed = mixer.mix_mono_mic_with_stereo_system(&[0.5], &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(mixed, vec![0.6, 0.7, 0.3, 0.4]);
    }

    #[test]
    fn mix_pads_shorter_track_with_silence() {
        let mixer = StereoMixer::new(16_000.0);
        let mic = vec![0.5];
        let system = vec![0.1, 0.1, 0.2, 0.2];
        let mixed = mixer.mix_mono_mic_with_stereo_system(&mic, &system);
        assert_eq!(mixed.len(), 4);
        assert!((mixed[2] - 0.2).abs() < 1e-6);
    }
}
