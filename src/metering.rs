//! Level calculations for [`crate::models::AudioLevels`]

/// RMS level of a buffer, normalised 0.0-1.0.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt().min(1.0)
}

/// Peak absolute amplitude of a buffer, normalised 0.0-1.0.
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max)
        .min(1.0)
}
