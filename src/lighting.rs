// Lighting estimation from a frame's luma plane

use crate::models::{LightingAssessment, LightingStatus};

/// Every n-th luma byte is sampled
pub const SAMPLE_STRIDE: usize = 10;

/// Normalized brightness below which the scene counts as low light
pub const LOW_LIGHT_THRESHOLD: f32 = 0.3;

/// Normalized brightness above which the scene counts as too bright
pub const TOO_BRIGHT_THRESHOLD: f32 = 0.8;

/// Estimates ambient lighting from a luma plane.
///
/// Samples every [`SAMPLE_STRIDE`]th byte starting at index 0. Brightness is
/// the mean sample, contrast the mean absolute step between consecutive
/// samples (the first step is taken from an implicit 0), both divided by 255.
/// An empty plane yields zero brightness and counts as low light.
pub fn assess_lighting(luma: &[u8]) -> LightingAssessment {
    let mut count = 0u64;
    let mut sum = 0u64;
    let mut delta_sum = 0u64;
    let mut previous = 0u8;

    for &sample in luma.iter().step_by(SAMPLE_STRIDE) {
        sum += sample as u64;
        delta_sum += sample.abs_diff(previous) as u64;
        previous = sample;
        count += 1;
    }

    let (brightness, contrast) = if count == 0 {
        (0.0, 0.0)
    } else {
        let n = count as f64;
        (
            (sum as f64 / n / 255.0) as f32,
            (delta_sum as f64 / n / 255.0) as f32,
        )
    };

    let status = if brightness < LOW_LIGHT_THRESHOLD {
        LightingStatus::Low
    } else if brightness > TOO_BRIGHT_THRESHOLD {
        LightingStatus::TooBright
    } else {
        LightingStatus::Good
    };

    LightingAssessment {
        status,
        brightness,
        contrast,
        is_low_light: status == LightingStatus::Low,
    }
}
