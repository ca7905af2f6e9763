// Shared test utilities for waveform generation and analysis
use std::f64::consts::PI;

/// Generate a sine wave as 16-bit PCM
pub fn generate_sine_wave(frequency: f64, sample_rate: u32, duration_seconds: f64, amplitude: f64) -> Vec<i16>
{
    let total_samples = (sample_rate as f64 * duration_seconds) as usize;
    let mut samples = Vec::with_capacity(total_samples);

    for i in 0..total_samples
    {
        let t = i as f64 / sample_rate as f64;
        let sample = (2.0 * PI * frequency * t).sin() * amplitude;
        samples.push(sample.round().clamp(-32768.0, 32767.0) as i16);
    }

    samples
}

/// Generate deterministic white noise as 16-bit PCM
pub fn generate_white_noise(total_samples: usize, amplitude: f64, seed: u64) -> Vec<i16>
{
    // Simple LCG pseudorandom number generator for deterministic noise
    let mut state = seed;
    let mut next_random = || -> f64
        {
            // LCG parameters from Numerical Recipes
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            let normalized = (state as f64) / (u64::MAX as f64);
            (normalized - 0.5) * 2.0
        };

    let mut samples = Vec::with_capacity(total_samples);
    for _ in 0..total_samples
    {
        let sample = next_random() * amplitude;
        samples.push(sample.round().clamp(-32768.0, 32767.0) as i16);
    }

    samples
}

/// Closed-form SNR over whole sample slices, using the same integer
/// energy sums the harness accumulates
pub fn calculate_snr(original: &[i16], decoded: &[i16]) -> f64
{
    let min_len = original.len().min(decoded.len());

    let mut signal_energy = 0u64;
    let mut error_energy = 0u64;

    for i in 0..min_len
    {
        let orig = i64::from(original[i]);
        let error = orig - i64::from(decoded[i]);

        signal_energy += (orig * orig) as u64;
        error_energy += (error * error) as u64;
    }

    if error_energy == 0
    {
        f64::INFINITY
    }
    else if signal_energy == 0
    {
        0.0
    }
    else
    {
        10.0 * (signal_energy as f64 / error_energy as f64).log10()
    }
}
