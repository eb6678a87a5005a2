use ndarray::{Array2, Axis};
use rustfft::{
    num_complex::Complex32,
    num_traits::Zero,
    FftPlanner,
};
use tracing::debug;

use crate::{
    error::{MixError, Result},
    types::{AudioData, BandGains},
};

/// Interleaved samples to a `[channels, frames]` array.
pub fn to_planar(audio: &AudioData) -> Array2<f32> {
    let channels = audio.channels.max(1) as usize;
    let frames = audio.frames();
    let mut planar = Array2::<f32>::zeros((channels, frames));
    for (fr, frame) in audio.samples.chunks_exact(channels).enumerate() {
        for (ch, &s) in frame.iter().enumerate() {
            planar[(ch, fr)] = s;
        }
    }
    planar
}

pub fn from_planar(planar: &Array2<f32>, sample_rate: u32) -> AudioData {
    let (channels, frames) = planar.dim();
    let mut samples = Vec::with_capacity(channels * frames);
    for fr in 0..frames {
        for ch in 0..channels {
            samples.push(planar[(ch, fr)]);
        }
    }
    AudioData {
        samples,
        sample_rate,
        channels: channels as u16,
    }
}

fn check_bands(bands: &BandGains) -> Result<()> {
    let (lo, hi) = (bands.low_cutoff_hz, bands.high_cutoff_hz);
    if !lo.is_finite() || !hi.is_finite() || lo <= 0.0 || hi <= 0.0 {
        return Err(MixError::InvalidBands(format!(
            "cutoffs must be positive, got {lo} Hz and {hi} Hz"
        )));
    }
    if lo >= hi {
        return Err(MixError::InvalidBands(format!(
            "low cutoff {lo} Hz must be below high cutoff {hi} Hz"
        )));
    }
    for (name, g) in [("low", bands.low), ("mid", bands.mid), ("high", bands.high)] {
        if !g.is_finite() || g < 0.0 {
            return Err(MixError::InvalidBands(format!("{name} gain {g} is not usable")));
        }
    }
    Ok(())
}

/// Static three-band equalisation over the whole track.
///
/// Each channel is transformed in one piece (no windowing), bins below
/// `low_cutoff_hz`, in `[low_cutoff_hz, high_cutoff_hz)` and at or above
/// `high_cutoff_hz` are scaled by `low`, `mid` and `high`, then transformed
/// back. There is no time localisation: transients smear and instruments that
/// share a frequency range cannot be told apart. Treat the result as a coarse
/// approximation, not a separation.
pub fn band_gain(audio: &AudioData, bands: &BandGains) -> Result<AudioData> {
    check_bands(bands)?;

    let n = audio.frames();
    if n == 0 {
        return Ok(AudioData {
            samples: Vec::new(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
        });
    }

    let sr = audio.sample_rate as f32;
    let bin_hz = sr / n as f32;
    let gains: Vec<f32> = (0..n)
        .map(|k| {
            let freq = k.min(n - k) as f32 * bin_hz;
            if freq < bands.low_cutoff_hz {
                bands.low
            } else if freq < bands.high_cutoff_hz {
                bands.mid
            } else {
                bands.high
            }
        })
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);
    let scale = 1.0 / n as f32;

    let mut planar = to_planar(audio);
    let mut buf = vec![Complex32::zero(); n];

    for mut channel in planar.axis_iter_mut(Axis(0)) {
        for (b, &s) in buf.iter_mut().zip(channel.iter()) {
            *b = Complex32::new(s, 0.0);
        }

        fft.process(&mut buf);
        for (b, &g) in buf.iter_mut().zip(&gains) {
            *b *= g;
        }
        ifft.process(&mut buf);

        for (s, b) in channel.iter_mut().zip(&buf) {
            *s = b.re * scale;
        }
    }

    debug!(
        "Band gain over {} frames: low={} mid={} high={} ({}..{} Hz)",
        n, bands.low, bands.mid, bands.high, bands.low_cutoff_hz, bands.high_cutoff_hz
    );

    Ok(from_planar(&planar, audio.sample_rate))
}

/// Root-mean-square level of a slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}
