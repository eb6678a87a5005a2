use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

use crate::{
    core::dsp::{from_planar, to_planar},
    error::{MixError, Result},
    types::{AudioData, StemSet},
};

const CHUNK_SIZE: usize = 1024;

/// Convert `audio` to `target_rate`. Identity when the rates already match.
pub fn resample(audio: &AudioData, target_rate: u32) -> Result<AudioData> {
    if target_rate == 0 {
        return Err(MixError::Resample("target sample rate must be positive".into()));
    }
    if audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }

    let channels = audio.channels.max(1) as usize;
    let frames = audio.frames();
    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let expected = (frames as f64 * ratio).ceil() as usize;

    let mut resampler = FftFixedInOut::<f32>::new(
        audio.sample_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        channels,
    )
    .map_err(|e| MixError::Resample(e.to_string()))?;

    let planar = to_planar(audio);
    let input: Vec<Vec<f32>> = planar.outer_iter().map(|ch| ch.to_vec()).collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected); channels];

    let chunk_in = resampler.input_frames_next();
    let delay = resampler.output_delay();

    let mut pos = 0usize;
    // Keep feeding zeros until the filter delay has been flushed out.
    while output[0].len() < expected + delay {
        let chunk: Vec<Vec<f32>> = input
            .iter()
            .map(|ch| {
                let mut c = vec![0.0f32; chunk_in];
                if pos < ch.len() {
                    let end = (pos + chunk_in).min(ch.len());
                    c[..end - pos].copy_from_slice(&ch[pos..end]);
                }
                c
            })
            .collect();

        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| MixError::Resample(e.to_string()))?;
        for (out, ch) in output.iter_mut().zip(processed) {
            out.extend_from_slice(&ch);
        }
        pos += chunk_in;
    }

    let mut result = ndarray::Array2::<f32>::zeros((channels, expected));
    for (ch, out) in output.iter().enumerate() {
        for (i, &s) in out[delay..delay + expected].iter().enumerate() {
            result[(ch, i)] = s;
        }
    }

    debug!(
        "Resampled {} -> {} Hz ({} -> {} frames)",
        audio.sample_rate, target_rate, frames, expected
    );

    Ok(from_planar(&result, target_rate))
}

/// Bring every stem of a set to `target_rate`.
pub fn conform(stems: &StemSet, target_rate: u32) -> Result<StemSet> {
    stems
        .iter()
        .map(|(label, audio)| Ok((*label, resample(audio, target_rate)?)))
        .collect()
}
