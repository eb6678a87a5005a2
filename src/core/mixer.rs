//! Gain-per-stem remixing.
//!
//! Stems are scaled independently and summed into one buffer. Stems of unequal
//! length are zero-padded to the longest one.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    error::{MixError, Result},
    types::{AudioData, GainMap, MixOptions, StemLabel, StemSet},
};

/// Mix with default options (clipping on).
pub fn mix(stems: &StemSet, gains: &GainMap, mute: &BTreeSet<StemLabel>) -> Result<AudioData> {
    mix_with(stems, gains, mute, &MixOptions::default())
}

pub fn mix_with(
    stems: &StemSet,
    gains: &GainMap,
    mute: &BTreeSet<StemLabel>,
    opts: &MixOptions,
) -> Result<AudioData> {
    let (first_label, first) = stems.iter().next().ok_or(MixError::EmptyInput)?;
    let sample_rate = first.sample_rate;
    let channels = first.channels;

    for (label, stem) in stems {
        if !stem.same_format(first) {
            return Err(MixError::ShapeMismatch {
                label: *label,
                expected_rate: sample_rate,
                expected_channels: channels,
                found_rate: stem.sample_rate,
                found_channels: stem.channels,
            });
        }
    }
    debug!(
        "Mixing {} stems at {} Hz / {} ch (reference: {})",
        stems.len(),
        sample_rate,
        channels,
        first_label
    );

    let len = stems.values().map(|s| s.samples.len()).max().unwrap_or(0);
    let mut out = vec![0.0f32; len];

    for (label, stem) in stems {
        let gain = effective_gain(*label, gains, mute)?;
        debug!("  {label}: x{gain}");
        if gain == 0.0 {
            continue;
        }
        for (acc, sample) in out.iter_mut().zip(&stem.samples) {
            *acc += sample * gain;
        }
    }

    if opts.clip {
        for s in &mut out {
            *s = s.clamp(-1.0, 1.0);
        }
    }

    Ok(AudioData {
        samples: out,
        sample_rate,
        channels,
    })
}

/// Mix with the vocal stem forced silent.
pub fn karaoke(stems: &StemSet, gains: &GainMap) -> Result<AudioData> {
    karaoke_with(stems, gains, &MixOptions::default())
}

pub fn karaoke_with(stems: &StemSet, gains: &GainMap, opts: &MixOptions) -> Result<AudioData> {
    let mute = BTreeSet::from([StemLabel::Vocals]);
    mix_with(stems, gains, &mute, opts)
}

fn effective_gain(label: StemLabel, gains: &GainMap, mute: &BTreeSet<StemLabel>) -> Result<f32> {
    if mute.contains(&label) {
        return Ok(0.0);
    }
    match gains.get(&label) {
        Some(gain) => {
            gain.validate(label)?;
            Ok(gain.linear())
        }
        None => Ok(1.0),
    }
}
