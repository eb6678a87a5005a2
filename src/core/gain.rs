use crate::{
    error::{MixError, Result},
    types::{Gain, StemLabel},
};

/// Decibel values at or below this are treated as silence.
pub const MUTE_DB: f32 = -100.0;
pub const MAX_DB: f32 = 10.0;
pub const MAX_LINEAR: f32 = 2.0;

/// `10^(db/20)`
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * gain.log10()
}

impl Gain {
    /// Linear multiplier; the mute sentinel maps to exactly 0.0.
    pub fn linear(&self) -> f32 {
        match *self {
            Gain::Decibels(db) if db <= MUTE_DB => 0.0,
            Gain::Decibels(db) => db_to_gain(db),
            Gain::Linear(g) => g,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.linear() == 0.0
    }

    pub(crate) fn validate(&self, label: StemLabel) -> Result<()> {
        let reason = match *self {
            Gain::Decibels(db) if !db.is_finite() && db != f32::NEG_INFINITY => {
                Some(format!("{db} dB is not a number"))
            }
            Gain::Decibels(db) if db > MAX_DB => {
                Some(format!("{db} dB is above the +{MAX_DB} dB limit"))
            }
            Gain::Linear(g) if !g.is_finite() => Some(format!("{g} is not a number")),
            Gain::Linear(g) if !(0.0..=MAX_LINEAR).contains(&g) => {
                Some(format!("{g} is outside [0, {MAX_LINEAR}]"))
            }
            _ => None,
        };

        match reason {
            Some(reason) => Err(MixError::InvalidGain { label, reason }),
            None => Ok(()),
        }
    }
}
