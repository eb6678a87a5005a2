//! # stem-mixer-core
//!
//! Remix separated stems with per-stem gains, render karaoke versions, apply
//! a coarse three-band gain, and drive the external separation, transcription
//! and codec programs through a per-session state machine.

pub mod core;
pub mod error;
pub mod external;
pub mod io;
pub mod session;
pub mod types;
pub mod utils;

pub use crate::{
    core::{
        audio::{read_audio, write_audio},
        dsp::band_gain,
        gain::{db_to_gain, gain_to_db},
        mixer::{karaoke, mix, mix_with},
        resample::{conform, resample},
    },
    error::{MixError, Result},
    io::progress::{clear_progress_callback, set_progress_callback, SessionProgress},
    session::{Lyrics, Session, SessionState},
    types::{
        AudioData, BandGains, Gain, GainMap, MixOptions, OutputFormat, SessionOptions, StemLabel,
        StemPaths, StemSet,
    },
};
