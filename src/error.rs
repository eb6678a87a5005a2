use std::path::PathBuf;

use thiserror::Error;

use crate::types::StemLabel;

/// Central error type for the stem-mixer-core crate.
#[derive(Debug, Error)]
pub enum MixError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Pipeline failures surfaced to the user
    #[error("No input audio: {0}")]
    InputMissing(String),

    #[error("Conversion of '{src}' to '{dst}' failed: {reason}")]
    ConversionFailure {
        src: PathBuf,
        dst: PathBuf,
        reason: String,
    },

    #[error("Stem separation failed: {0}")]
    SeparationFailure(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailure(String),

    // Mixer / DSP
    #[error("Stem '{label}' is {found_rate} Hz / {found_channels} ch, expected {expected_rate} Hz / {expected_channels} ch")]
    ShapeMismatch {
        label: StemLabel,
        expected_rate: u32,
        expected_channels: u16,
        found_rate: u32,
        found_channels: u16,
    },

    #[error("Nothing to mix: no stems supplied")]
    EmptyInput,

    #[error("Invalid gain for '{label}': {reason}")]
    InvalidGain { label: StemLabel, reason: String },

    #[error("Invalid band settings: {0}")]
    InvalidBands(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    // Session / config
    #[error("Cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for MixError {
    fn from(e: serde_json::Error) -> Self {
        MixError::Config(e.to_string())
    }
}

impl MixError {
    /// Errors caused by an external program rather than by the caller's data.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            MixError::ConversionFailure { .. }
                | MixError::SeparationFailure(_)
                | MixError::TranscriptionFailure(_)
        )
    }

    pub fn conversion(
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        MixError::ConversionFailure {
            src: src.into(),
            dst: dst.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MixError>;
