use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{MixError, Result},
    utils,
};

#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one value per channel each).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn same_format(&self, other: &AudioData) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

/// Semantic label of a separated stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemLabel {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl StemLabel {
    pub const ALL: [StemLabel; 4] = [
        StemLabel::Vocals,
        StemLabel::Drums,
        StemLabel::Bass,
        StemLabel::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemLabel::Vocals => "vocals",
            StemLabel::Drums => "drums",
            StemLabel::Bass => "bass",
            StemLabel::Other => "other",
        }
    }

    /// File name the separator writes this stem to.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.as_str())
    }
}

impl fmt::Display for StemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StemLabel {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "vocals" | "vocal" | "lead" => Ok(StemLabel::Vocals),
            "drums" | "drum" => Ok(StemLabel::Drums),
            "bass" => Ok(StemLabel::Bass),
            "other" | "synth" => Ok(StemLabel::Other),
            _ => Err(MixError::Config(format!("Unknown stem label `{s}`"))),
        }
    }
}

/// Per-stem gain as entered by the user.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gain {
    Decibels(f32),
    Linear(f32),
}

impl Default for Gain {
    fn default() -> Self {
        Gain::Decibels(0.0)
    }
}

pub type StemSet = BTreeMap<StemLabel, AudioData>;
pub type GainMap = BTreeMap<StemLabel, Gain>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixOptions {
    /// Clamp every output sample to [-1.0, 1.0].
    pub clip: bool,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self { clip: true }
    }
}

/// Linear gains and crossover points of the three-band processor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandGains {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
    pub low_cutoff_hz: f32,
    pub high_cutoff_hz: f32,
}

impl Default for BandGains {
    fn default() -> Self {
        Self {
            low: 1.0,
            mid: 1.0,
            high: 1.0,
            low_cutoff_hz: 250.0,
            high_cutoff_hz: 4000.0,
        }
    }
}

/// Stem files found after an external separation run.
#[derive(Clone, Debug, Default)]
pub struct StemPaths {
    pub paths: BTreeMap<StemLabel, PathBuf>,
}

impl StemPaths {
    pub fn get(&self, label: StemLabel) -> Option<&Path> {
        self.paths.get(&label).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            _ => Err(MixError::Config(format!("Unsupported output format `{s}`"))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Parent directory for per-session working directories.
    pub work_root: PathBuf,
    pub separation_model: String,
    pub transcription_model: String,
    pub python: String,
    /// ffmpeg executable; `None` decodes natively and only writes WAV.
    pub ffmpeg: Option<String>,
    pub output_format: OutputFormat,
    pub clip: bool,
    pub keep_work_dir: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir(),
            separation_model: "htdemucs".into(),
            transcription_model: "large".into(),
            python: "python3".into(),
            ffmpeg: None,
            output_format: OutputFormat::Wav,
            clip: true,
            keep_work_dir: false,
        }
    }
}

impl SessionOptions {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            MixError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overlay `STEM_MIXER_*` environment variables.
    pub fn with_env(mut self) -> Self {
        if let Some(dir) = utils::tmp_dir() {
            self.work_root = dir;
        }
        if let Some(python) = utils::python_bin() {
            self.python = python;
        }
        if let Some(ffmpeg) = utils::ffmpeg_bin() {
            self.ffmpeg = Some(ffmpeg);
        }
        self
    }

    pub fn mix_options(&self) -> MixOptions {
        MixOptions { clip: self.clip }
    }
}
