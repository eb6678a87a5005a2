//! Per-user workflow: upload, separate, remix, transcribe.
//!
//! A `Session` owns a unique working directory, so concurrent sessions never
//! share file names. Every action is a discrete transition; a failed action
//! leaves the session in `Failed` and returns the error unchanged.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    core::{
        audio::{read_audio, write_audio},
        mixer,
    },
    error::{MixError, Result},
    external::{Codec, DemucsCli, FfmpegCodec, NativeCodec, StemSeparator, Transcriber, WhisperCli},
    io::progress::{emit_progress, emit_stage, SessionProgress},
    types::{AudioData, GainMap, OutputFormat, SessionOptions, StemLabel, StemSet},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Uploaded,
    Separating,
    Separated,
    Mixing,
    Transcribing,
    Done,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Uploaded => "uploaded",
            SessionState::Separating => "separating",
            SessionState::Separated => "separated",
            SessionState::Mixing => "mixing",
            SessionState::Transcribing => "transcribing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Separating | SessionState::Mixing | SessionState::Transcribing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Lyrics {
    pub text: String,
    pub path: PathBuf,
}

pub struct Session {
    options: SessionOptions,
    separator: Box<dyn StemSeparator>,
    transcriber: Box<dyn Transcriber>,
    codec: Box<dyn Codec>,
    work: TempDir,
    state: SessionState,
    input: Option<PathBuf>,
    stems: StemSet,
    renders: u32,
    last_error: Option<String>,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        separator: Box<dyn StemSeparator>,
        transcriber: Box<dyn Transcriber>,
        codec: Box<dyn Codec>,
    ) -> Result<Self> {
        fs::create_dir_all(&options.work_root)?;
        let work = tempfile::Builder::new()
            .prefix("stem-mixer-")
            .keep(options.keep_work_dir)
            .tempdir_in(&options.work_root)?;
        info!("New session in {}", work.path().display());

        Ok(Self {
            options,
            separator,
            transcriber,
            codec,
            work,
            state: SessionState::Idle,
            input: None,
            stems: StemSet::new(),
            renders: 0,
            last_error: None,
        })
    }

    /// Session wired to Demucs, Whisper and ffmpeg (or the native codec).
    pub fn from_options(options: SessionOptions) -> Result<Self> {
        let separator = DemucsCli::new(&options.python, &options.separation_model);
        let transcriber = WhisperCli::new(&options.python, &options.transcription_model);
        let codec: Box<dyn Codec> = match &options.ffmpeg {
            Some(ffmpeg) => Box::new(FfmpegCodec::new(ffmpeg)),
            None => Box::new(NativeCodec),
        };
        Self::new(options, Box::new(separator), Box::new(transcriber), codec)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn stems(&self) -> &StemSet {
        &self.stems
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Take ownership of the user's file as `<work>/input.wav`.
    pub fn upload<P: AsRef<Path>>(&mut self, path: P) -> Result<&Path> {
        let path = path.as_ref();
        self.ensure_idle_for("upload")?;
        if !path.is_file() {
            return Err(MixError::InputMissing(format!(
                "{} does not exist",
                path.display()
            )));
        }

        emit_stage("upload");
        let dst = self.work.path().join("input.wav");
        let incoming = self.work.path().join("incoming.wav");
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

        let stored = if is_wav {
            fs::copy(path, &incoming).map(|_| ()).map_err(MixError::from)
        } else {
            emit_stage("convert");
            self.codec.convert(path, &incoming)
        }
        .and_then(|()| fs::rename(&incoming, &dst).map_err(MixError::from));

        // The previous track is gone either way.
        self.input = None;
        self.stems.clear();
        if let Err(e) = stored {
            if let Err(rm) = fs::remove_file(&incoming) {
                debug!("No partial upload to remove at {}: {}", incoming.display(), rm);
            }
            return Err(self.fail(e));
        }

        self.input = Some(dst);
        self.transition(SessionState::Uploaded);
        emit_progress(SessionProgress::Finished);
        Ok(self.input.as_deref().unwrap_or(self.work.path()))
    }

    /// Run the separator and load its stems.
    pub fn separate(&mut self) -> Result<&StemSet> {
        let input = self.require_input("separate")?;
        self.transition(SessionState::Separating);
        emit_stage("separate");

        let out_dir = self.work.path().join("separated");
        let loaded = self
            .separator
            .separate(&input, &out_dir)
            .and_then(|paths| {
                emit_stage("load_stems");
                let mut stems = StemSet::new();
                for (label, p) in &paths.paths {
                    let audio = read_audio(p).map_err(|e| {
                        MixError::SeparationFailure(format!("unreadable {label} stem: {e:#}"))
                    })?;
                    stems.insert(*label, audio);
                }
                Ok(stems)
            });

        match loaded {
            Ok(stems) => {
                info!(
                    "Loaded {} stems: {:?}",
                    stems.len(),
                    stems.keys().map(StemLabel::as_str).collect::<Vec<_>>()
                );
                self.stems = stems;
                self.transition(SessionState::Separated);
                emit_progress(SessionProgress::Finished);
                Ok(&self.stems)
            }
            Err(e) => {
                self.stems.clear();
                Err(self.fail(e))
            }
        }
    }

    /// Render a remix with the given gains.
    pub fn preview(&mut self, gains: &GainMap) -> Result<PathBuf> {
        self.render("mix", gains, false)
    }

    /// Render the remix with vocals silenced.
    pub fn karaoke(&mut self, gains: &GainMap) -> Result<PathBuf> {
        self.render("karaoke", gains, true)
    }

    /// Run the transcriber on the uploaded track and save `lyrics.txt`.
    pub fn transcribe(&mut self) -> Result<Lyrics> {
        let input = self.require_input("transcribe")?;
        self.require_state(
            "transcribe",
            &[SessionState::Uploaded, SessionState::Separated, SessionState::Done],
        )?;
        self.transition(SessionState::Transcribing);
        emit_stage("transcribe");

        let path = self.work.path().join("lyrics.txt");
        let result = self.transcriber.transcribe(&input).and_then(|text| {
            fs::write(&path, &text)?;
            Ok(text)
        });

        match result {
            Ok(text) => {
                self.transition(SessionState::Done);
                emit_progress(SessionProgress::Finished);
                Ok(Lyrics { text, path })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn render(&mut self, kind: &'static str, gains: &GainMap, karaoke: bool) -> Result<PathBuf> {
        self.require_state(kind, &[SessionState::Separated, SessionState::Done])?;
        if self.stems.is_empty() {
            return Err(MixError::InvalidTransition {
                action: kind,
                state: self.state.as_str(),
            });
        }

        let format = self.options.output_format;
        if !self.codec.can_write(format.extension()) {
            return Err(MixError::Config(format!(
                "{} output needs ffmpeg; set `ffmpeg` or STEM_MIXER_FFMPEG",
                format.extension()
            )));
        }

        self.transition(SessionState::Mixing);
        emit_stage("mix");

        self.renders += 1;
        let base = self.work.path().join(format!("{kind}-{}", self.renders));
        let opts = self.options.mix_options();

        let mixed = if karaoke {
            mixer::karaoke_with(&self.stems, gains, &opts)
        } else {
            mixer::mix_with(&self.stems, gains, &Default::default(), &opts)
        };

        match mixed.and_then(|audio| self.encode(&audio, &base, format)) {
            Ok(path) => {
                info!("Rendered {}", path.display());
                self.transition(SessionState::Done);
                emit_progress(SessionProgress::Finished);
                Ok(path)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn encode(&self, audio: &AudioData, base: &Path, format: OutputFormat) -> Result<PathBuf> {
        emit_stage("encode");
        let wav = base.with_extension("wav");
        write_audio(&wav, audio)?;
        if format == OutputFormat::Wav {
            return Ok(wav);
        }

        let out = base.with_extension(format.extension());
        self.codec.convert(&wav, &out)?;
        if let Err(e) = fs::remove_file(&wav) {
            debug!("Could not remove intermediate {}: {}", wav.display(), e);
        }
        Ok(out)
    }

    fn ensure_idle_for(&self, action: &'static str) -> Result<()> {
        if self.state.is_busy() {
            return Err(MixError::InvalidTransition {
                action,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn require_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<()> {
        if !allowed.contains(&self.state) {
            return Err(MixError::InvalidTransition {
                action,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn require_input(&self, action: &'static str) -> Result<PathBuf> {
        self.ensure_idle_for(action)?;
        self.input
            .clone()
            .ok_or_else(|| MixError::InputMissing("upload a track first".into()))
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: MixError) -> MixError {
        warn!("Session failed: {}", err);
        self.last_error = Some(err.to_string());
        self.transition(SessionState::Failed);
        err
    }
}
