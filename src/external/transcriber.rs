use std::{fs, path::Path, process::Command};

use tempfile::tempdir;
use tracing::info;

use super::{run_command, track_name};
use crate::error::{MixError, Result};

pub trait Transcriber {
    /// Plain-text transcript of the audio at `input`.
    fn transcribe(&self, input: &Path) -> Result<String>;
}

/// Runs OpenAI Whisper through its Python entry point.
pub struct WhisperCli {
    pub python: String,
    pub model: String,
}

impl WhisperCli {
    pub fn new(python: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            model: model.into(),
        }
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(&self, input: &Path) -> Result<String> {
        let out = tempdir()?;
        info!("Transcribing {} with whisper/{}", input.display(), self.model);

        run_command(
            Command::new(&self.python)
                .args(["-m", "whisper"])
                .arg(input)
                .args(["--model", self.model.as_str(), "--output_format", "txt", "--output_dir"])
                .arg(out.path()),
        )
        .map_err(MixError::TranscriptionFailure)?;

        let txt = out.path().join(format!("{}.txt", track_name(input)));
        let text = fs::read_to_string(&txt).map_err(|e| {
            MixError::TranscriptionFailure(format!("no transcript at {}: {e}", txt.display()))
        })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(MixError::TranscriptionFailure(
                "model returned no text".into(),
            ));
        }
        Ok(text.to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::external::test_support::{exec_lock, script};

    // -m whisper <input> --model <m> --output_format txt --output_dir <dir>
    const WRITE_TXT: &str = r#"[ "$1 $2 $4 $6 $8" = "-m whisper --model --output_format --output_dir" ] || exit 2
printf "$TEXT" > "$9/$(basename "$3" .wav).txt""#;

    fn whisper(dir: &Path, text: &str) -> WhisperCli {
        let body = WRITE_TXT.replace("$TEXT", text);
        let python = script(dir, "python", &body);
        WhisperCli::new(python.to_string_lossy(), "large")
    }

    fn input(dir: &Path) -> std::path::PathBuf {
        let p = dir.join("song.wav");
        fs::write(&p, b"").unwrap();
        p
    }

    #[test]
    fn failing_run_is_a_transcription_failure() {
        let _guard = exec_lock();
        let tmp = tempdir().unwrap();
        let err = WhisperCli::new("false", "large")
            .transcribe(&input(tmp.path()))
            .unwrap_err();
        assert!(matches!(err, MixError::TranscriptionFailure(_)));
    }

    #[test]
    fn missing_transcript_file_is_a_transcription_failure() {
        let _guard = exec_lock();
        let tmp = tempdir().unwrap();
        let python = script(tmp.path(), "python", "exit 0");
        match WhisperCli::new(python.to_string_lossy(), "large").transcribe(&input(tmp.path())) {
            Err(MixError::TranscriptionFailure(msg)) => assert!(msg.contains("no transcript")),
            other => panic!("expected TranscriptionFailure, got {other:?}"),
        }
    }

    #[test]
    fn blank_transcript_is_a_transcription_failure() {
        let _guard = exec_lock();
        let tmp = tempdir().unwrap();
        let err = whisper(tmp.path(), "  \\n")
            .transcribe(&input(tmp.path()))
            .unwrap_err();
        assert!(matches!(err, MixError::TranscriptionFailure(_)));
    }

    #[test]
    fn transcript_text_is_trimmed() {
        let _guard = exec_lock();
        let tmp = tempdir().unwrap();
        let text = whisper(tmp.path(), " hello world\\n")
            .transcribe(&input(tmp.path()))
            .unwrap();
        assert_eq!(text, "hello world");
    }
}
