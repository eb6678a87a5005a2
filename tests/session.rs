use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use approx::assert_abs_diff_eq;
use stem_mixer_core::{
    external::{NativeCodec, StemSeparator, Transcriber},
    read_audio, set_progress_callback, write_audio, AudioData, Gain, GainMap, MixError,
    OutputFormat, Session, SessionOptions, SessionProgress, SessionState, StemLabel, StemPaths,
};
use tempfile::{tempdir, TempDir};

/// Writes constant-level stems instead of running a model.
struct FakeSeparator {
    levels: Vec<(StemLabel, f32)>,
}

impl StemSeparator for FakeSeparator {
    fn separate(&self, input: &Path, output_dir: &Path) -> stem_mixer_core::Result<StemPaths> {
        let src = read_audio(input)?;
        let dir = output_dir.join("fake").join("input");
        fs::create_dir_all(&dir)?;

        let mut paths = BTreeMap::new();
        for (label, level) in &self.levels {
            let stem = AudioData {
                samples: vec![*level; src.samples.len()],
                ..src.clone()
            };
            let p = dir.join(label.file_name());
            write_audio(&p, &stem)?;
            paths.insert(*label, p);
        }
        Ok(StemPaths { paths })
    }
}

struct NoStems;

impl StemSeparator for NoStems {
    fn separate(&self, _input: &Path, _output_dir: &Path) -> stem_mixer_core::Result<StemPaths> {
        Err(MixError::SeparationFailure("output directory missing".into()))
    }
}

struct FakeTranscriber(&'static str);

impl Transcriber for FakeTranscriber {
    fn transcribe(&self, _input: &Path) -> stem_mixer_core::Result<String> {
        if self.0.is_empty() {
            return Err(MixError::TranscriptionFailure("model returned no text".into()));
        }
        Ok(self.0.to_string())
    }
}

fn input_wav(dir: &Path) -> PathBuf {
    let p = dir.join("song.wav");
    write_audio(&p, &AudioData::silence(4410, 44_100, 2)).unwrap();
    p
}

fn session(root: &TempDir, separator: Box<dyn StemSeparator>, lyrics: &'static str) -> Session {
    let options = SessionOptions {
        work_root: root.path().join("work"),
        ..SessionOptions::default()
    };
    Session::new(
        options,
        separator,
        Box::new(FakeTranscriber(lyrics)),
        Box::new(NativeCodec),
    )
    .unwrap()
}

fn four_levels() -> Box<FakeSeparator> {
    Box::new(FakeSeparator {
        levels: vec![
            (StemLabel::Vocals, 0.25),
            (StemLabel::Drums, 0.125),
            (StemLabel::Bass, 0.125),
            (StemLabel::Other, 0.0625),
        ],
    })
}

#[test]
fn full_run_writes_distinct_outputs() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "la la la");
    assert_eq!(s.state(), SessionState::Idle);

    s.upload(&input).unwrap();
    assert_eq!(s.state(), SessionState::Uploaded);

    let stems = s.separate().unwrap();
    assert_eq!(stems.len(), 4);
    assert_eq!(s.state(), SessionState::Separated);

    let gains = GainMap::from([(StemLabel::Drums, Gain::Decibels(-100.0))]);
    let preview = s.preview(&gains).unwrap();
    let karaoke = s.karaoke(&gains).unwrap();
    assert_ne!(preview, karaoke);
    assert_eq!(s.state(), SessionState::Done);

    let mixed = read_audio(&preview).unwrap();
    assert_abs_diff_eq!(mixed.samples[100], 0.25 + 0.125 + 0.0625, epsilon = 1e-3);
    let k = read_audio(&karaoke).unwrap();
    assert_abs_diff_eq!(k.samples[100], 0.125 + 0.0625, epsilon = 1e-3);

    let lyrics = s.transcribe().unwrap();
    assert_eq!(lyrics.text, "la la la");
    assert_eq!(fs::read_to_string(&lyrics.path).unwrap(), "la la la");
    assert!(lyrics.path.starts_with(s.work_dir()));
}

#[test]
fn repeated_previews_never_overwrite() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();
    s.separate().unwrap();

    let a = s.preview(&GainMap::new()).unwrap();
    let b = s.preview(&GainMap::new()).unwrap();
    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
}

#[test]
fn sessions_use_separate_work_dirs() {
    let root = tempdir().unwrap();
    let a = session(&root, four_levels(), "x");
    let b = session(&root, four_levels(), "x");
    assert_ne!(a.work_dir(), b.work_dir());
}

#[test]
fn missing_upload_is_input_missing() {
    let root = tempdir().unwrap();
    let mut s = session(&root, four_levels(), "x");

    let err = s.upload(root.path().join("absent.mp3")).unwrap_err();
    assert!(matches!(err, MixError::InputMissing(_)));
    assert_eq!(s.state(), SessionState::Idle);

    assert!(matches!(s.separate(), Err(MixError::InputMissing(_))));
    assert!(matches!(s.transcribe(), Err(MixError::InputMissing(_))));
}

#[test]
fn mixing_before_separation_is_rejected() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();

    match s.preview(&GainMap::new()) {
        Err(MixError::InvalidTransition { action, state }) => {
            assert_eq!(action, "mix");
            assert_eq!(state, "uploaded");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert_eq!(s.state(), SessionState::Uploaded);
}

#[test]
fn separation_failure_moves_to_failed() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, Box::new(NoStems), "x");
    s.upload(&input).unwrap();

    let err = s.separate().unwrap_err();
    assert!(matches!(err, MixError::SeparationFailure(_)));
    assert!(err.is_external());
    assert_eq!(s.state(), SessionState::Failed);
    assert!(s.last_error().unwrap().contains("output directory missing"));
    assert!(s.stems().is_empty());

    // a new upload recovers the session
    s.upload(&input).unwrap();
    assert_eq!(s.state(), SessionState::Uploaded);
}

#[test]
fn empty_transcript_fails() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "");
    s.upload(&input).unwrap();

    assert!(matches!(
        s.transcribe(),
        Err(MixError::TranscriptionFailure(_))
    ));
    assert_eq!(s.state(), SessionState::Failed);
}

#[test]
fn bad_gain_fails_the_mix_until_stems_are_reloaded() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();
    s.separate().unwrap();

    let bad = GainMap::from([(StemLabel::Bass, Gain::Linear(5.0))]);
    assert!(matches!(s.preview(&bad), Err(MixError::InvalidGain { .. })));
    assert_eq!(s.state(), SessionState::Failed);

    assert!(matches!(
        s.preview(&GainMap::new()),
        Err(MixError::InvalidTransition { .. })
    ));

    s.separate().unwrap();
    assert!(s.preview(&GainMap::new()).is_ok());
    assert_eq!(s.state(), SessionState::Done);
}

#[test]
fn failed_upload_discards_the_previous_track() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();
    s.separate().unwrap();
    s.preview(&GainMap::new()).unwrap();

    let junk = root.path().join("broken.mp3");
    fs::write(&junk, b"definitely not an mp3 stream").unwrap();
    let err = s.upload(&junk).unwrap_err();
    assert!(matches!(err, MixError::ConversionFailure { .. }));
    assert_eq!(s.state(), SessionState::Failed);
    assert!(s.input().is_none());
    assert!(s.stems().is_empty());
    assert!(!s.work_dir().join("input.wav").exists());
    assert!(!s.work_dir().join("incoming.wav").exists());

    assert!(matches!(
        s.preview(&GainMap::new()),
        Err(MixError::InvalidTransition { .. })
    ));
    assert!(matches!(
        s.karaoke(&GainMap::new()),
        Err(MixError::InvalidTransition { .. })
    ));
    assert!(matches!(s.separate(), Err(MixError::InputMissing(_))));
    assert!(matches!(s.transcribe(), Err(MixError::InputMissing(_))));
    assert_eq!(s.state(), SessionState::Failed);

    s.upload(&input).unwrap();
    assert_eq!(s.state(), SessionState::Uploaded);
}

#[test]
fn transcribe_is_rejected_after_a_failure() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();
    s.separate().unwrap();
    assert!(s.preview(&GainMap::from([(StemLabel::Bass, Gain::Linear(9.0))])).is_err());

    match s.transcribe() {
        Err(MixError::InvalidTransition { action, state }) => {
            assert_eq!(action, "transcribe");
            assert_eq!(state, "failed");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[test]
fn mp3_output_needs_an_encoder() {
    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let options = SessionOptions {
        work_root: root.path().join("work"),
        output_format: OutputFormat::Mp3,
        ..SessionOptions::default()
    };
    let mut s = Session::new(
        options,
        four_levels(),
        Box::new(FakeTranscriber("x")),
        Box::new(NativeCodec),
    )
    .unwrap();
    s.upload(&input).unwrap();
    s.separate().unwrap();

    assert!(matches!(s.preview(&GainMap::new()), Err(MixError::Config(_))));
}

#[test]
fn progress_reports_stages() {
    let seen: Arc<Mutex<Vec<SessionProgress>>> = Arc::default();
    let sink = Arc::clone(&seen);
    set_progress_callback(move |p| sink.lock().unwrap().push(p));

    let root = tempdir().unwrap();
    let input = input_wav(root.path());
    let mut s = session(&root, four_levels(), "x");
    s.upload(&input).unwrap();
    s.separate().unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.contains(&SessionProgress::Stage("separate")));
    assert!(seen.contains(&SessionProgress::Stage("load_stems")));
    assert!(seen.contains(&SessionProgress::Finished));
}

#[test]
fn options_load_from_json() {
    let root = tempdir().unwrap();
    let path = root.path().join("options.json");
    fs::write(
        &path,
        r#"{ "separation_model": "htdemucs_ft", "output_format": "mp3", "clip": false }"#,
    )
    .unwrap();

    let opts = SessionOptions::from_json_file(&path).unwrap();
    assert_eq!(opts.separation_model, "htdemucs_ft");
    assert_eq!(opts.output_format, OutputFormat::Mp3);
    assert!(!opts.clip);
    assert_eq!(opts.transcription_model, "large");
}
