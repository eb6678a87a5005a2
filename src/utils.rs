use std::{env, path::PathBuf};

pub const TMP_DIR_VAR: &str = "STEM_MIXER_TMP_DIR";
pub const PYTHON_VAR: &str = "STEM_MIXER_PYTHON";
pub const FFMPEG_VAR: &str = "STEM_MIXER_FFMPEG";

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn tmp_dir() -> Option<PathBuf> {
    non_empty_var(TMP_DIR_VAR).map(PathBuf::from)
}

pub fn python_bin() -> Option<String> {
    non_empty_var(PYTHON_VAR)
}

pub fn ffmpeg_bin() -> Option<String> {
    non_empty_var(FFMPEG_VAR)
}
