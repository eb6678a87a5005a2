//! Adapters for the programs that do the heavy lifting: the separation model,
//! the speech-to-text model and the audio codec.

mod codec;
mod separator;
mod transcriber;

use std::{path::Path, process::Command};

pub use codec::{Codec, FfmpegCodec, NativeCodec};
pub use separator::{DemucsCli, StemSeparator};
pub use transcriber::{Transcriber, WhisperCli};

/// Run `cmd` to completion. On failure returns a one-line reason built from
/// the exit status and the tail of stderr.
pub(crate) fn run_command(cmd: &mut Command) -> std::result::Result<(), String> {
    tracing::debug!("Running {:?}", cmd);
    let output = cmd
        .output()
        .map_err(|e| format!("could not start {:?}: {e}", cmd.get_program()))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    Err(format!("{:?} exited with {}: {}", cmd.get_program(), output.status, tail))
}

/// File stem of `path`, used by tools that name their outputs after the input.
pub(crate) fn track_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string()
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::{
        fs,
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
        sync::{Mutex, MutexGuard},
    };

    static EXEC_LOCK: Mutex<()> = Mutex::new(());

    /// Held while a script is written and run, so no child is forked while
    /// another thread still has a script open for writing (ETXTBSY).
    pub fn exec_lock() -> MutexGuard<'static, ()> {
        EXEC_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        p
    }
}
