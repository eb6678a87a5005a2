use std::{path::Path, process::Command};

use crate::{
    core::audio::{read_audio, write_audio},
    error::{MixError, Result},
};

use super::run_command;

pub trait Codec {
    /// Convert `src` into `dst`; the format follows `dst`'s extension.
    fn convert(&self, src: &Path, dst: &Path) -> Result<()>;

    fn can_write(&self, extension: &str) -> bool;
}

/// Shells out to ffmpeg.
pub struct FfmpegCodec {
    pub ffmpeg: String,
}

impl FfmpegCodec {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Codec for FfmpegCodec {
    fn convert(&self, src: &Path, dst: &Path) -> Result<()> {
        run_command(
            Command::new(&self.ffmpeg)
                .args(["-y", "-loglevel", "error", "-i"])
                .arg(src)
                .arg(dst),
        )
        .map_err(|reason| MixError::conversion(src, dst, reason))?;

        if !dst.is_file() {
            return Err(MixError::conversion(src, dst, "no output file was written"));
        }
        Ok(())
    }

    fn can_write(&self, _extension: &str) -> bool {
        true
    }
}

/// In-process decode with symphonia, WAV output only.
#[derive(Default)]
pub struct NativeCodec;

impl Codec for NativeCodec {
    fn convert(&self, src: &Path, dst: &Path) -> Result<()> {
        let ext = dst
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !self.can_write(ext) {
            return Err(MixError::conversion(
                src,
                dst,
                format!("cannot encode `{ext}` without ffmpeg"),
            ));
        }

        let audio = read_audio(src).map_err(|e| MixError::conversion(src, dst, format!("{e:#}")))?;
        write_audio(dst, &audio).map_err(|e| MixError::conversion(src, dst, format!("{e:#}")))?;
        Ok(())
    }

    fn can_write(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("wav")
    }
}
