use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{info, warn};

use super::{run_command, track_name};
use crate::{
    error::{MixError, Result},
    types::{StemLabel, StemPaths},
};

pub trait StemSeparator {
    /// Split `input` into stem files below `output_dir`.
    fn separate(&self, input: &Path, output_dir: &Path) -> Result<StemPaths>;
}

/// Runs Demucs through its Python entry point.
pub struct DemucsCli {
    pub python: String,
    pub model: String,
}

impl DemucsCli {
    pub fn new(python: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            model: model.into(),
        }
    }

    /// Directory Demucs writes a track's stems to.
    pub fn stem_dir(&self, input: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(self.model.as_str()).join(track_name(input))
    }
}

impl StemSeparator for DemucsCli {
    fn separate(&self, input: &Path, output_dir: &Path) -> Result<StemPaths> {
        if output_dir.exists() {
            fs::remove_dir_all(output_dir)?;
        }
        fs::create_dir_all(output_dir)?;

        info!("Separating {} with {}", input.display(), self.model);

        run_command(
            Command::new(&self.python)
                .args(["-m", "demucs", "-n", self.model.as_str(), "--out"])
                .arg(output_dir)
                .arg(input),
        )
        .map_err(MixError::SeparationFailure)?;

        collect_stems(&self.stem_dir(input, output_dir))
    }
}

/// Pick up `{vocals,drums,bass,other}.wav` from `dir`.
pub(crate) fn collect_stems(dir: &Path) -> Result<StemPaths> {
    if !dir.is_dir() {
        return Err(MixError::SeparationFailure(format!(
            "expected output directory {} was not created",
            dir.display()
        )));
    }

    let mut paths = BTreeMap::new();
    for label in StemLabel::ALL {
        let p = dir.join(label.file_name());
        if p.is_file() {
            paths.insert(label, p);
        } else {
            warn!("Separator produced no {} stem in {}", label, dir.display());
        }
    }

    if paths.is_empty() {
        return Err(MixError::SeparationFailure(format!(
            "no stem files found in {}",
            dir.display()
        )));
    }

    Ok(StemPaths { paths })
}
