//! Private working copies of manifests.
//!
//! Instrument software may hold the manifest open while a run is in progress,
//! so decoding always happens on a copy in the scratch directory. A copy with
//! the same file name and size is reused; the copy is removed when the guard
//! drops, including on error paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};

/// Guard owning a scratch copy of a manifest.
#[derive(Debug)]
pub struct ScratchCopy {
    path: PathBuf,
    reused: bool,
}

impl ScratchCopy {
    /// Copy `source` into `scratch_dir`, reusing an existing copy of equal size.
    ///
    /// # Errors
    ///
    /// Returns an error when the scratch directory cannot be created or the
    /// manifest cannot be read or copied.
    pub fn create(scratch_dir: &Path, source: &Path) -> FsOpsResult<Self> {
        let file_name = source.file_name().ok_or_else(|| FsOpsError::InvalidInput {
            field: "manifest_path",
            reason: "missing file name",
            value: Some(source.to_string_lossy().into_owned()),
        })?;
        fs::create_dir_all(scratch_dir)
            .map_err(|err| FsOpsError::io("scratch.create_dir", scratch_dir, err))?;

        let source_len = fs::metadata(source)
            .map_err(|err| FsOpsError::io("scratch.stat_source", source, err))?
            .len();
        let path = scratch_dir.join(file_name);

        let reused = match fs::metadata(&path) {
            Ok(existing) if existing.is_file() && existing.len() == source_len => true,
            Ok(_) => {
                fs::remove_file(&path)
                    .map_err(|err| FsOpsError::io("scratch.remove_stale", &path, err))?;
                false
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(FsOpsError::io("scratch.stat_copy", &path, err)),
        };

        if reused {
            debug!(path = %path.display(), "reusing scratch manifest copy");
        } else {
            fs::copy(source, &path).map_err(|err| FsOpsError::io("scratch.copy", &path, err))?;
            debug!(
                source = %source.display(),
                path = %path.display(),
                "copied manifest to scratch"
            );
        }

        Ok(Self { path, reused })
    }

    /// Location of the scratch copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an existing copy was reused.
    #[must_use]
    pub const fn reused(&self) -> bool {
        self.reused
    }
}

impl Drop for ScratchCopy {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                error = %err,
                path = %self.path.display(),
                "failed to remove scratch manifest copy"
            ),
        }
    }
}
