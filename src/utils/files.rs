use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use fs_extra::file::{self, CopyOptions};

use crate::error::{Error, Result};
use crate::paths;

/// `base-template.json` -> `base-template.json.err`, next to the original
pub fn err_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(paths::ERR_SUFFIX);
    PathBuf::from(name)
}

/// Creates `dir` (and parents) when missing
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        tracing::info!("creating output directory {}", dir.display());
        fs::create_dir_all(dir).map_err(Error::path(dir))?;
    }
    Ok(())
}

/// Resolves `path` against `base` unless it is already absolute
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn overwrite() -> CopyOptions {
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options
}

pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    file::copy(from, to, &overwrite()).map(|_| ()).map_err(|e| Error::Transfer {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    file::move_file(from, to, &overwrite()).map(|_| ()).map_err(|e| Error::Transfer {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason: e.to_string(),
    })
}
