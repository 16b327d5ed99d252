use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{Error, Result};

/// Zips `files` flat (entries are base names) into `archive`.
/// Entry timestamps are pinned to the zip epoch so the archive only changes with its inputs.
pub fn package(files: &[PathBuf], archive: &Path) -> Result<()> {
    let zip_err = |source| Error::Archive { path: archive.to_path_buf(), source };

    let out = File::create(archive).map_err(Error::path(archive))?;
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for file in files {
        let name = entry_name(file)?;
        let content = fs::read(file).map_err(Error::path(file))?;
        tracing::debug!("adding {} ({} bytes) to {}", name, content.len(), archive.display());
        zip.start_file(name, options).map_err(zip_err)?;
        zip.write_all(&content).map_err(Error::path(archive))?;
    }
    zip.finish().map_err(zip_err)?;

    tracing::info!("marketplace package written to {}", archive.display());
    Ok(())
}

fn entry_name(file: &Path) -> Result<String> {
    file.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::Path {
            path: file.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file name"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn inputs(dir: &Path) -> Vec<PathBuf> {
        let main = dir.join("mainTemplate.json");
        let ui = dir.join("createUiDefinition.json");
        fs::write(&main, "{\"resources\": []}").unwrap();
        fs::write(&ui, "{\"handler\": \"Microsoft.Azure.CreateUIDef\"}").unwrap();
        vec![main, ui]
    }

    #[test]
    fn archive_holds_flat_entries() {
        let dir = tempfile::tempdir().unwrap();
        let files = inputs(dir.path());
        let archive = dir.path().join("marketplace.zip");
        package(&files, &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut entry = zip.by_name("mainTemplate.json").unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        assert_eq!(text, "{\"resources\": []}");
    }

    #[test]
    fn repackaging_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let files = inputs(dir.path());
        let a = dir.path().join("a.zip");
        let b = dir.path().join("b.zip");
        package(&files, &a).unwrap();
        package(&files, &b).unwrap();
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = package(&[dir.path().join("createUiDefinition.json")], &dir.path().join("m.zip")).unwrap_err();
        assert!(matches!(err, Error::Path { .. }));
    }
}
