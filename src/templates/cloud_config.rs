use std::path::{Path, PathBuf};
use yaml_rust::{Yaml, YamlLoader};

use crate::encoding;
use crate::error::{Error, Result};

const HEADER: &str = "#cloud-config\n\nwrite_files:\n";
const USUAL_BLOCK_SIZE: usize = 128; // the YAML around one base64 payload

/// One `write_files` entry. `path` is the file as named in the config,
/// it lands under the install directory on the VM.
fn write_file_block(b64_gzip: &str, install_dir: &str, path: &str, permissions: &str) -> String {
    format!(
        " -  encoding: gzip\n    content: !!binary |\n        {}\n    path: {}/{}\n    permissions: \"{}\"\n",
        b64_gzip,
        install_dir.trim_end_matches('/'),
        path,
        permissions
    )
}

/// Builds the `#cloud-config` document that unpacks `files` on first boot.
/// `base_dir` is where the files are read from; the names written into the
/// document are the ones given.
pub fn build_write_files(base_dir: &Path, files: &[PathBuf], install_dir: &str, permissions: &str) -> Result<String> {
    let mut encoded = Vec::with_capacity(files.len());
    for file in files {
        let b64 = encoding::gzip_b64_file(crate::utils::files::resolve(base_dir, file))?;
        tracing::debug!("encoded {} ({} base64 characters)", file.display(), b64.len());
        encoded.push((file, b64));
    }

    let mut ret = String::with_capacity(HEADER.len() + encoded.iter().map(|(_, b)| b.len() + USUAL_BLOCK_SIZE).sum::<usize>() + 1);
    ret.push_str(HEADER);
    for (file, b64) in &encoded {
        let name = file.to_string_lossy().replace('\\', "/");
        ret.push_str(&write_file_block(b64, install_dir, &name, permissions));
    }
    ret.push('\n');
    Ok(ret)
}

/// Reads a generated document back and returns the `path` of each entry.
pub fn verify(document: &str) -> Result<Vec<String>> {
    let docs = YamlLoader::load_from_str(document).map_err(|e| Error::CloudConfig(e.to_string()))?;
    let root = docs.get(0).ok_or_else(|| Error::CloudConfig("empty document".to_string()))?;

    let entries = match &root["write_files"] {
        Yaml::Array(entries) => entries,
        _ => return Err(Error::CloudConfig("no write_files list".to_string())),
    };

    let mut ret = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry["encoding"].as_str() != Some("gzip") || entry["content"].as_str().is_none() {
            return Err(Error::CloudConfig("write_files entry without gzip content".to_string()));
        }
        let path = entry["path"].as_str().ok_or_else(|| Error::CloudConfig("write_files entry without path".to_string()))?;
        ret.push(path.to_string());
    }
    Ok(ret)
}
