// encoding.rs
//
// Deterministic gzip + base64 encoding of script files.
//
// The gzip header mtime is pinned to 0 (the Unix epoch) and no file name is
// recorded, so the encoded payload only changes when the input bytes do.
// Generated templates can then be diffed and committed without noise.

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Gzip `content` with a fixed header and return the standard padded base64 of it
pub fn gzip_b64(content: &[u8]) -> Result<String> {
    let compressed = gzip_fixed_mtime(content)?;
    Ok(base64::encode(&compressed))
}

pub fn gzip_b64_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(Error::path(path))?;
    gzip_b64(&content)
}

pub(crate) fn gzip_fixed_mtime(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzBuilder::new().mtime(0).write(Vec::with_capacity(content.len() / 2 + 32), Compression::best());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

/// Reverses `gzip_b64`. Whitespace anywhere in `payload` (line breaks from
/// YAML block scalars, trailing newlines) is ignored.
pub fn decode_gzip_b64(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = base64::decode(&compact)?;

    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut ret = Vec::with_capacity(compressed.len() * 2);
    decoder.read_to_end(&mut ret)?;
    Ok(ret)
}
