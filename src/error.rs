// error.rs
//
// Error types shared by every avere-tools command.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // --- Configuration ---

    /// The tool configuration file could not be read.
    #[error("could not read config file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool configuration file is not valid YAML for `ToolConfig`.
    #[error("could not parse config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `generate --only NAME` named a template that the config does not define.
    #[error("no template named '{0}' in the config")]
    UnknownTemplate(String),

    // --- Templates ---

    /// The spliced template is not valid JSON. The broken text was written to `err_path`.
    #[error("template generated from {path} is not valid JSON (saved to {err_path})")]
    InvalidTemplate {
        path: PathBuf,
        err_path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The sentinel token is absent and the job's policy is `fail`.
    #[error("replacement token \"{token}\" not found in {path}")]
    MissingToken { token: String, path: PathBuf },

    /// A generated cloud-config document could not be read back.
    #[error("invalid cloud-config document: {0}")]
    CloudConfig(String),

    /// The payload handed to `decode` is not base64.
    #[error("payload is not valid base64")]
    Base64(#[from] base64::DecodeError),

    /// Marketplace archive creation failed.
    #[error("could not write marketplace archive {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    // --- Misc ---

    /// An address range was not of the form `a.b.c.d-e.f.g.h` with start <= end.
    #[error("invalid IP range '{0}'")]
    InvalidIpRange(String),

    #[error("I/O error on {path}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// fs_extra copy or move failed.
    #[error("could not transfer {from} to {to}: {reason}")]
    Transfer {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an I/O error with the path it concerned.
    pub fn path<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Path { path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
