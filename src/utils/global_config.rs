// global_config.rs
//
// The tool configuration, read from avere-tools.yml. It describes which
// ARM templates `generate` builds and the defaults used by `prime`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::replace::ReplaceFailPolicy;

#[derive(Deserialize, Debug, Clone)]
pub struct ToolConfig {
    #[serde(default = "use_default_install_dir")]
    pub install_dir: String,
    #[serde(default = "use_default_permissions")]
    pub permissions: String,
    #[serde(default)]
    pub templates: Vec<TemplateJob>,
    #[serde(default)]
    pub marketplace: Option<MarketplaceConfig>,
    #[serde(default)]
    pub prime: PrimeConfig,

    /// Directory the config was loaded from; relative inputs resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            install_dir: use_default_install_dir(),
            permissions: use_default_permissions(),
            templates: Vec::new(),
            marketplace: None,
            prime: PrimeConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

/// How the install scripts end up in the template
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// A `#cloud-config` document with one `write_files` entry per script
    CloudConfig,
    /// The bare gzip+base64 of the install script
    RawScript,
}

impl Default for PayloadKind {
    fn default() -> Self {
        PayloadKind::CloudConfig
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TemplateJob {
    pub name: String,
    #[serde(default = "use_default_base_template")]
    pub base_template: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub payload: PayloadKind,
    /// Defaults to the token matching `payload`
    #[serde(default)]
    pub token: Option<String>,
    pub install_script: PathBuf,
    #[serde(default)]
    pub additional_files: Vec<PathBuf>,
    #[serde(default)]
    pub parameters_template: Option<PathBuf>,
    #[serde(default)]
    pub final_path: Option<PathBuf>,
    #[serde(default)]
    pub on_missing_token: ReplaceFailPolicy,
}

impl TemplateJob {
    pub fn token(&self) -> &str {
        match (&self.token, self.payload) {
            (Some(t), _) => t,
            (None, PayloadKind::CloudConfig) => paths::CLOUD_CONFIG_TOKEN,
            (None, PayloadKind::RawScript) => paths::RAW_SCRIPT_TOKEN,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MarketplaceConfig {
    #[serde(default = "use_default_archive")]
    pub archive: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrimeConfig {
    #[serde(default = "use_default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub interval_secs: u64,
    #[serde(default = "use_default_skip_directories")]
    pub skip_directories: Vec<String>,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        PrimeConfig {
            workers: use_default_workers(),
            interval_secs: 0,
            skip_directories: use_default_skip_directories(),
        }
    }
}

fn use_default_install_dir() -> String {
    paths::INSTALL_DIR.to_string()
}

fn use_default_permissions() -> String {
    paths::INSTALL_PERMISSIONS.to_string()
}

fn use_default_base_template() -> PathBuf {
    PathBuf::from(paths::BASE_TEMPLATE)
}

fn use_default_archive() -> PathBuf {
    PathBuf::from(paths::MARKETPLACE_ARCHIVE)
}

fn use_default_workers() -> usize {
    10
}

fn use_default_skip_directories() -> Vec<String> {
    vec![".zfs".to_string(), ".snapshot".to_string()]
}

impl ToolConfig {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self> {
        let mut config: ToolConfig = serde_yaml::from_str(text).map_err(|source| Error::ConfigParse { path: path.to_path_buf(), source })?;
        config.base_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        if config.prime.workers == 0 {
            tracing::warn!("prime.workers is 0 in {}, using 1", path.display());
            config.prime.workers = 1;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_yaml(&text, path)
    }

    /// Like `load`, but a missing file yields the defaults. Used by commands
    /// that only read the optional `prime`/install settings.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        crate::utils::files::resolve(&self.base_dir, path)
    }
}
