use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// What to do when a template does not contain the token it is supposed to carry
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceFailPolicy {
    Ignore,
    Warn,
    Fail,
}

impl Default for ReplaceFailPolicy {
    fn default() -> Self {
        ReplaceFailPolicy::Warn
    }
}

/// Replaces every occurrence of `token` in `text` with `payload`.
/// `associated_file` is only used for diagnostics.
pub fn splice(text: &str, token: &str, payload: &str, fail_policy: ReplaceFailPolicy, associated_file: &Path) -> Result<String> {
    let occurrences = text.matches(token).count();
    tracing::debug!("{} occurrence(s) of \"{}\" in {}", occurrences, token, associated_file.display());

    if occurrences == 0 {
        match fail_policy {
            ReplaceFailPolicy::Fail => {
                return Err(Error::MissingToken { token: token.to_string(), path: associated_file.to_path_buf() });
            }
            ReplaceFailPolicy::Warn => {
                tracing::warn!("in text file {}, found no replacement token \"{}\"; leaving it unchanged", associated_file.display(), token);
            }
            ReplaceFailPolicy::Ignore => (),
        }
        return Ok(text.to_string());
    }

    Ok(text.replace(token, payload))
}

lazy_static! {
    static ref ENV_VAR_RE: Regex = Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap();
}

/// Expands `$NAME` and `${NAME}` from `lookup`. Unknown variables are left as they are.
pub fn expand_vars_with<F>(text: &str, lookup: F) -> String
    where F: Fn(&str) -> Option<String> {

    ENV_VAR_RE.replace_all(text, |caps: &Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    }).into_owned()
}

/// `expand_vars_with` against the process environment
pub fn expand_env_vars(text: &str) -> String {
    expand_vars_with(text, |name| std::env::var(name).ok())
}
