// arm.rs
//
// Embedding encoded install scripts into ARM templates.
//
// A base template is not a usable ARM template on its own: one of its
// string values holds a sentinel token (for example
// `"customData": "[base64('#clusterCustomDataInstallYaml')]"`) that is
// replaced by the encoded payload. Because the payload lands inside a JSON
// string it is first flattened to a single escaped line. The spliced text
// must parse as JSON; if it does not, it is saved next to the base template
// with an `.err` suffix so the breakage can be inspected.

use std::fs;
use std::path::Path;

use crate::encoding;
use crate::error::{Error, Result};
use crate::templates::cloud_config;
use crate::utils::files;
use crate::utils::global_config::{PayloadKind, TemplateJob, ToolConfig};
use crate::utils::replace::{self, ReplaceFailPolicy};

/// Turns a multi-line payload into something that can sit inside a JSON string literal
pub fn escape_for_json_line(payload: &str) -> String {
    let mut ret = String::with_capacity(payload.len() + payload.len() / 16);
    for chr in payload.chars() {
        match chr {
            '\\' => ret.push_str("\\\\"),
            '\n' => ret.push_str("\\n"),
            '"' => ret.push_str("\\\""),
            _ => ret.push(chr),
        }
    }
    ret
}

/// Builds the payload a job asks for, unescaped
pub fn build_payload(job: &TemplateJob, config: &ToolConfig) -> Result<String> {
    match job.payload {
        PayloadKind::CloudConfig => {
            let mut all_files = Vec::with_capacity(1 + job.additional_files.len());
            all_files.push(job.install_script.clone());
            all_files.extend(job.additional_files.iter().cloned());
            let document = cloud_config::build_write_files(&config.base_dir, &all_files, &config.install_dir, &config.permissions)?;
            for path in cloud_config::verify(&document)? {
                tracing::debug!("template {} writes {}", job.name, path);
            }
            Ok(document)
        }
        PayloadKind::RawScript => {
            if !job.additional_files.is_empty() {
                tracing::warn!("template {}: additional_files are ignored for raw-script payloads", job.name);
            }
            encoding::gzip_b64_file(config.resolve(&job.install_script))
        }
    }
}

/// Splices `payload` into `template_text` at `token` and checks the result is JSON.
/// `template_path` names the base template for diagnostics and the `.err` dump.
pub fn embed(template_text: &str, template_path: &Path, token: &str, payload: &str, fail_policy: ReplaceFailPolicy) -> Result<String> {
    let escaped = escape_for_json_line(payload);
    let spliced = replace::splice(template_text, token, &escaped, fail_policy, template_path)?;
    validate_or_dump(spliced, template_path)
}

fn validate_or_dump(text: String, template_path: &Path) -> Result<String> {
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(_) => Ok(text),
        Err(source) => {
            tracing::error!("{}", source);
            let err_path = files::err_path_for(template_path);
            fs::write(&err_path, &text).map_err(Error::path(&err_path))?;
            tracing::error!("invalid ARM template saved to: {}", err_path.display());
            Err(Error::InvalidTemplate { path: template_path.to_path_buf(), err_path, source })
        }
    }
}

/// Loads the job's base template and returns it with the payload injected
pub fn process_base_template(job: &TemplateJob, config: &ToolConfig) -> Result<String> {
    let template_path = config.resolve(&job.base_template);
    let template_text = fs::read_to_string(&template_path).map_err(Error::path(&template_path))?;

    let payload = build_payload(job, config)?;
    embed(&template_text, &template_path, job.token(), &payload, job.on_missing_token)
}
