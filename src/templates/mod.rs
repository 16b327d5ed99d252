// templates.rs
//
// ARM template generation.
//
// `generate` replaces the per-product template scripts: every job in the
// tool config names a base template, the scripts to embed and where the
// result goes. Jobs run in config order, then the optional marketplace
// package is built, then outputs with a `final_path` are moved there.

pub mod arm;
pub mod cloud_config;
pub mod marketplace;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::files;
use crate::utils::global_config::{TemplateJob, ToolConfig};
use crate::utils::replace;

/// Expands environment variables in a user-given output directory
pub fn output_dir_from(arg: Option<&str>) -> Result<PathBuf> {
    match arg {
        Some(dir) => Ok(PathBuf::from(replace::expand_env_vars(dir))),
        None => Ok(std::env::current_dir()?),
    }
}

/// `dataingestor-azuredeploy.json` -> `dataingestor-azuredeploy.parameters.json`
pub fn parameters_file_name(output: &Path) -> PathBuf {
    let stem = output.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    output.with_file_name(format!("{}{}", stem, paths::PARAMETERS_SUFFIX))
}

fn selected<'a>(config: &'a ToolConfig, only: Option<&str>) -> Result<Vec<&'a TemplateJob>> {
    match only {
        Some(name) => {
            let job = config.templates.iter().find(|j| j.name == name).ok_or_else(|| Error::UnknownTemplate(name.to_string()))?;
            Ok(vec![job])
        }
        None => Ok(config.templates.iter().collect()),
    }
}

/// Builds one job into `output_dir`, returning the files written
pub fn generate_one(job: &TemplateJob, config: &ToolConfig, output_dir: &Path) -> Result<Vec<PathBuf>> {
    tracing::info!("generating template {} from {}", job.name, job.base_template.display());
    let mut written = Vec::with_capacity(2);

    let template = arm::process_base_template(job, config)?;
    let output = files::resolve(output_dir, &job.output);
    fs::write(&output, template).map_err(Error::path(&output))?;
    written.push(output.clone());

    if let Some(params) = &job.parameters_template {
        let target = parameters_file_name(&output);
        files::copy_file(&config.resolve(params), &target)?;
        written.push(target);
    }
    Ok(written)
}

/// Generated files are picked up from `output_dir`, hand-written ones
/// (such as `createUiDefinition.json`) from next to the config
fn marketplace_input(config: &ToolConfig, output_dir: &Path, file: &Path) -> PathBuf {
    let generated = files::resolve(output_dir, file);
    if generated.exists() {
        generated
    } else {
        config.resolve(file)
    }
}

/// Runs all jobs (or only the one named) and returns every path produced, in order
pub fn generate(config: &ToolConfig, output_dir: &Path, only: Option<&str>) -> Result<Vec<PathBuf>> {
    let jobs = selected(config, only)?;
    if jobs.is_empty() {
        tracing::warn!("no templates configured, nothing to generate");
        return Ok(Vec::new());
    }
    files::ensure_dir(output_dir)?;

    let mut produced = Vec::new();
    for job in &jobs {
        produced.extend(generate_one(job, config, output_dir)?);
    }

    if let Some(mp) = &config.marketplace {
        let inputs: Vec<PathBuf> = mp.files.iter().map(|f| marketplace_input(config, output_dir, f)).collect();
        let archive = files::resolve(output_dir, &mp.archive);
        marketplace::package(&inputs, &archive)?;
        produced.push(archive);
    }

    for job in &jobs {
        if let Some(final_path) = &job.final_path {
            let from = files::resolve(output_dir, &job.output);
            let to = files::resolve(output_dir, final_path);
            tracing::info!("moving {} to {}", from.display(), to.display());
            files::move_file(&from, &to)?;
            if let Some(slot) = produced.iter_mut().find(|p| **p == from) {
                *slot = to;
            }
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "{\"variables\": {\"customData\": \"#clusterCustomDataInstallYaml\"}}";
    const WS_BASE: &str = "{\"variables\": {\"customData\": \"#clusterCustomData\"}}";

    const CONFIG: &str = r##"
templates:
  - name: vfxt
    output: mainTemplate.json
    install_script: installvfxt.sh
    additional_files: [enablecloudtrace.sh]
    final_path: ../azuredeploy-auto.json
  - name: dataingestor
    output: dataingestor-azuredeploy.json
    install_script: installdataingestor.sh
    parameters_template: base-template.parameters.json
  - name: workstation
    base_template: workstation/base-template.json
    payload: raw-script
    output: workstation-azuredeploy.json
    install_script: workstation/setupmachine.ps1
marketplace:
  files: [mainTemplate.json, createUiDefinition.json]
"##;

    fn project() -> (tempfile::TempDir, ToolConfig) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("workstation")).unwrap();
        fs::write(src.join("base-template.json"), BASE).unwrap();
        fs::write(src.join("base-template.parameters.json"), "{\"parameters\": {}}").unwrap();
        fs::write(src.join("workstation/base-template.json"), WS_BASE).unwrap();
        fs::write(src.join("workstation/setupmachine.ps1"), "Write-Host \"setup\"\r\n").unwrap();
        for script in &["installvfxt.sh", "enablecloudtrace.sh", "installdataingestor.sh"] {
            fs::write(src.join(script), format!("#!/bin/bash\necho {}\n", script)).unwrap();
        }
        let config_path = src.join("avere-tools.yml");
        fs::write(&config_path, CONFIG).unwrap();
        let config = ToolConfig::load(&config_path).unwrap();
        (dir, config)
    }

    #[test]
    fn parameters_name_follows_output() {
        assert_eq!(parameters_file_name(Path::new("out/dataingestor-azuredeploy.json")), PathBuf::from("out/dataingestor-azuredeploy.parameters.json"));
    }

    #[test]
    fn output_dir_expands_variables() {
        std::env::set_var("AVERE_TOOLS_TEST_OUT", "/tmp/avere-out");
        assert_eq!(output_dir_from(Some("$AVERE_TOOLS_TEST_OUT/templates")).unwrap(), PathBuf::from("/tmp/avere-out/templates"));
    }

    #[test]
    fn generates_every_job() {
        let (dir, config) = project();
        let out = dir.path().join("build").join("templates");
        // hand-written UI definition, already in place
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("createUiDefinition.json"), "{}").unwrap();

        let produced = generate(&config, &out, None).unwrap();

        let final_main = out.join("../azuredeploy-auto.json");
        assert_eq!(produced[0], final_main);
        assert!(final_main.is_file());
        assert!(!out.join("mainTemplate.json").exists());
        assert!(out.join("dataingestor-azuredeploy.json").is_file());
        assert!(out.join("dataingestor-azuredeploy.parameters.json").is_file());
        assert!(out.join("workstation-azuredeploy.json").is_file());
        assert!(out.join("marketplace.zip").is_file());

        for path in &produced {
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let text = fs::read_to_string(path).unwrap();
                assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok(), "{} is not JSON", path.display());
            }
        }
    }

    #[test]
    fn marketplace_takes_ui_definition_from_config_dir() {
        let (dir, mut config) = project();
        config.templates.retain(|j| j.name == "vfxt");
        config.templates[0].final_path = None;
        fs::write(dir.path().join("src/createUiDefinition.json"), "{\"handler\": \"ui\"}").unwrap();
        let out = dir.path().join("elsewhere");

        generate(&config, &out, None).unwrap();

        let mut archive = zip::ZipArchive::new(fs::File::open(out.join("marketplace.zip")).unwrap()).unwrap();
        let mut ui = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("createUiDefinition.json").unwrap(), &mut ui).unwrap();
        assert_eq!(ui, "{\"handler\": \"ui\"}");
        assert!(archive.by_name("mainTemplate.json").is_ok());
        assert!(!out.join("createUiDefinition.json").exists());
    }

    #[test]
    fn only_runs_the_named_job() {
        let (dir, mut config) = project();
        config.marketplace = None;
        let out = dir.path().join("only");
        let produced = generate(&config, &out, Some("workstation")).unwrap();
        assert_eq!(produced, vec![out.join("workstation-azuredeploy.json")]);
    }

    #[test]
    fn unknown_job_is_an_error() {
        let (dir, config) = project();
        let err = generate(&config, dir.path(), Some("hpc-cache")).unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(ref n) if n == "hpc-cache"));
    }

    #[test]
    fn empty_config_generates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let produced = generate(&ToolConfig::default(), &dir.path().join("x"), None).unwrap();
        assert!(produced.is_empty());
        assert!(!dir.path().join("x").exists());
    }
}
