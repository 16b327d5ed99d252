// deployment.rs
//
// Template deployment descriptors.
//
// A descriptor carries everything needed to submit one ARM template
// deployment (the template, its parameter values, where it goes) so that
// test runs can create it once, save it and pick it up again later.
// Submitting it is left to the Azure tooling.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;

const DEPLOY_ID_PREFIX: &str = "av";
const RESOURCE_GROUP_SUFFIX: &str = "-rg";
const ASCII_LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub const DEFAULT_DEPLOY_NAME: &str = "azurePySDK";
pub const DEFAULT_LOCATION: &str = "westus2";

/// `av` + `%m%dx%H%M%S` (UTC) + one random lowercase letter, e.g. `av0719x134502k`
pub fn generate_deploy_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let letter = ASCII_LOWERCASE.choose(rng).copied().unwrap_or(b'a') as char;
    format!("{}{}{}", DEPLOY_ID_PREFIX, now.format("%m%dx%H%M%S"), letter)
}

pub fn default_resource_group(deploy_id: &str) -> String {
    format!("{}{}", deploy_id, RESOURCE_GROUP_SUFFIX)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeploymentDescriptor {
    pub deploy_id: String,
    pub deploy_name: String,
    pub deploy_params: Map<String, Value>,
    pub location: String,
    pub resource_group: String,
    pub template: Value,
}

impl DeploymentDescriptor {
    /// New descriptor with a fresh deploy id and the default name, location and resource group
    pub fn new(template: Value, deploy_params: Map<String, Value>) -> Self {
        let deploy_id = generate_deploy_id(Utc::now(), &mut rand::thread_rng());
        let resource_group = default_resource_group(&deploy_id);
        DeploymentDescriptor {
            deploy_id,
            deploy_name: DEFAULT_DEPLOY_NAME.to_string(),
            deploy_params,
            location: DEFAULT_LOCATION.to_string(),
            resource_group,
            template,
        }
    }

    /// Overrides the id; the resource group follows unless it was set explicitly
    pub fn with_deploy_id(mut self, deploy_id: &str) -> Self {
        if self.resource_group == default_resource_group(&self.deploy_id) {
            self.resource_group = default_resource_group(deploy_id);
        }
        self.deploy_id = deploy_id.to_string();
        self
    }

    /// The `parameters` body of a deployment: every value wrapped as `{"value": v}`
    pub fn parameters(&self) -> Map<String, Value> {
        self.deploy_params.iter().map(|(k, v)| (k.clone(), json!({ "value": v }))).collect()
    }

    /// A standalone deployment parameters file, as accepted by `az deployment group create --parameters @file`
    pub fn parameters_document(&self) -> Value {
        json!({
            "$schema": paths::DEPLOYMENT_PARAMETERS_SCHEMA,
            "contentVersion": "1.0.0.0",
            "parameters": self.parameters(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        // Value keeps object keys sorted, giving stable output
        Ok(serde_json::to_string_pretty(&serde_json::to_value(self)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?).map_err(Error::path(path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(Error::path(path))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for DeploymentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_json_pretty() {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Reads a JSON object of parameter values; `None` gives an empty set
pub fn load_params(path: Option<&Path>) -> Result<Map<String, Value>> {
    let path = match path {
        Some(p) => p,
        None => return Ok(Map::new()),
    };
    let text = fs::read_to_string(path).map_err(Error::path(path))?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Path {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "parameters must be a JSON object"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;

    fn params() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("adminUsername".to_string(), json!("azureuser"));
        m.insert("vmCount".to_string(), json!(3));
        m
    }

    #[test]
    fn deploy_id_shape() {
        let now = Utc.with_ymd_and_hms(2019, 7, 9, 13, 45, 2).unwrap();
        let id = generate_deploy_id(now, &mut StepRng::new(0, 0));
        assert_eq!(&id[..13], "av0709x134502");
        assert_eq!(id.len(), 14);
        assert!(id.chars().last().unwrap().is_ascii_lowercase());
    }

    #[test]
    fn random_ids_use_lowercase_suffix() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let id = generate_deploy_id(Utc::now(), &mut rng);
            assert!(id.starts_with("av"));
            assert!(id.chars().last().unwrap().is_ascii_lowercase());
        }
    }

    #[test]
    fn defaults_follow_deploy_id() {
        let d = DeploymentDescriptor::new(json!({}), Map::new());
        assert_eq!(d.resource_group, format!("{}-rg", d.deploy_id));
        assert_eq!(d.deploy_name, "azurePySDK");
        assert_eq!(d.location, "westus2");

        let d = d.with_deploy_id("avtest");
        assert_eq!(d.resource_group, "avtest-rg");

        let mut d = d;
        d.resource_group = "shared-rg".to_string();
        let d = d.with_deploy_id("avother");
        assert_eq!(d.resource_group, "shared-rg");
    }

    #[test]
    fn parameters_are_wrapped_in_value() {
        let d = DeploymentDescriptor::new(json!({}), params());
        let doc = d.parameters_document();
        assert_eq!(doc["contentVersion"], "1.0.0.0");
        assert_eq!(doc["parameters"]["adminUsername"], json!({ "value": "azureuser" }));
        assert_eq!(doc["parameters"]["vmCount"]["value"], 3);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        let d = DeploymentDescriptor::new(json!({"resources": []}), params()).with_deploy_id("av0101x000000a");
        d.save(&path).unwrap();

        let loaded = DeploymentDescriptor::load(&path).unwrap();
        assert_eq!(loaded, d);
        assert!(d.to_string().contains("\"resource_group\": \"av0101x000000a-rg\""));
    }

    #[test]
    fn params_file_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(load_params(Some(&path)).is_err());
        fs::write(&path, "{\"location\": \"eastus\"}").unwrap();
        assert_eq!(load_params(Some(&path)).unwrap()["location"], "eastus");
        assert!(load_params(None).unwrap().is_empty());
    }
}
