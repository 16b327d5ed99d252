// Default file names, tokens and locations

pub const TOOL_CONFIG: &str = "avere-tools.yml";
pub const BASE_TEMPLATE: &str = "base-template.json";
pub const ERR_SUFFIX: &str = "err";
pub const PARAMETERS_SUFFIX: &str = ".parameters.json";
pub const MARKETPLACE_ARCHIVE: &str = "marketplace.zip";

/// Token replaced by a whole `#cloud-config` document
pub const CLOUD_CONFIG_TOKEN: &str = "#clusterCustomDataInstallYaml";
/// Token replaced by a single gzip+base64 script (Windows workstation templates)
pub const RAW_SCRIPT_TOKEN: &str = "#clusterCustomData";

pub const INSTALL_DIR: &str = "/opt/avere";
pub const INSTALL_PERMISSIONS: &str = "0744";

pub const DEPLOYMENT_PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentParameters.json#";
