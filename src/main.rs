//main.rs
//
// avere-tools: builds the ARM templates that deploy Avere vFXT clusters and
// their clients, and a few helpers used around those deployments.

// =========== Libraries =============
#[macro_use]
extern crate lazy_static;

// ========== General Data ===========
#[macro_use]
mod logger;
mod error;
mod paths;
mod utils;

// ============ Artifacts ============
mod encoding;
mod templates;
mod deployment;

// ============ Cluster ==============
mod averecmd;
mod prime;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use utils::global_config::{PayloadKind, TemplateJob, ToolConfig};
use utils::replace::ReplaceFailPolicy;

#[derive(Parser)]
#[command(
    name = "avere-tools",
    about = "ARM template generation and cache priming for Avere vFXT deployments",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the tool config
    #[arg(long, global = true, default_value = paths::TOOL_CONFIG)]
    config: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every ARM template listed in the config
    Generate {
        /// Directory to write template files to (default: current directory)
        #[arg(short = 'o', long = "output-directory")]
        output_directory: Option<String>,

        /// Only build the template with this name
        #[arg(long)]
        only: Option<String>,
    },

    /// Embed scripts into a single base template
    Embed {
        /// Base template holding the token
        #[arg(long)]
        template: PathBuf,

        /// Where to write the result
        #[arg(short, long)]
        output: PathBuf,

        /// Token to replace (default depends on --payload)
        #[arg(long)]
        token: Option<String>,

        #[arg(long, value_enum, default_value = "cloud-config")]
        payload: PayloadChoice,

        #[arg(long, value_enum, default_value = "warn")]
        on_missing_token: PolicyChoice,

        /// Install script first, then any additional files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the gzip+base64 encoding of a file
    Encode { file: PathBuf },

    /// Decode a gzip+base64 payload (file or stdin) to stdout
    Decode { file: Option<PathBuf> },

    /// Read every file below a directory to prime the cache
    Prime {
        /// The directory to walk
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Number of worker threads (default: from config, else 10)
        #[arg(long)]
        workers: Option<usize>,

        /// Seconds between progress lines; 0 disables them
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Template deployment descriptors
    #[command(subcommand)]
    Deployment(DeploymentCommand),

    /// averecmd helpers
    #[command(subcommand)]
    Averecmd(AverecmdCommand),

    /// Expand an address range such as 10.0.0.1-10.0.0.9
    IpRange { range: String },
}

#[derive(Subcommand)]
enum DeploymentCommand {
    /// Create a descriptor for deploying a template
    New {
        /// ARM template to deploy
        template: PathBuf,

        /// JSON object of parameter values
        #[arg(long)]
        params: Option<PathBuf>,

        #[arg(long)]
        deploy_id: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        resource_group: Option<String>,

        /// Write the descriptor here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the ARM parameters document of a saved descriptor
    Parameters {
        descriptor: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AverecmdCommand {
    /// Print the averecmd command line for a method
    Command {
        /// Cluster management IP
        #[arg(long)]
        server: String,

        #[arg(long, env = "AVERE_ADMIN_PW", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = averecmd::DEFAULT_USER)]
        user: String,

        method: String,

        args: Vec<String>,
    },

    /// Convert averecmd output (file or stdin) to JSON
    Parse { file: Option<PathBuf> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PayloadChoice {
    CloudConfig,
    RawScript,
}

impl From<PayloadChoice> for PayloadKind {
    fn from(choice: PayloadChoice) -> Self {
        match choice {
            PayloadChoice::CloudConfig => PayloadKind::CloudConfig,
            PayloadChoice::RawScript => PayloadKind::RawScript,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyChoice {
    Ignore,
    Warn,
    Fail,
}

impl From<PolicyChoice> for ReplaceFailPolicy {
    fn from(choice: PolicyChoice) -> Self {
        match choice {
            PolicyChoice::Ignore => ReplaceFailPolicy::Ignore,
            PolicyChoice::Warn => ReplaceFailPolicy::Warn,
            PolicyChoice::Fail => ReplaceFailPolicy::Fail,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Commands::Generate { output_directory, only } => {
            let config = ToolConfig::load(&cli.config)?;
            run_generate(&config, output_directory.as_deref(), only.as_deref())?;
        }
        Commands::Embed { template, output, token, payload, on_missing_token, files } => {
            let mut config = ToolConfig::load_or_default(&cli.config)?;
            config.base_dir = PathBuf::from(".");
            run_embed(&config, template, output, token, payload.into(), on_missing_token.into(), files)?;
        }
        Commands::Encode { file } => {
            println!("{}", encoding::gzip_b64_file(&file)?);
        }
        Commands::Decode { file } => {
            let payload = read_input(file.as_deref())?;
            let decoded = encoding::decode_gzip_b64(&payload)?;
            std::io::Write::write_all(&mut std::io::stdout(), &decoded)?;
        }
        Commands::Prime { directory, workers, interval } => {
            let config = ToolConfig::load_or_default(&cli.config)?;
            run_prime(&config, directory, workers, interval)?;
        }
        Commands::Deployment(cmd) => run_deployment(cmd)?,
        Commands::Averecmd(cmd) => run_averecmd(cmd)?,
        Commands::IpRange { range } => {
            let range: utils::types::Ipv4Range = range.parse()?;
            tracing::info!("{} addresses in {}", range.len(), range);
            for address in range.addresses() {
                println!("{}", address);
            }
        }
    }
    Ok(())
}

fn run_generate(config: &ToolConfig, output_directory: Option<&str>, only: Option<&str>) -> anyhow::Result<()> {
    let output_dir = templates::output_dir_from(output_directory)?;
    println_with_time!("Generating templates into {}", output_dir.display());
    for path in templates::generate(config, &output_dir, only)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_embed(config: &ToolConfig, template: PathBuf, output: PathBuf, token: Option<String>, payload: PayloadKind, policy: ReplaceFailPolicy, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut files = files.into_iter();
    let install_script = files.next().context("no install script given")?;

    let job = TemplateJob {
        name: "embed".to_string(),
        base_template: template,
        output: output.clone(),
        payload,
        token,
        install_script,
        additional_files: files.collect(),
        parameters_template: None,
        final_path: None,
        on_missing_token: policy,
    };
    let text = templates::arm::process_base_template(&job, config)?;
    std::fs::write(&output, text).with_context(|| format!("could not write {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn run_prime(config: &ToolConfig, directory: PathBuf, workers: Option<usize>, interval: Option<u64>) -> anyhow::Result<()> {
    let options = prime::PrimeOptions {
        workers: workers.unwrap_or(config.prime.workers).max(1),
        interval: Some(interval.unwrap_or(config.prime.interval_secs)).filter(|s| *s > 0).map(Duration::from_secs),
        skip_directories: config.prime.skip_directories.clone(),
        directory,
    };

    println_with_time!("Walking {} (using {} workers)", options.directory.display(), options.workers);
    let stats = prime::prime(&options, |so_far| {
        println_with_time!("primed {} files ({})", so_far.files, prime::format_bytes(so_far.size));
    })?;

    println!("Total files primed: {}", prime::format_count(stats.files));
    println!("Total data primed: {}", prime::format_bytes(stats.size));
    if stats.fsize != stats.size {
        tracing::warn!("read {} of {} listed", prime::format_bytes(stats.fsize), prime::format_bytes(stats.size));
    }
    Ok(())
}

fn run_deployment(cmd: DeploymentCommand) -> anyhow::Result<()> {
    match cmd {
        DeploymentCommand::New { template, params, deploy_id, name, location, resource_group, output } => {
            let template_text = std::fs::read_to_string(&template).with_context(|| format!("could not read {}", template.display()))?;
            let template_json: serde_json::Value = serde_json::from_str(&template_text).with_context(|| format!("{} is not valid JSON", template.display()))?;
            let params = deployment::load_params(params.as_deref())?;

            let mut descriptor = deployment::DeploymentDescriptor::new(template_json, params);
            if let Some(id) = deploy_id {
                descriptor = descriptor.with_deploy_id(&id);
            }
            if let Some(name) = name {
                descriptor.deploy_name = name;
            }
            if let Some(location) = location {
                descriptor.location = location;
            }
            if let Some(rg) = resource_group {
                descriptor.resource_group = rg;
            }
            tracing::info!("deployment {} into resource group {}", descriptor.deploy_id, descriptor.resource_group);

            match output {
                Some(path) => descriptor.save(&path)?,
                None => println!("{}", descriptor.to_json_pretty()?),
            }
        }
        DeploymentCommand::Parameters { descriptor, output } => {
            let descriptor = deployment::DeploymentDescriptor::load(&descriptor)?;
            let text = serde_json::to_string_pretty(&descriptor.parameters_document())?;
            write_or_print(output.as_deref(), &text)?;
        }
    }
    Ok(())
}

fn run_averecmd(cmd: AverecmdCommand) -> anyhow::Result<()> {
    match cmd {
        AverecmdCommand::Command { server, password, user, method, args } => {
            let mut call = averecmd::AverecmdCall::new(&server, &password, &method).with_args(&args.join(" "));
            call.user = user;
            println!("{}", call.command_line());
        }
        AverecmdCommand::Parse { file } => {
            let text = read_input(file.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&averecmd::parse_output(&text))?);
        }
    }
    Ok(())
}

/// Reads a file, or stdin when no file (or `-`) is given
fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display())),
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).context("could not read stdin")?;
            Ok(buffer)
        }
    }
}

fn write_or_print(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, text).with_context(|| format!("could not write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}
