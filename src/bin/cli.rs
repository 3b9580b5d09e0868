//! upload-deploy CLI
//!
//! Plans, applies and tears down the media-upload function and its log group.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use upload_deploy::{
    artifact::Artifact,
    config,
    error::{AppError, Result},
    models::{Config, DeploymentUnit},
    pipeline,
    provider::{CloudProvider, LocalProvider},
    state::{LocalStateStore, StateStore},
};

/// upload-deploy - Media Upload Function Deployer
#[derive(Parser, Debug)]
#[command(
    name = "upload-deploy",
    version,
    about = "Declare and reconcile the media-upload function"
)]
struct Cli {
    /// Path to the deployment configuration
    #[arg(short, long, default_value = "deploy.toml")]
    config: PathBuf,

    /// State directory (default: `state.dir` from the configuration)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Where resources are reconciled
    #[arg(long, value_enum, default_value_t = Backend::Local)]
    backend: Backend,

    /// Override a variable, e.g. `--var region=eu-west-1`
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Simulated platform under `{state_dir}/local-cloud`
    Local,
    /// AWS, using the default credential chain
    Aws,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the descriptors and check for the artifact
    Validate,

    /// Print the artifact's content hash
    Hash,

    /// Show what apply would change
    Plan,

    /// Create or update resources
    Apply {
        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Delete all recorded resources
    Destroy {
        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Print published outputs
    Outputs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the recorded state
    Show,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    config::parse_override(raw).map_err(|e| e.to_string())
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Ask for an explicit `yes` on stdin.
fn confirmed(prompt: &str) -> Result<bool> {
    print!("{prompt} Only 'yes' will be accepted: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

async fn build_provider(
    backend: Backend,
    config: &Config,
    state_dir: &Path,
) -> Result<Box<dyn CloudProvider>> {
    match backend {
        Backend::Local => Ok(Box::new(LocalProvider::new(
            state_dir.join("local-cloud"),
            config.variables.region.clone(),
        ))),
        #[cfg(feature = "aws")]
        Backend::Aws => Ok(Box::new(
            upload_deploy::provider::AwsProvider::from_region(&config.variables.region).await,
        )),
        #[cfg(not(feature = "aws"))]
        Backend::Aws => Err(AppError::config(
            "this build has no AWS support; rebuild with --features aws",
        )),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env = config::unicode_vars(std::env::vars_os());
    let config = config::resolve(&cli.config, env, &cli.vars)?;
    let state_dir = cli.state_dir.clone().unwrap_or_else(|| config.state.dir.clone());
    let unit = DeploymentUnit::from_config(&config);
    let store = LocalStateStore::new(&state_dir);

    log::debug!("State kept in {}", store.location());

    match cli.command {
        Command::Validate => {
            let report = pipeline::run_validate(&unit).await?;
            log::info!("✓ Function {} is valid", report.function_name);
            log::info!("✓ Log group {} is valid", report.log_group);
            let order: Vec<String> = report.creation_order.iter().map(|k| k.to_string()).collect();
            log::info!("Creation order: {}", order.join(" -> "));
            match report.artifact {
                Some(hash) => log::info!("✓ Artifact present ({hash})"),
                None => log::warn!(
                    "Artifact {} is missing; apply will fail until it is built",
                    unit.function.artifact_path.display()
                ),
            }
        }

        Command::Hash => {
            let artifact = Artifact::load(&unit.function.artifact_path).await?;
            println!("{}", artifact.hash());
        }

        Command::Plan => {
            let provider = build_provider(cli.backend, &config, &state_dir).await?;
            let prepared = pipeline::prepare(&unit, provider.as_ref(), &store).await?;
            print!("{}", prepared.plan);
        }

        Command::Apply { auto_approve } => {
            let provider = build_provider(cli.backend, &config, &state_dir).await?;
            let prepared = pipeline::prepare(&unit, provider.as_ref(), &store).await?;
            print!("{}", prepared.plan);

            if prepared.plan.has_changes()
                && !auto_approve
                && !confirmed("Apply these changes?")?
            {
                log::warn!("Apply cancelled.");
                return Ok(());
            }

            let report = pipeline::execute(&unit, prepared, provider.as_ref(), &store).await?;
            println!();
            println!("function_name = {}", report.outputs.function_name);
            println!("function_arn  = {}", report.outputs.function_arn);
            println!("layer_arn     = {}", report.outputs.layer_arn);
        }

        Command::Destroy { auto_approve } => {
            if !auto_approve && !confirmed("Destroy all recorded resources?")? {
                log::warn!("Destroy cancelled.");
                return Ok(());
            }
            let provider = build_provider(cli.backend, &config, &state_dir).await?;
            let report = pipeline::run_destroy(&unit, provider.as_ref(), &store).await?;
            for resource in &report.deleted {
                println!("  - {resource}");
            }
        }

        Command::Outputs { json } => {
            let outputs = store
                .load()
                .await?
                .and_then(|state| state.outputs)
                .ok_or_else(|| AppError::not_found("no outputs recorded; run apply first"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outputs)?);
            } else {
                println!("function_name = {}", outputs.function_name);
                println!("function_arn  = {}", outputs.function_arn);
                println!("layer_arn     = {}", outputs.layer_arn);
            }
        }

        Command::Show => match store.load().await? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => log::info!("No state recorded at {}", store.location()),
        },
    }

    Ok(())
}
