//! billstack CLI entrypoint.
//!
//! This is the composition root: it loads `.env`, reads the API key and
//! wires the definition, state store, client and deployer together.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use billstack::cli::{Cli, Commands, OutputFormatter, StateCommands};
use billstack::config::{find_definition_file, DefinitionParser, ManifestValidator, Settings};
use billstack::construct::StackManifest;
use billstack::deployer::{DeployOptions, Deployer};
use billstack::error::Result;
use billstack::state::StateStore;
use billstack::stripe::StripeClient;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Before argument parsing, so that clap sees STRIPE_API_KEY from .env.
    let dotenv = DefinitionParser::new().load_dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = dotenv {
        warn!("{e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the default level.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns whether the command fully succeeded.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<bool> {
    let definition_path = resolve_definition_path(cli.definition.as_ref())?;

    match cli.command {
        Commands::Synth => cmd_synth(&definition_path, cli.api_key, formatter),
        Commands::Diff { detailed } => {
            cmd_diff(&definition_path, cli.api_key, detailed, formatter).await
        }
        Commands::Deploy { force_update } => {
            cmd_deploy(&definition_path, cli.api_key, force_update, formatter).await
        }
        Commands::Destroy { yes } => cmd_destroy(&definition_path, cli.api_key, yes, formatter).await,
        Commands::State { command } => cmd_state(&definition_path, command, formatter).await,
    }
}

/// Synthesize the manifest and write it to disk.
fn cmd_synth(
    definition_path: &Path,
    api_key: Option<String>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (settings, manifest) = load_manifest(definition_path, api_key, formatter)?;

    manifest.write_to(&settings.manifest_path)?;

    println!("{}", formatter.format_manifest(&manifest));
    eprintln!(
        "{}",
        formatter.success(&format!(
            "Manifest written to {}",
            settings.manifest_path.display()
        ))
    );
    Ok(true)
}

/// Show what a deploy would change.
async fn cmd_diff(
    definition_path: &Path,
    api_key: Option<String>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (settings, manifest) = load_manifest(definition_path, api_key.clone(), formatter)?;
    let client = create_client(api_key, &manifest)?;
    let state = StateStore::open(&settings.state_path).await;

    let deployer = Deployer::new(client, state);
    let diff = deployer.diff(&manifest).await;

    println!("{}", formatter.format_diff(&diff, detailed));
    Ok(diff.errors.is_empty())
}

/// Reconcile the remote account with the definition.
async fn cmd_deploy(
    definition_path: &Path,
    api_key: Option<String>,
    force_update: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (settings, manifest) = load_manifest(definition_path, api_key.clone(), formatter)?;
    manifest.write_to(&settings.manifest_path)?;

    let client = create_client(api_key, &manifest)?;
    let state = StateStore::open(&settings.state_path).await;
    let options = DeployOptions {
        skip_unchanged_products: settings.skip_unchanged_products && !force_update,
    };

    let mut deployer = Deployer::new(client, state).with_options(options);
    let result = deployer.deploy(&manifest).await;

    println!("{}", formatter.format_deploy(&result));
    Ok(result.is_success())
}

/// Tear down every resource of the stack.
async fn cmd_destroy(
    definition_path: &Path,
    api_key: Option<String>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (settings, manifest) = load_manifest(definition_path, api_key.clone(), formatter)?;

    if manifest.resources.is_empty() {
        eprintln!("No resources to destroy.");
        return Ok(true);
    }

    if !auto_approve {
        eprintln!("The following resources will be deleted or deactivated:");
        for entry in manifest.teardown_order() {
            eprintln!("  - {} ({})", entry.id, entry.kind);
        }
        eprint!("\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "destroy" {
            eprintln!("Destruction cancelled.");
            return Ok(true);
        }
    }

    let client = create_client(api_key, &manifest)?;
    let state = StateStore::open(&settings.state_path).await;

    let mut deployer = Deployer::new(client, state);
    let result = deployer.destroy(&manifest).await;

    println!("{}", formatter.format_destroy(&result));
    Ok(result.is_success())
}

/// State management commands.
async fn cmd_state(
    definition_path: &Path,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let definition = parser_for(definition_path).load_file(definition_path)?;
    let mut store = StateStore::open(&definition.settings.state_path).await;

    match command {
        StateCommands::Show => {
            println!("{}", formatter.format_state(store.file()));
        }
        StateCommands::Forget { logical_id } => {
            let stack_id = &definition.stack.id;
            if store.remove_resource(stack_id, &logical_id).is_some() {
                store.save().await?;
                eprintln!(
                    "{}",
                    formatter.success(&format!("{logical_id} is no longer tracked in {stack_id}"))
                );
            } else {
                eprintln!(
                    "{}",
                    formatter.warning(&format!("{logical_id} is not tracked in {stack_id}"))
                );
                return Ok(false);
            }
        }
    }

    Ok(true)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the definition file path.
fn resolve_definition_path(definition_path: Option<&PathBuf>) -> Result<PathBuf> {
    definition_path.map_or_else(|| find_definition_file("."), |path| Ok(path.clone()))
}

fn parser_for(definition_path: &Path) -> DefinitionParser {
    DefinitionParser::new().with_base_path(definition_path.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads the definition, builds the tree, synthesizes and lints the manifest.
///
/// The construct tree is dropped before returning; only the manifest is
/// carried into the async commands.
fn load_manifest(
    definition_path: &Path,
    api_key: Option<String>,
    formatter: &OutputFormatter,
) -> Result<(Settings, StackManifest)> {
    debug!("Loading definition from: {}", definition_path.display());
    let definition = parser_for(definition_path).load_file(definition_path)?;

    let manifest = definition.build(api_key)?.synth();
    info!(
        "Synthesized stack {} with {} resources",
        manifest.stack_id,
        manifest.resources.len()
    );

    let report = ManifestValidator::new().validate(&manifest);
    let lint = formatter.format_lint(&report);
    if !lint.is_empty() {
        eprint!("{lint}");
    }

    Ok((definition.settings, manifest))
}

/// Creates the Stripe client for `manifest`.
fn create_client(api_key: Option<String>, manifest: &StackManifest) -> Result<StripeClient> {
    let api_key = DefinitionParser::require_api_key(api_key)?;
    Ok(StripeClient::new(&api_key)?.with_api_version(manifest.api_version.clone()))
}
