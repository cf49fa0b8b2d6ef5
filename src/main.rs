use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use docvalidate::{
    Cli, ConfigManager, FileDiscovery, Output, ProgressCallback, ValidationPhase,
    ValidationProgress, Validator, VerbosityLevel,
};

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_reporter() -> ProgressCallback {
    Arc::new(|progress: ValidationProgress| {
        if progress.phase == ValidationPhase::Validation {
            eprint!("\rValidated {}/{}", progress.completed, progress.total);
            if progress.completed == progress.total {
                eprintln!();
            }
        }
    })
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    cli.validate().map_err(|e| anyhow!(e))?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load settings")?;
    let verbosity = VerbosityLevel::from_flags(config.output.verbose, config.output.quiet);
    debug!(?config, "Settings loaded");

    let validator = Validator::builder()
        .with_default_plugins()
        .config(config.clone())
        .build()
        .await
        .context("Failed to start the validator")?;

    if cli.list_packages {
        for package in validator.packages() {
            println!("{}", package);
        }
        return Ok(true);
    }

    let path = cli
        .path
        .as_deref()
        .ok_or_else(|| anyhow!("No path to validate"))?;
    let discovery = FileDiscovery::from_settings(&config.files)?;

    let progress = cli.interactive().then(progress_reporter);
    let results = validator
        .validate_path_with_progress(path, &discovery, progress)
        .await?;

    info!(
        files = results.total_files,
        valid = results.valid_files,
        evicted = validator.instance().evict_idle(),
        "Validation finished"
    );

    let output = Output::new(verbosity, config.output.format);
    print!("{}", output.render(&results)?);

    Ok(!results.has_errors())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbosity());

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
