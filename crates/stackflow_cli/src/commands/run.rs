//! Run command - apply or destroy an environment.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use stackflow_config::ConfigLoader;
use stackflow_driver::{RunMode, StackDriver};
use stackflow_engine::{EngineOptions, PulumiCli};

use super::Cli;

pub async fn execute(cli: Cli) -> Result<()> {
    let mode = RunMode::from_arg(cli.mode.as_deref());

    let env = ConfigLoader::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    info!(
        "Loaded {} stacks for {}/{}",
        env.kinds().len(),
        env.organization,
        env.stack_name
    );

    let mut options = EngineOptions::new();
    if cli.dry_run {
        options = options.dry_run();
    }
    let engine = PulumiCli::new(options)
        .await
        .context("Automation engine is not available")?;

    let base_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    debug!("Resolving local project locations against {:?}", base_dir);

    let mut driver = StackDriver::new(Arc::new(engine), env).with_base_dir(base_dir);
    if let Some(dir) = &cli.log_dir {
        driver = driver.with_log_dir(dir);
    }

    let report = driver.run(mode).await?;
    info!(
        "Finished {} run {} with {} operations",
        report.mode,
        report.run_id,
        report.operations.len()
    );

    if let Some(path) = &cli.report {
        report
            .save(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
