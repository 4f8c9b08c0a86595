//! CLI definition.
//!
//! stackflow has a single workflow: bring every stack of an environment up
//! to date, or tear all of them down.

use std::path::PathBuf;

use clap::Parser;

use stackflow_config::DEFAULT_CONFIG_FILE;

pub mod run;

/// stackflow - ordered infrastructure stack orchestration
#[derive(Parser, Debug)]
#[command(name = "stackflow")]
#[command(version, about = "stackflow - ordered infrastructure stack orchestration")]
#[command(long_about = r#"
stackflow creates or selects the base, platform, data and app stacks of an
environment, wires each stack to the ones it depends on, and then refreshes
and updates them in dependency order.

USAGE:
  stackflow           → refresh and update every stack
  stackflow destroy   → destroy every stack in reverse order

EXIT CODES:
  0 - Success
  1 - Any failure
"#)]
pub struct Cli {
    /// `destroy` tears the environment down; anything else applies it
    pub mode: Option<String>,

    /// Environment configuration file
    #[arg(short, long, env = "STACKFLOW_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Print engine commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for per-operation progress logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["stackflow"]).unwrap();
        assert_eq!(cli.mode, None);
        assert!(!cli.dry_run);
        assert!(cli.report.is_none());
    }

    #[test]
    fn test_destroy_with_options() {
        let cli = Cli::try_parse_from([
            "stackflow",
            "destroy",
            "--config",
            "envs/dev.yaml",
            "--dry-run",
            "--report",
            "out/run.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.mode.as_deref(), Some("destroy"));
        assert_eq!(cli.config, PathBuf::from("envs/dev.yaml"));
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert_eq!(cli.report, Some(PathBuf::from("out/run.json")));
    }

    #[test]
    fn test_rejects_extra_positional() {
        assert!(Cli::try_parse_from(["stackflow", "destroy", "now"]).is_err());
    }
}
