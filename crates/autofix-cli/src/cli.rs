//! Argument definitions

use autofix_artifact::{Filename, ProjectName};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Generate, run and repair small programs from natural-language instructions
#[derive(Debug, Parser)]
#[command(name = "autofix")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "AUTOFIX_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub(crate) log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub(crate) json_logs: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Project and file an operation targets
#[derive(Debug, Args)]
pub(crate) struct Target {
    /// Project name (defaults to the configured project)
    #[arg(short, long)]
    pub(crate) project: Option<ProjectName>,

    /// Artifact filename (defaults to the configured primary file)
    #[arg(short, long)]
    pub(crate) file: Option<Filename>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Synthesize a program, snapshot it and run it
    Generate {
        #[command(flatten)]
        target: Target,

        /// Maximum executions, including the first
        #[arg(long)]
        budget: Option<u32>,

        /// What the program should do
        instruction: String,
    },

    /// Run the current artifact once
    Run {
        #[command(flatten)]
        target: Target,
    },

    /// Print the current artifact source
    Show {
        #[command(flatten)]
        target: Target,
    },

    /// Run the artifact and repair it until it passes or the budget runs out
    Fix {
        #[command(flatten)]
        target: Target,

        /// Instruction to repair against (defaults to the last one recorded)
        #[arg(short, long)]
        instruction: Option<String>,

        /// Maximum executions, including the first
        #[arg(long)]
        budget: Option<u32>,
    },

    /// List snapshots of a project
    Versions {
        #[arg(short, long)]
        project: Option<ProjectName>,
    },

    /// Restore a snapshot over the live artifact
    Rollback {
        #[arg(short, long)]
        project: Option<ProjectName>,

        /// Snapshot key as printed by `versions`
        key: String,

        /// File to overwrite (defaults to the file the snapshot was taken from)
        #[arg(short, long)]
        target: Option<Filename>,
    },

    /// Query the execution history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum HistoryCommands {
    /// Most recent execution
    Latest {
        #[arg(short, long)]
        project: Option<ProjectName>,
    },

    /// Executions whose instruction contains a keyword
    Search {
        #[arg(short, long)]
        project: Option<ProjectName>,

        #[arg(short, long)]
        keyword: Option<String>,

        /// RFC 3339 lower bound; ignored without --end
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Utc>>,

        /// RFC 3339 upper bound; ignored without --start
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<DateTime<Utc>>,
    },

    /// Executions between two instants, inclusive
    Range {
        #[arg(short, long)]
        project: Option<ProjectName>,

        #[arg(long, value_parser = parse_timestamp)]
        start: DateTime<Utc>,

        #[arg(long, value_parser = parse_timestamp)]
        end: DateTime<Utc>,
    },
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_takes_target_and_instruction() {
        let cli = Cli::try_parse_from([
            "autofix", "generate", "-p", "demo", "-f", "calc.py", "add two numbers",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate {
                target,
                budget,
                instruction,
            } => {
                assert_eq!(target.project.unwrap().as_str(), "demo");
                assert_eq!(target.file.unwrap().as_str(), "calc.py");
                assert_eq!(budget, None);
                assert_eq!(instruction, "add two numbers");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_names_are_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["autofix", "run", "-p", "../etc"]).is_err());
        assert!(Cli::try_parse_from(["autofix", "show", "-f", "a/b.py"]).is_err());
    }

    #[test]
    fn history_range_parses_timestamps() {
        let cli = Cli::try_parse_from([
            "autofix",
            "history",
            "range",
            "--start",
            "2024-01-01T00:00:00Z",
            "--end",
            "2024-01-02T00:00:00+02:00",
        ])
        .unwrap();

        match cli.command {
            Commands::History {
                command: HistoryCommands::Range { start, end, .. },
            } => {
                assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
                assert_eq!(end.to_rfc3339(), "2024-01-01T22:00:00+00:00");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = [
            "autofix", "history", "range", "--start", "yesterday", "--end", "now",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn global_flags() {
        let cli = Cli::try_parse_from([
            "autofix", "--json-logs", "--log-level", "debug", "versions",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Versions { project: None }));
    }
}
