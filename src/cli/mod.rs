pub mod info;
pub mod ingest;
pub mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::{Direction, ResourceKind};

/// A3S Inquisitor - cloud tag auditing and hijack-chain detection
#[derive(Debug, Parser)]
#[command(name = "inquisitor", version, about)]
pub struct Cli {
    /// Settings file (defaults to $INQUISITOR_CONFIG, ./settings.toml, /opt/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Abort the invocation after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply observed changes to the graph and print the resulting hijack chains
    Ingest {
        /// Relationship store file
        #[arg(long)]
        store: PathBuf,

        /// JSON file holding one observation or an array of them
        input: PathBuf,
    },

    /// Resolve the hijack chain for a set of names
    Resolve {
        /// Relationship store file
        #[arg(long)]
        store: PathBuf,

        /// Identifier of the resource the names belong to
        #[arg(long)]
        root: String,

        /// Kind of the root resource (record, distribution, bucket, ...)
        #[arg(long, value_parser = parse_kind)]
        kind: ResourceKind,

        /// Name to trace; repeat for several
        #[arg(long = "name", required = true)]
        names: Vec<String>,

        /// upstream (who points at me) or downstream (what do I point at)
        #[arg(long, value_parser = parse_direction, default_value = "upstream")]
        direction: Direction,
    },

    /// Show row and edge counts of a relationship store
    Info {
        /// Relationship store file
        #[arg(long)]
        store: PathBuf,
    },
}

fn parse_kind(s: &str) -> std::result::Result<ResourceKind, String> {
    s.parse().map_err(|e: crate::error::InquisitorError| e.to_string())
}

fn parse_direction(s: &str) -> std::result::Result<Direction, String> {
    s.parse().map_err(|e: crate::error::InquisitorError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from([
            "inquisitor",
            "--timeout-secs",
            "30",
            "resolve",
            "--store",
            "graph.json",
            "--root",
            "E1",
            "--kind",
            "distribution",
            "--name",
            "d1.cloudfront.net",
            "--name",
            "d1-alt.cloudfront.net",
            "--direction",
            "down",
        ])
        .unwrap();

        assert_eq!(cli.timeout_secs, Some(30));
        match cli.command {
            Commands::Resolve {
                kind,
                names,
                direction,
                ..
            } => {
                assert_eq!(kind, ResourceKind::Distribution);
                assert_eq!(names.len(), 2);
                assert_eq!(direction, Direction::Downstream);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let result = Cli::try_parse_from([
            "inquisitor", "resolve", "--store", "g.json", "--root", "x", "--kind", "vm", "--name",
            "a",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "inquisitor",
            "info",
            "--store",
            "graph.json",
            "--config",
            "settings.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("settings.toml")));
        assert!(matches!(cli.command, Commands::Info { .. }));
    }
}
