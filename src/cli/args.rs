//! Command-line argument parsing for ForensicBuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ForensicBuddy - question answering over a forensic case corpus
#[derive(Parser, Debug)]
#[command(name = "forensicbuddy")]
#[command(version)]
#[command(about = "Ask questions about a forensic investment case", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.forensicbuddy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question
    Ask {
        /// The question
        #[arg(value_name = "QUERY")]
        query: String,

        /// JSON file with prior turns: [{"role": "user", "content": "..."}]
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a category's contents with the records of a JSONL file
    Ingest {
        /// Category name, e.g. complete_analysis
        #[arg(value_name = "CATEGORY")]
        category: String,

        /// One JSON record per line
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Remove every record of a category
    Clear {
        #[arg(value_name = "CATEGORY")]
        category: String,
    },

    /// Record counts per category
    Stats,

    /// Display the effective configuration
    Config {
        /// Write the defaults to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    /// Log filter override; `None` keeps the configured level
    pub fn filter(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("warn"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("debug"),
            Verbosity::VeryVerbose => Some("trace"),
        }
    }
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let args = Args::try_parse_from([
            "forensicbuddy",
            "ask",
            "What happened in 2009?",
            "--history",
            "turns.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), Verbosity::Verbose);
        match args.command {
            Commands::Ask { query, history, json } => {
                assert_eq!(query, "What happened in 2009?");
                assert_eq!(history, Some(PathBuf::from("turns.json")));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_with_global_config() {
        let args = Args::try_parse_from([
            "forensicbuddy",
            "--config",
            "/tmp/c.toml",
            "ingest",
            "portfolio_facts",
            "facts.jsonl",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(args.command, Commands::Ingest { .. }));
    }

    #[test]
    fn test_verbosity_levels() {
        let quiet = Args::try_parse_from(["forensicbuddy", "-q", "stats"]).unwrap();
        assert_eq!(quiet.verbosity(), Verbosity::Quiet);
        assert_eq!(quiet.verbosity().filter(), Some("warn"));

        let trace = Args::try_parse_from(["forensicbuddy", "-vv", "stats"]).unwrap();
        assert_eq!(trace.verbosity(), Verbosity::VeryVerbose);

        let normal = Args::try_parse_from(["forensicbuddy", "stats"]).unwrap();
        assert_eq!(normal.verbosity().filter(), None);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["forensicbuddy"]).is_err());
    }
}
