pub mod clean;
pub mod config;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgnorm_core::PipelineConfig;

#[derive(Parser)]
#[command(
    name = "kgnorm",
    about = "Normalize NER and relation extraction output into knowledge-graph records",
    version
)]
pub struct Cli {
    /// Pipeline configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true, env = "KGNORM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process documents and write per-document results as JSON
    Run {
        /// Text files, or directories of .txt/.md files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep only relations that match the catalog
        #[arg(long)]
        strict: bool,
    },
    /// Print the preprocessed text of a document
    Clean {
        /// Document to clean
        file: PathBuf,
    },
    /// Validate the configuration and exit
    CheckConfig,
    /// Print the effective relation catalog
    Catalog,
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}
