//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the features found in a directory with their aliases and metadata
    Features {
        /// Directory of feature files (*.json, *.yaml, *.yml)
        #[arg(long, value_name = "PATH")]
        dir: PathBuf,
    },

    /// Resolve a key for a list of features and print it as JSON
    Resolve {
        /// Directory of feature files
        #[arg(long, value_name = "PATH")]
        dir: PathBuf,

        /// Base configuration file (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        base: Option<PathBuf>,

        /// Key to resolve, e.g. config:object (whole tree when omitted)
        #[arg(long, value_name = "KEY")]
        key: Option<String>,

        /// Feature name or alias, applied in the order given
        #[arg(short = 'f', long = "feature", value_name = "NAME")]
        features: Vec<String>,
    },

    /// Print every feature's metadata and full configuration as JSON
    Dump {
        /// Directory of feature files
        #[arg(long, value_name = "PATH")]
        dir: PathBuf,

        /// Base configuration file (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        base: Option<PathBuf>,
    },
}
