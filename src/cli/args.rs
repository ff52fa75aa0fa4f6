//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging (`RUST_LOG` overrides)
//! - `--config <path>`: Read configuration from this file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lakeshore - identifier minting and relationship consistency for a digital-asset repository
#[derive(Parser, Debug)]
#[command(name = "lakeshore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mint the identifier for a seed
    #[command(after_help = "\
EXAMPLES:
    # Mint within an explicit namespace
    lakeshore mint --prefix SI SI-101010

    # Use default_prefix from the config file
    lakeshore mint SI-101010")]
    Mint {
        /// Namespace prefix (defaults to default_prefix from config)
        #[arg(long)]
        prefix: Option<String>,

        /// Seed the identifier is derived from
        seed: String,
    },

    /// Check that an identifier matches the one minted from a seed
    Verify {
        /// Namespace prefix (defaults to default_prefix from config)
        #[arg(long)]
        prefix: Option<String>,

        /// Seed the identifier should be derived from
        seed: String,

        /// Identifier to check
        id: String,
    },

    /// Show the relation registry
    Relations {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}
