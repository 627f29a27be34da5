//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SpellGate - spell-check scheduling language server
#[derive(Parser)]
#[command(name = "spellgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the LSP server on stdio
    Lsp {
        /// Upper bound for one analyzer call, in milliseconds (0 disables it)
        #[arg(long, value_name = "MS")]
        analyzer_timeout_ms: Option<u64>,

        /// Drop validations that fire while another document is being analysed
        #[arg(long)]
        drop_when_busy: bool,
    },

    /// Load a configuration file, following imports, and print the result
    CheckConfig {
        /// Configuration file path
        file: PathBuf,

        /// Merge the built-in defaults underneath the file
        #[arg(long)]
        with_defaults: bool,
    },
}
