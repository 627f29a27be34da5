//! Subcommand implementations

mod check_config;
mod lsp;

pub use check_config::run_check_config;
pub use lsp::{lsp_options, run_lsp};
