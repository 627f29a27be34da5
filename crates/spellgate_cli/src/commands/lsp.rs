//! LSP command implementation

use std::time::Duration;

use miette::Result;
use tracing::info;

use spellgate_lsp::{BusyPolicy, DEFAULT_ANALYZER_TIMEOUT, SchedulerOptions, ServerOptions};

use crate::utils::create_tokio_runtime;

/// Server options from the `lsp` flags.
pub fn lsp_options(analyzer_timeout_ms: Option<u64>, drop_when_busy: bool) -> ServerOptions {
    let analyzer_timeout = match analyzer_timeout_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => Some(DEFAULT_ANALYZER_TIMEOUT),
    };
    let busy_policy = if drop_when_busy {
        BusyPolicy::Drop
    } else {
        BusyPolicy::Wait
    };

    ServerOptions {
        scheduler: SchedulerOptions {
            busy_policy,
            analyzer_timeout,
        },
        ..ServerOptions::default()
    }
}

pub fn run_lsp(options: ServerOptions) -> Result<()> {
    info!(
        "Busy policy: {:?}, analyzer timeout: {:?}",
        options.scheduler.busy_policy, options.scheduler.analyzer_timeout
    );
    create_tokio_runtime()?.block_on(async {
        spellgate_lsp::run_with_options(options).await;
    });
    Ok(())
}
