mod cli;
mod error;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use chargepoint_config::Config;
use chargepoint_core::{MemoryTree, Poller};

use crate::cli::Cli;
use crate::error::CliError;

/// Crates whose logs follow the verbosity flags; everything else stays at `warn`.
const WORKSPACE_CRATES: &[&str] = &[
    "chargepoint",
    "chargepoint_api",
    "chargepoint_config",
    "chargepoint_core",
];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match chargepoint_config::load_config(cli.config.as_deref()) {
        Ok(config) => {
            init_tracing(cli.verbose, config.debug);
            run(&cli, &config).await
        }
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity, debug))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Filter directives used when `RUST_LOG` is unset.
fn default_filter(verbosity: u8, debug: bool) -> String {
    let level = match (verbosity, debug) {
        (0 | 1, false) => "info",
        (0..=2, _) => "debug",
        _ => "trace",
    };
    let global = if verbosity == 0 { "warn" } else { level };

    std::iter::once(global.to_owned())
        .chain(WORKSPACE_CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

async fn run(cli: &Cli, config: &Config) -> Result<(), CliError> {
    let poller_config = config.to_poller_config()?;
    let tree = Arc::new(MemoryTree::new());
    let poller = Poller::from_config(poller_config, Arc::clone(&tree))?;

    if cli.once {
        if let Some(report) = poller.run_now().await {
            debug!(?report, "single cycle finished");
        }
        println!("{}", serde_json::to_string_pretty(&tree.snapshot_json())?);
        return Ok(());
    }

    let mut changes = tree.subscribe();
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    poller.start().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            change = changes.recv() => match change {
                Ok(change) => debug!(
                    path = %change.path,
                    value = %change.state.value,
                    ack = change.state.ack,
                    "state changed"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "change log fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    poller.stop().await;
    Ok(())
}

/// Cancel `token` on the first Ctrl-C. The handler is installed before
/// the first cycle, so an interrupt during it is not lost.
async fn watch_ctrl_c(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl-C");
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default_except_own_crates() {
        let filter = default_filter(0, false);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("chargepoint_core=info"));
    }

    #[test]
    fn debug_flag_raises_own_crates() {
        let filter = default_filter(0, true);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("chargepoint_api=debug"));
    }

    #[test]
    fn verbosity_levels() {
        assert!(default_filter(1, false).starts_with("info,"));
        assert!(default_filter(2, false).starts_with("debug,"));
        assert!(default_filter(3, false).contains("chargepoint=trace"));
    }
}
