//! bootstate - Main entry point.
//!
//! This binary scans the host's datasets, assembles the machine graph and
//! prints it as JSON on stdout. Logs go to stderr.

use std::process::ExitCode;

use bootstate::machines::Machines;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Loads the kernel command line, preferring an explicit override.
fn kernel_cmdline() -> std::io::Result<String> {
    if let Ok(cmdline) = std::env::var("BOOTSTATE_CMDLINE") {
        return Ok(cmdline);
    }
    std::fs::read_to_string("/proc/cmdline")
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bootstate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cmdline = match kernel_cmdline() {
        Ok(cmdline) => cmdline.trim().to_string(),
        Err(err) => {
            tracing::error!(%err, "couldn't read the kernel command line");
            return ExitCode::FAILURE;
        }
    };

    let machines = match Machines::new(cmdline, &CancellationToken::new()) {
        Ok(machines) => machines,
        Err(err) => {
            tracing::error!(%err, "couldn't build the machines list");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&machines) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "couldn't serialize the machines list");
            ExitCode::FAILURE
        }
    }
}
