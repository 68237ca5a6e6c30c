//! # Runbook CLI Library
//!
//! Operator tooling for a Runbook database: schema migrations, the
//! bootstrap admin account, the approval queue and the audit trail.
//!
//! ## Modules
//!
//! - `commands`: Handlers behind each subcommand
//! - `config`: Configuration management

pub mod commands;
pub mod config;

use serde::Serialize;

/// Initializes tracing for the CLI binary
///
/// `RUST_LOG` overrides the default filter. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runbook_cli=info,runbook_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Pretty-prints a value as JSON on stdout
pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{}", out);
    Ok(())
}
