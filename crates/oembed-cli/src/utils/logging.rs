//! Logging initialization.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

/// Log level selected by the global flags.
pub const fn level_for(cli: &Cli) -> Level {
    if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

/// Install the global subscriber, writing to stderr so stdout carries only
/// command output.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level_for(cli))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
