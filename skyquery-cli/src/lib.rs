//! Command-line interface for inspecting skyquery data directories.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod commands;
mod error;

pub use error::CliError;

use commands::{ElevationArgs, FindArgs, NearestArgs};

pub(crate) const ARG_DATA_DIR: &str = "data-dir";
pub(crate) const ARG_BACKEND: &str = "backend";
pub(crate) const ARG_DOMAIN: &str = "domain";
pub(crate) const ARG_MODE: &str = "mode";
pub(crate) const ARG_PATTERN: &str = "pattern";
pub(crate) const ARG_LON: &str = "lon";
pub(crate) const ARG_LAT: &str = "lat";
pub(crate) const ARG_TO_LON: &str = "to-lon";
pub(crate) const ARG_TO_LAT: &str = "to-lat";
pub(crate) const ARG_CORRIDOR: &str = "corridor";
pub(crate) const ENV_FIND_PATTERN: &str = "SKYQUERY_CMDS_FIND_PATTERN";
pub(crate) const ENV_NEAREST_LON: &str = "SKYQUERY_CMDS_NEAREST_LON";
pub(crate) const ENV_NEAREST_LAT: &str = "SKYQUERY_CMDS_NEAREST_LAT";
pub(crate) const ENV_ELEVATION_LON: &str = "SKYQUERY_CMDS_ELEVATION_LON";
pub(crate) const ENV_ELEVATION_LAT: &str = "SKYQUERY_CMDS_ELEVATION_LAT";

/// Run the skyquery CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Find(args) => commands::run_find_with(args, &mut stdout),
        Command::Nearest(args) => commands::run_nearest_with(args, &mut stdout),
        Command::Elevation(args) => commands::run_elevation_with(args, &mut stdout),
    }
}

/// Install the logger; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already installed");
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "skyquery",
    about = "Query flight-planning data sets from the command line",
    version
)]
struct Cli {
    /// Log engine activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search a record domain by key or name.
    Find(FindArgs),
    /// List the records closest to a position.
    Nearest(NearestArgs),
    /// Report terrain elevation at a point or along a leg.
    Elevation(ElevationArgs),
}

#[cfg(test)]
mod tests;
