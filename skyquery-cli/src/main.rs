//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use skyquery_cli::CliError;

fn main() {
    match skyquery_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("skyquery: {err}");
            std::process::exit(1);
        }
    }
}
