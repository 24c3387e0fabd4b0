//! dbkeeper CLI entry point
//!
//! Parses arguments, runs one command and exits. The JSON result (or error
//! object) has already been written to stdout by the time `run` returns; the
//! line printed here goes to stderr for whoever is watching the terminal.

use dbkeeper::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
