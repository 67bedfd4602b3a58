//! tablestore CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`; errors are printed to
//! stderr and the process exits non-zero.

use tablestore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
