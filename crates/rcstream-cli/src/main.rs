use rcstream_core::logging;

mod cli;
mod notify;
mod providers;

use crate::cli::CliCommand;

fn main() {
    logging::init_default();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("rcstream error: start runtime: {}", err);
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(CliCommand::run_from_args());
    // A stream worker may still be blocked on an open connection; it ends with the process.
    runtime.shutdown_background();

    if let Err(err) = result {
        eprintln!("rcstream error: {:#}", err);
        std::process::exit(1);
    }
}
