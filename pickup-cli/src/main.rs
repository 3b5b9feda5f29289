//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = pickup_cli::run() {
        eprintln!("pickup: {err}");
        std::process::exit(1);
    }
}

/// Log to stderr at `info` unless `RUST_LOG` says otherwise. Records from
/// the `log` facade are bridged in by the subscriber.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("pickup: logging disabled: {err}");
    }
}
