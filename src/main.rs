//! Conjurer CLI — multi-target code generation from conjure definitions.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "conjurer",
    version,
    about = "Compile conjure definitions and drive per-language generators"
)]
struct Cli {
    #[command(subcommand)]
    command: conjurer::cli::Commands,
}

fn main() {
    let filter = EnvFilter::try_from_env("CONJURER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = conjurer::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
