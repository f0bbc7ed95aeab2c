//! Shipstack CLI — declarative deployment stack for purplship-server.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "shipstack",
    version,
    about = "Declarative deployment stack for purplship-server — typed resource graph, BLAKE3-fingerprinted templates"
)]
struct Cli {
    #[command(subcommand)]
    command: shipstack::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = shipstack::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
