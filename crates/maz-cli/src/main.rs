// azm CLI entry point

use clap::Parser;
use maz_cli::{init_logging, output, Cli, CommandRouter, VerbosityLevel};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = init_logging(cli.verbose, cli.quiet);

    if let Err(e) = CommandRouter::execute(&cli).await {
        output::print_error(&e.user_message());
        if level == VerbosityLevel::Verbose {
            eprintln!("\n{}", e.technical_details());
        }
        std::process::exit(1);
    }
}
