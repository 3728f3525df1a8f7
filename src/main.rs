use std::process::ExitCode;

use chttl::app;
use clap::Parser;
use common::cli::Cli;
use common::cli::utils::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.common);

    match app::run(&cli).await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
