use std::process::ExitCode;

use clap::Parser;
use kubelog::{cli::Cli, config::Config};

#[tokio::main]
async fn main() -> ExitCode {
    kubelog::logging::init();

    let cli = Cli::parse();
    let res = match Config::try_from(cli) {
        Ok(config) => kubelog::run(config).await,
        Err(e) => Err(e),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
