mod app_error;
mod cli;
mod commands;
mod logging;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Command::FindArgs(args) => commands::run_find_args(args),
        Command::FindReturns(args) => commands::run_find_returns(args),
        Command::FindEndpoints(args) => commands::run_find_endpoints(args),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.message());
            if cli.verbose > 0 {
                if let Some(detail) = err.verbose_detail() {
                    eprintln!("{detail}");
                }
            }
            std::process::ExitCode::FAILURE
        }
    }
}
