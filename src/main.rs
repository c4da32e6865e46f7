use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use clipup_lib::config::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            println!("{}", err.render());
            return ExitCode::FAILURE;
        }
    };

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            println!("Error: {:#}", e);
            println!("Usage: clipup <SERVICE_URL>   (e.g. clipup http://192.168.1.100:7680)");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = clipup_lib::run(config, cli.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
