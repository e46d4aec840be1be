use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use hangar_runner::prelude::{run, HangarCli, UsageError};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let cli = match HangarCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            ErrorKind::InvalidSubcommand => {
                let _ = e.print();
                print_usage();
                return ExitCode::SUCCESS;
            }
            _ => {
                let _ = e.print();
                return ExitCode::FAILURE;
            }
        },
    };

    if cli.command.is_none() {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<UsageError>().is_some() => {
            eprintln!("{}", e);
            print_usage();
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    if let Err(e) = HangarCli::command().print_help() {
        eprintln!("Failed to print usage: {}", e);
    }
}
