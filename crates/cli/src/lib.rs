pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "lounge",
    about = "Lounge operator CLI",
    long_about = "Operate the lounge bot: migrations, config inspection, readiness checks and the daily appointment sheet.",
    after_help = "Examples:\n  lounge doctor --json\n  lounge config\n  lounge appointments --date 2024-06-01"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, admin chat, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List every booked slot for one day")]
    Appointments {
        #[arg(long, help = "Day to list, as YYYY-MM-DD")]
        date: NaiveDate,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            let (output, passed) = commands::doctor::run(json);
            commands::CommandResult { exit_code: if passed { 0 } else { 1 }, output }
        }
        Command::Appointments { date } => commands::appointments::run(date),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
