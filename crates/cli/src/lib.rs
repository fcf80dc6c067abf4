pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hearsay",
    about = "Hearsay operator CLI",
    long_about = "Inspect Hearsay configuration, check readiness, and talk to the bot locally.",
    after_help = "Examples:\n  hearsay doctor --json\n  hearsay config\n  hearsay chat --name Jo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack credentials, and adapter readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Talk to the bot over stdin/stdout as a direct message")]
    Chat {
        #[arg(long, help = "Name the bot greets you with")]
        name: Option<String>,
        #[arg(long, default_value = "ULOCAL", help = "User id the conversation runs as")]
        user: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat { name, user } => {
            commands::chat::run(commands::chat::ChatOptions { name, user })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
