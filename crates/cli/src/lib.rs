pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadcall",
    about = "Leadcall operator CLI",
    long_about = "Prepare the lead store, inspect configuration and preview calling runs.",
    after_help = "Examples:\n  leadcall migrate\n  leadcall preview --limit 5\n  leadcall seed --user agent-7"
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
    #[command(about = "List the leads the next automated run would dial, without calling them")]
    Preview {
        #[arg(long, help = "Maximum number of leads to select")]
        limit: Option<u32>,
        #[arg(long, help = "Only select leads owned by this user")]
        user: Option<String>,
    },
    #[command(about = "Insert demo leads ready for a first call")]
    Seed {
        #[arg(long, help = "Owner recorded on the seeded leads")]
        user: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Preview { limit, user } => commands::preview::run(limit, user),
        Command::Seed { user } => commands::seed::run(user),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
