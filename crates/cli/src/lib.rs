pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quoteflow",
    about = "Quoteflow operator CLI",
    long_about = "Operate the Quoteflow database: migrations, demo data, config inspection, readiness checks and role promotion.",
    after_help = "Examples:\n  quoteflow doctor --json\n  quoteflow seed\n  quoteflow promote --email ops@acme.test --role admin"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo actors and catalog; safe to run repeatedly")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Raise an account to agent or admin")]
    Promote {
        #[arg(long, help = "Email of the account to promote")]
        email: String,
        #[arg(long, help = "Target role: client, agent or admin")]
        role: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Promote { email, role } => commands::promote::run(&email, &role),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
