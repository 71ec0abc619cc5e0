pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tourlead",
    about = "Tourlead operator CLI",
    long_about = "Apply database migrations, inspect effective configuration, and onboard agencies.",
    after_help = "Examples:\n  tourlead migrate\n  tourlead config\n  tourlead seed --name \"Sunny Travel\" --plan pro"
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
    #[command(about = "Create an agency tenant with a generated API key")]
    Seed {
        #[arg(long, help = "Agency display name")]
        name: String,
        #[arg(long, default_value = "basic", help = "Plan tier: basic, hot, pro or premium")]
        plan: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Seed { name, plan } => commands::seed::run(&name, &plan),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
