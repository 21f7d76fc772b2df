pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use homeserve_core::config::{AppConfig, LoadOptions};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "homeserve",
    about = "Homeserve operator CLI",
    long_about = "Operate the Homeserve service-request store: migrations, demo data, config inspection, readiness checks and request listings.",
    after_help = "Examples:\n  homeserve doctor --json\n  homeserve seed\n  homeserve requests --householder H1\n  homeserve smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo householders, providers and service catalog")]
    Seed,
    #[command(about = "Drive a full request lifecycle against the configured database")]
    Smoke,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List service requests as JSON")]
    Requests {
        #[arg(long, help = "Only requests owned by this householder", conflicts_with = "provider")]
        householder: Option<String>,
        #[arg(long, help = "Only requests this provider has bid on")]
        provider: Option<String>,
        #[arg(long, help = "With --provider, list open requests the provider can still bid on")]
        open: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::Seed => "seed",
            Self::Smoke => "smoke",
            Self::Config => "config",
            Self::Doctor { .. } => "doctor",
            Self::Requests { .. } => "requests",
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = logging::init(&config.logging) {
            eprintln!("homeserve: {error:#}");
        }
    }

    let command = cli.command.name();
    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Requests { householder, provider, open } => {
            let filter = match (householder, provider) {
                (Some(id), _) => commands::requests::RequestFilter::Householder(id),
                (None, Some(id)) if open => commands::requests::RequestFilter::OpenFor(id),
                (None, Some(id)) => commands::requests::RequestFilter::Provider(id),
                (None, None) => commands::requests::RequestFilter::All,
            };
            commands::requests::run(filter)
        }
    };

    tracing::info!(
        event_name = "cli.command_finished",
        command,
        exit_code = result.exit_code,
        "command finished"
    );
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
