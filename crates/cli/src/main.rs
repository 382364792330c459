//! Submissions Hub CLI - access policy tools.
//!
//! # Usage
//!
//! ```bash
//! # Check which emails the portal would let in (exit code 1 if any is denied)
//! hub-cli check jane@example.com someone@else.net
//!
//! # Show the allowlists as the portal parses them
//! hub-cli policy
//!
//! # Print a fresh conversation id
//! hub-cli conversation-id
//! ```
//!
//! The allowlists come from `ADMIN_EMAILS` and `ALLOWED_EMAIL_DOMAINS`; a
//! `.env` file in the working directory is honored.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "hub-cli")]
#[command(author, version, about = "Submissions Hub CLI tools")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the access decision for each email
    Check {
        /// Email addresses to check
        #[arg(required = true)]
        emails: Vec<String>,
    },
    /// Print the parsed admin and domain allowlists
    Policy,
    /// Print a freshly generated conversation id
    ConversationId,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hub_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, commands::CommandError> {
    let output = if cli.json {
        commands::Output::Json
    } else {
        commands::Output::Text
    };

    match cli.command {
        Commands::Check { emails } => {
            let policy = commands::load_policy();
            let all_allowed = commands::access::check(&policy, &emails, output)?;
            Ok(if all_allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Policy => {
            commands::access::policy(&commands::load_policy(), output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ConversationId => {
            commands::conversation::generate(output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
