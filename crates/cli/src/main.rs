//! Attireburg CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! attireburg-cli migrate
//!
//! # Print the production readiness report
//! attireburg-cli check
//!
//! # Issue an admin access token for scripts
//! attireburg-cli token -u 1 -e ops@attireburg.de -r admin
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "attireburg-cli")]
#[command(author, version, about = "Attireburg back-office CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run the production readiness checks against the current environment
    Check,
    /// Issue an access token
    Token {
        /// User id (`sub` claim)
        #[arg(short, long)]
        user_id: i32,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Role (`customer` or `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,

        /// Hours until the token expires
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Check => {
            if !commands::check::run().await? {
                std::process::exit(2);
            }
        }
        Commands::Token {
            user_id,
            email,
            role,
            hours,
        } => {
            let token = commands::token::issue(user_id, &email, &role, hours)?;
            #[allow(clippy::print_stdout)]
            {
                println!("{token}");
            }
        }
    }
    Ok(())
}
