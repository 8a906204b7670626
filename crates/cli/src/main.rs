//! Marigold CLI - Database migrations and promotion management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! mg-cli migrate
//!
//! # Create a promotion
//! mg-cli promo create WELCOME10 -n "Welcome offer" -k fixed_amount -v 10 --min-order 40
//!
//! # List promotions, including inactive ones
//! mg-cli promo list --all
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `promo create|list|activate|deactivate|usage` - Manage promotions

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(author, version, about = "Marigold CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage promotions
    Promo {
        #[command(subcommand)]
        action: PromoAction,
    },
}

#[derive(Subcommand)]
enum PromoAction {
    /// Create a new promotion
    Create(commands::promo::CreateArgs),
    /// List promotions
    List {
        /// Include inactive promotions
        #[arg(short, long)]
        all: bool,
    },
    /// Make a promotion redeemable
    Activate {
        /// Promotion code
        code: String,
    },
    /// Stop a promotion from being applied
    Deactivate {
        /// Promotion code
        code: String,
    },
    /// Show recorded redemptions
    Usage {
        /// Promotion code
        code: String,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Promo { action } => match action {
            PromoAction::Create(args) => {
                commands::promo::create(args).await?;
            }
            PromoAction::List { all } => commands::promo::list(all).await?,
            PromoAction::Activate { code } => commands::promo::set_active(&code, true).await?,
            PromoAction::Deactivate { code } => {
                commands::promo::set_active(&code, false).await?;
            }
            PromoAction::Usage { code } => commands::promo::usage(&code).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "mg-cli", "promo", "create", "B2G1", "-n", "Buy two get one", "-k", "buy_x_get_y",
            "--buy", "2", "--get", "1", "--product", "4", "--product", "5",
        ]);
        assert!(matches!(
            cli,
            Ok(Cli {
                command: Commands::Promo {
                    action: PromoAction::Create(_)
                }
            })
        ));
    }
}
