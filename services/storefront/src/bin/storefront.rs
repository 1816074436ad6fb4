//! services/storefront/src/bin/storefront.rs

use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use storefront_core::domain::SignupRequest;
use storefront_lib::{app::Storefront, config::Config, error::AppError, ui::Toast};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "storefront", about = "Browse the store, manage your account and wishlist")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is reachable
    Health,
    /// Request a one-time code by SMS
    SendOtp { phone: String },
    /// Check a one-time code without logging in
    VerifyOtp { phone: String, otp: String },
    /// Log in with a phone number and one-time code
    Login { phone: String, otp: String },
    /// Create an account
    Signup {
        phone: String,
        otp: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        accept_terms: bool,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the current session
    Whoami,
    /// Browse the catalog
    Products {
        /// Number of pages to show
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand, Debug)]
enum WishlistAction {
    List,
    Add { product_id: String },
    Remove { product_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{}", AppError::from(e));
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Build the Client & Resolve Any Stored Session ---
    let storefront = Storefront::new(config);

    match run(&storefront, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            let toast = match &e {
                AppError::Client(client_error) => Toast::from_error(client_error),
                other => Toast::error(other.to_string()),
            };
            eprintln!("{}", toast);
            ExitCode::FAILURE
        }
    }
}

async fn run(storefront: &Storefront, command: Command) -> Result<(), AppError> {
    storefront.restore_session().await?;

    let mut stdout = std::io::stdout().lock();
    match command {
        Command::Health => writeln!(stdout, "{}", storefront.health().await?)?,
        Command::SendOtp { phone } => writeln!(stdout, "{}", storefront.send_otp(&phone).await?)?,
        Command::VerifyOtp { phone, otp } => {
            writeln!(stdout, "{}", storefront.verify_otp(&phone, &otp).await?)?
        }
        Command::Login { phone, otp } => {
            writeln!(stdout, "{}", storefront.login(&phone, &otp).await?)?
        }
        Command::Signup {
            phone,
            otp,
            name,
            email,
            accept_terms,
        } => {
            let request = SignupRequest {
                phone,
                otp,
                name,
                email,
                accept_terms,
            };
            writeln!(stdout, "{}", storefront.signup(request).await?)?
        }
        Command::Logout => writeln!(stdout, "{}", storefront.logout().await?)?,
        Command::Whoami => writeln!(stdout, "{}", storefront.whoami())?,
        Command::Products { pages } => {
            storefront.browse(pages.max(1), &mut stdout).await?;
        }
        Command::Wishlist { action } => match action {
            WishlistAction::List => writeln!(stdout, "{}", storefront.wishlist().await?)?,
            WishlistAction::Add { product_id } => {
                writeln!(stdout, "{}", storefront.add_to_wishlist(&product_id).await?)?
            }
            WishlistAction::Remove { product_id } => writeln!(
                stdout,
                "{}",
                storefront.remove_from_wishlist(&product_id).await?
            )?,
        },
    }
    Ok(())
}
