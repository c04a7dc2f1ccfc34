//! Shopfront CLI - quoting, persisted state inspection, and live sync.
//!
//! # Usage
//!
//! ```bash
//! # Price a cart file with ₹150 shipping at the default GST rate
//! shopfront quote --cart cart.json --shipping-cost 150
//!
//! # Print or reset a persisted store
//! shopfront state show cart
//! shopfront state clear wishlist
//!
//! # Follow real-time changes (admin room included)
//! shopfront watch --admin
//! ```
//!
//! # Commands
//!
//! - `quote` - Compute subtotal, shipping, tax, and total for cart lines
//! - `state` - Inspect or clear the stores persisted under `SHOPFRONT_STATE_DIR`
//! - `watch` - Connect to the real-time channel and log every reconciled change

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::state::StoreName;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a cart file
    Quote {
        /// JSON file holding cart lines (an array, or an object with `items`)
        #[arg(short, long)]
        cart: PathBuf,

        /// Flat shipping charge
        #[arg(short, long)]
        shipping_cost: Option<Decimal>,

        /// GST rate in percent
        #[arg(short, long)]
        gst: Option<Decimal>,
    },
    /// Inspect persisted stores
    State {
        /// Directory holding persisted stores (defaults to `SHOPFRONT_STATE_DIR`)
        #[arg(short = 'd', long)]
        state_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: StateAction,
    },
    /// Follow the real-time channel until interrupted
    Watch {
        /// Join the admin room and keep dashboard data current
        #[arg(short, long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print a store's persisted contents
    Show {
        #[arg(value_enum)]
        store: StoreName,
    },
    /// Delete a store's persisted contents
    Clear {
        #[arg(value_enum)]
        store: StoreName,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|v| !v.is_empty())?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_state=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Quote {
            cart,
            shipping_cost,
            gst,
        } => commands::quote::run(&cart, shipping_cost, gst)?,
        Commands::State { state_dir, action } => {
            let storage = commands::state::open(state_dir);
            match action {
                StateAction::Show { store } => commands::state::show(&storage, store)?,
                StateAction::Clear { store } => commands::state::clear(&storage, store),
            }
        }
        Commands::Watch { admin } => commands::watch::run(admin).await?,
    }
    Ok(())
}
