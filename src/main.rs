use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midimart::config::Config;
use midimart::db::{create_pool, init_db, queries, AppState};
use midimart::email::ResendMailer;
use midimart::handlers;
use midimart::models::CreateMidi;
use midimart::payments::{StripeClient, StripeConfig};

#[derive(Parser, Debug)]
#[command(name = "midimart")]
#[command(about = "Storefront backend for digital MIDI goods")]
struct Cli {
    /// Seed the database with dev catalog data (dev mode only)
    #[arg(long)]
    seed: bool,
}

/// Seeds the catalog with dev data for testing the buy flow end to end.
/// Only runs in dev mode and when the catalog is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_midis(&conn).expect("Failed to count catalog items");
    if count > 0 {
        tracing::info!("Catalog already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev catalog data");

    let seeds = [
        ("Night Drive", 499, "Am", "minor", 98, "synthwave"),
        ("Sunset Keys", 399, "C", "major", 120, "lofi"),
        ("Basement Groove", 599, "F#m", "minor", 140, "house"),
    ];

    for (name, price_cents, key, scale, bpm, genre) in seeds {
        let midi = queries::create_midi(
            &conn,
            &CreateMidi {
                name: name.to_string(),
                price_cents,
                key: Some(key.to_string()),
                scale: Some(scale.to_string()),
                bpm: Some(bpm),
                genre: Some(genre.to_string()),
                preview_url: format!("https://assets.midimart.local/previews/{}.mp3", name),
                download_url: format!("https://assets.midimart.local/files/{}.mid", name),
                hidden: false,
            },
        )
        .expect("Failed to seed catalog item");
        tracing::info!("Seeded: {} ({})", midi.name, midi.id);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "midimart=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set - all webhooks will be rejected");
    }

    // Create database connection pool and initialize schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let stripe = StripeClient::new(&StripeConfig {
        secret_key: config.stripe_secret_key.clone(),
        webhook_secret: config.stripe_webhook_secret.clone(),
    });

    let mailer = Arc::new(ResendMailer::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
        stripe,
        mailer,
        admin_email: config.admin_email.clone(),
        admin_api_key: config.admin_api_key.clone(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set MIDIMART_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("midimart server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
