mod cleanup;
mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use murmur_api::token::TokenCodec;
use murmur_api::{AppState, AppStateInner};
use murmur_db::Database;
use murmur_notify::{HttpMailer, LogMailer, Outbox, run_worker};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "murmur=debug,murmur_api=debug,murmur_db=info,murmur_notify=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    let tokens = TokenCodec::new(config.tokens)?;

    // Email outbox, drained by a single worker
    let (outbox, rx) = Outbox::channel();
    match config.mail_relay {
        Some(relay) => {
            info!("Delivering email through relay {}", relay.url);
            let mailer = HttpMailer::new(relay.url, relay.token, config.mail_from)?;
            tokio::spawn(run_worker(rx, mailer));
        }
        None => {
            info!("No mail relay configured, emails will be logged");
            tokio::spawn(run_worker(rx, LogMailer));
        }
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens,
        field_key: config.field_key,
        outbox,
        admin_emails: config.admin_emails,
    });

    tokio::spawn(cleanup::run_purge_loop(
        state.clone(),
        config.purge_interval_secs,
    ));

    let app = murmur_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Murmur server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
