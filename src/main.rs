use std::sync::Arc;
use std::time::Duration;

use teloxide::Bot;
use tracing::info;
use tracing_subscriber::prelude::*;

use majordomo::bot::exchange::RatesClient;
use majordomo::bot::vps::VpsClient;
use majordomo::bot::{BotContext, MemorySessionStore, ReminderStore, TelegramClient, reminders};
use majordomo::config::Config;
use majordomo::server;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("majordomo.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting majordomo...");
    info!("Allowed user: {}", config.allowed_user_id);

    let bot = Bot::new(&config.bot_token);
    let telegram = TelegramClient::new(bot);

    let reminder_store = if config.reminders_enabled {
        info!(
            "Reminders enabled (sweep every {}s)",
            config.sweep_interval_secs
        );
        Some(ReminderStore::open(&config.data_dir.join("reminders.db")))
    } else {
        info!("Reminders disabled");
        None
    };

    let vps = VpsClient::new(config.bwh_veid, config.bwh_api_key.clone());
    let ctx = Arc::new(BotContext {
        telegram,
        sessions: Box::new(MemorySessionStore::new()),
        rates: RatesClient::new(),
        vps,
        reminders: reminder_store,
        config,
    });

    if ctx.reminders.is_some() {
        let sweep_ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(sweep_ctx.config.sweep_interval_secs));
            loop {
                interval.tick().await;
                if let Some(store) = sweep_ctx.reminders.as_ref() {
                    reminders::sweep(
                        &sweep_ctx.telegram,
                        store,
                        chrono::Utc::now().timestamp(),
                    )
                    .await;
                }
            }
        });
    }

    let app = server::build_router(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(&ctx.config.bind_addr)
        .await
        .expect("Failed to bind");
    info!("🌐 Listening on {}", ctx.config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
