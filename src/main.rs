use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use streamslots::bot;
use streamslots::config::{AppConfig, LogFormat};
use streamslots::db;
use streamslots::dialogue::WizardState;
use streamslots::health;

/// Initializes the logging subsystem
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    init_logging(config.log_format);

    info!("Starting streamslots bot");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    // Initialize database schema
    db::init_database_schema(&pool).await?;

    let health_addr = config.health_addr;
    tokio::spawn(async move {
        if let Err(e) = health::run_health_server(health_addr).await {
            error!(error = %e, "Health listener stopped");
        }
    });

    // Initialize the bot
    let bot = Bot::new(&config.bot_token);

    info!(
        renewal_window_days = config.bot.renewal_window_days,
        admin_chats = config.bot.admin_chat_ids.len(),
        "Bot initialized, starting dispatcher"
    );

    let message_branch = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<WizardState>, WizardState>()
        .endpoint(bot::message_handler);

    let callback_branch = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<WizardState>, WizardState>()
        .endpoint(bot::callback_handler);

    let handler = dptree::entry()
        .branch(message_branch)
        .branch(callback_branch);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            Arc::new(pool),
            Arc::new(config.bot),
            InMemStorage::<WizardState>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
