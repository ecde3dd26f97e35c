use anyhow::Context;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use ticketbot::core::bot::channels::telegram::TelegramAdapter;
use ticketbot::core::config::AppConfig;
use ticketbot::core::session::InMemoryConversationStore;
use ticketbot::core::shared::utils::{create_conn, run_migrations};
use ticketbot::maintenance::RetentionJanitor;
use ticketbot::telegram::run_polling;
use ticketbot::tickets::store::PgTicketStore;
use ticketbot::SupportBot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = create_conn(&config.database.url).context("Failed to connect to database")?;
    run_migrations(&pool)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database ready");

    let store = Arc::new(PgTicketStore::new(pool, config.store_timeout()));
    let adapter = Arc::new(TelegramAdapter::new(config.bot.token.clone()));

    match adapter.get_me().await {
        Ok(me) => info!(
            "Authorized on account @{}",
            me.get("username").and_then(|u| u.as_str()).unwrap_or("unknown")
        ),
        Err(e) => error!("Failed to fetch bot account: {}", e),
    }

    let _janitor = RetentionJanitor::new(store.clone()).spawn();

    let bot = SupportBot::new(
        store,
        adapter.clone(),
        Arc::new(InMemoryConversationStore::new()),
        config.admin_id,
    );

    info!("Support bot started, administrator is {}", config.admin_id);
    tokio::select! {
        _ = run_polling(&adapter, &bot, config.poll_timeout()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutting down");
        }
    }

    Ok(())
}
