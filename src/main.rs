use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pizzeria_bot::auth::{spawn_token_renewal, ClientCredentials, TokenCell};
use pizzeria_bot::bot::{self, TelegramPayments};
use pizzeria_bot::config::AppConfig;
use pizzeria_bot::db::{self, PgCartRegistry};
use pizzeria_bot::gateway::{MoltinClient, YandexGeocoder};
use pizzeria_bot::localization::{init_localization, t_lang};
use pizzeria_bot::machine::{OrderContext, OrderMachine};
use pizzeria_bot::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pizzeria_bot=info,teloxide=warn")),
        )
        .init();

    info!("Starting Pizzeria Telegram Bot");

    let config = AppConfig::from_env()?;

    init_localization()?;

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    db::init_database_schema(&pool).await?;

    let http = reqwest::Client::new();

    // Backend token, renewed in the background for the lifetime of the process
    let token = TokenCell::new();
    spawn_token_renewal(
        http.clone(),
        config.gateway.base_url.clone(),
        ClientCredentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        },
        token.clone(),
        config.gateway.token_refresh_margin_secs,
        Duration::from_secs(config.gateway.token_retry_delay_secs),
    );

    let bot = Bot::new(&config.telegram_token);

    let moltin = Arc::new(MoltinClient::new(
        http.clone(),
        &config.gateway,
        token,
        config.flow.currency.clone(),
        config.flow.fulfillment_flow.clone(),
    ));
    let payments = TelegramPayments::new(
        bot.clone(),
        config.payment_provider_token.clone(),
        config.flow.currency.clone(),
        t_lang("invoice-title", None),
    );

    let machine = Arc::new(OrderMachine::new(OrderContext {
        commerce: moltin.clone(),
        directory: moltin,
        geocoder: Arc::new(YandexGeocoder::new(
            http,
            config.geocoder_base_url.clone(),
            config.geocoder_api_key.clone(),
        )),
        payments: Arc::new(payments),
        sessions: Arc::new(SessionStore::new(Arc::new(PgCartRegistry::new(pool)))),
        config: config.flow.clone(),
    })?);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler))
        .branch(Update::filter_pre_checkout_query().endpoint(bot::pre_checkout_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![machine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
