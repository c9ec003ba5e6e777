use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::errors::{OrderError, OrderResult};
use crate::gateway::UserKey;
use crate::session::CartRegistry;

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_carts (
            telegram_id BIGINT PRIMARY KEY,
            cart_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_carts table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Read the cart id stored for a Telegram user
pub async fn get_cart_id(pool: &PgPool, telegram_id: i64) -> Result<Option<String>> {
    debug!(telegram_id, "Reading cart id");

    let row = sqlx::query("SELECT cart_id FROM user_carts WHERE telegram_id = $1")
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read cart id")?;

    Ok(row.map(|row| row.get::<String, _>("cart_id")))
}

/// Store (or replace) the cart id of a Telegram user
pub async fn upsert_cart_id(pool: &PgPool, telegram_id: i64, cart_id: &str) -> Result<()> {
    info!(telegram_id, cart_id = %cart_id, "Persisting cart id");

    sqlx::query(
        "INSERT INTO user_carts (telegram_id, cart_id) VALUES ($1, $2)
         ON CONFLICT (telegram_id)
         DO UPDATE SET cart_id = EXCLUDED.cart_id, updated_at = NOW()",
    )
    .bind(telegram_id)
    .bind(cart_id)
    .execute(pool)
    .await
    .context("Failed to upsert cart id")?;

    Ok(())
}

/// Postgres-backed durable session fields
#[derive(Clone)]
pub struct PgCartRegistry {
    pool: PgPool,
}

impl PgCartRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Telegram ids fit in 52 bits, so the cast to BIGINT is lossless
fn telegram_id(user: UserKey) -> i64 {
    user.0 as i64
}

#[async_trait]
impl CartRegistry for PgCartRegistry {
    async fn cart_id(&self, user: UserKey) -> OrderResult<Option<String>> {
        get_cart_id(&self.pool, telegram_id(user))
            .await
            .map_err(storage_error)
    }

    async fn save_cart_id(&self, user: UserKey, cart_id: &str) -> OrderResult<()> {
        upsert_cart_id(&self.pool, telegram_id(user), cart_id)
            .await
            .map_err(storage_error)
    }
}

fn storage_error(err: anyhow::Error) -> OrderError {
    OrderError::GatewayUnavailable(format!("{err:#}"))
}
