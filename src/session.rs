//! Session module holding per-user conversation data.
//!
//! A `Session` is a plain value owned by one user. The `SessionStore` keeps
//! sessions in memory keyed by user and delegates the one durable field, the
//! cart id, to a `CartRegistry`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::OrderResult;
use crate::gateway::{Product, UserKey};
use crate::machine::OrderState;
use crate::money::Money;
use crate::paginator::Paginator;
use crate::pricing::{Coordinates, DeliveryTier, NearestLocation};

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("e-mail pattern is valid");
}

/// Maximum accepted e-mail length
const MAX_EMAIL_LEN: usize = 254;

/// How the customer receives the order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Pickup,
    Delivery,
}

/// Per-user conversation data
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: OrderState,
    /// Durable: mirrored in the `CartRegistry`
    pub cart_id: Option<String>,
    pub product_pages: Option<Paginator<Product>>,
    pub selected_product_id: Option<String>,
    pub cart_total: Option<Money>,
    pub delivery_email: Option<String>,
    pub customer_coordinates: Option<Coordinates>,
    pub chosen_location: Option<NearestLocation>,
    pub delivery_tier: Option<DeliveryTier>,
    pub delivery_price: Option<Money>,
    pub delivery_mode: Option<DeliveryMode>,
    /// Opaque payload of the invoice currently awaiting payment
    pub invoice_token: Option<String>,
    pub language_code: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: OrderState::Menu,
            cart_id: None,
            product_pages: None,
            selected_product_id: None,
            cart_total: None,
            delivery_email: None,
            customer_coordinates: None,
            chosen_location: None,
            delivery_tier: None,
            delivery_price: None,
            delivery_mode: None,
            invoice_token: None,
            language_code: None,
        }
    }
}

impl Session {
    pub fn new(language_code: Option<String>) -> Self {
        Self {
            language_code,
            ..Default::default()
        }
    }

    /// Drop every per-turn field, keeping the cart id and language
    pub fn reset_ephemeral(&mut self) {
        *self = Self {
            state: self.state,
            cart_id: self.cart_id.take(),
            language_code: self.language_code.take(),
            ..Default::default()
        };
    }

    pub fn language(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

/// Validates an e-mail address typed by the customer
pub fn validate_email(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("email-empty");
    }

    if trimmed.len() > MAX_EMAIL_LEN || !EMAIL_PATTERN.is_match(trimmed) {
        return Err("email-invalid");
    }

    Ok(trimmed.to_string())
}

/// Durable storage of the cart id per user
#[async_trait]
pub trait CartRegistry: Send + Sync {
    async fn cart_id(&self, user: UserKey) -> OrderResult<Option<String>>;

    async fn save_cart_id(&self, user: UserKey, cart_id: &str) -> OrderResult<()>;
}

/// Cart registry kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryCartRegistry {
    carts: Mutex<HashMap<UserKey, String>>,
}

impl InMemoryCartRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRegistry for InMemoryCartRegistry {
    async fn cart_id(&self, user: UserKey) -> OrderResult<Option<String>> {
        Ok(self
            .carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned())
    }

    async fn save_cart_id(&self, user: UserKey, cart_id: &str) -> OrderResult<()> {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, cart_id.to_string());
        Ok(())
    }
}

/// Sessions keyed by user
///
/// Each user's events are processed serially, so a session is loaded,
/// transformed and saved back without holding the lock across awaits.
/// Different users never contend beyond the short map lock; the last
/// writer wins.
pub struct SessionStore {
    sessions: Mutex<HashMap<UserKey, Session>>,
    carts: Arc<dyn CartRegistry>,
}

impl SessionStore {
    pub fn new(carts: Arc<dyn CartRegistry>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            carts,
        }
    }

    pub fn load(&self, user: UserKey) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned()
    }

    pub fn save(&self, user: UserKey, session: Session) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, session);
    }

    /// Forget the in-memory session; the durable cart id is kept
    pub fn discard(&self, user: UserKey) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub async fn durable_cart_id(&self, user: UserKey) -> OrderResult<Option<String>> {
        self.carts.cart_id(user).await
    }

    pub async fn persist_cart_id(&self, user: UserKey, cart_id: &str) -> OrderResult<()> {
        self.carts.save_cart_id(user, cart_id).await
    }
}
