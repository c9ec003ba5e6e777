//! Gateway traits for the collaborators of the ordering flow
//!
//! The state machine only talks to these traits:
//! - `CommerceGateway`: catalog, carts, customers and flow entries
//! - `FulfillmentDirectory`: pizzerias with their coordinates
//! - `Geocoder`: free-text address to coordinates
//! - `PaymentGateway`: invoice issuance
//!
//! Concrete adapters live in `moltin` and `geocoder`; the Telegram invoice
//! adapter lives next to the bot handlers.

pub mod geocoder;
pub mod moltin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::OrderResult;
use crate::money::Money;
use crate::pricing::{Coordinates, FulfillmentLocation};

pub use geocoder::YandexGeocoder;
pub use moltin::MoltinClient;

/// Identity of a chat user, also the key of their session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserKey(pub u64);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog item as the flow needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_id: Option<String>,
}

/// One line of a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier, distinct from the product id
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Value of the whole line
    pub value: Money,
}

/// Handle of an issued invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHandle(pub String);

/// Catalog, cart and record storage of the commerce backend
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    async fn list_products(&self) -> OrderResult<Vec<Product>>;

    async fn get_product(&self, product_id: &str) -> OrderResult<Product>;

    /// Public URL of a catalog image
    async fn get_image_url(&self, image_id: &str) -> OrderResult<String>;

    /// Create a cart owned by `owner` and return its id
    async fn create_cart(&self, owner: &str) -> OrderResult<String>;

    async fn add_line_item(&self, cart_id: &str, product_id: &str, quantity: u32) -> OrderResult<()>;

    async fn remove_line_item(&self, cart_id: &str, line_id: &str) -> OrderResult<()>;

    async fn get_cart_items(&self, cart_id: &str) -> OrderResult<Vec<LineItem>>;

    /// Cart total as computed by the backend
    async fn get_cart_total(&self, cart_id: &str) -> OrderResult<Money>;

    async fn create_customer_record(&self, owner: &str, email: &str) -> OrderResult<String>;

    /// Append a structured record to a backend flow
    async fn create_entry(&self, flow: &str, fields: &[(&str, Value)]) -> OrderResult<()>;
}

/// Source of fulfillment locations
#[async_trait]
pub trait FulfillmentDirectory: Send + Sync {
    async fn list_locations(&self) -> OrderResult<Vec<FulfillmentLocation>>;
}

/// Address lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address; `Ok(None)` when nothing matches
    async fn geocode(&self, address: &str) -> OrderResult<Option<Coordinates>>;
}

/// Invoice issuance through the payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Send an invoice for `amount` whose payload is the opaque `token`
    async fn issue_invoice(
        &self,
        user: UserKey,
        amount: Money,
        description: &str,
        token: &str,
    ) -> OrderResult<InvoiceHandle>;
}
