//! Commerce backend adapter speaking the Moltin (Elastic Path) REST API
//!
//! Every request carries the bearer token from the shared `TokenCell` and
//! passes through the circuit breaker. Non-success statuses become
//! `OrderError`s; nothing is retried here.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{CommerceGateway, FulfillmentDirectory, LineItem, Product};
use crate::auth::TokenCell;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::GatewayConfig;
use crate::errors::{OrderError, OrderResult};
use crate::money::Money;
use crate::pricing::{Coordinates, FulfillmentLocation};

const CURRENCY_HEADER: &str = "X-MOLTIN-CURRENCY";
const ENTRIES_PAGE_LIMIT: &str = "100";

/// HTTP client for the commerce backend
pub struct MoltinClient {
    http: reqwest::Client,
    base_url: String,
    currency: String,
    fulfillment_flow: String,
    token: TokenCell,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl MoltinClient {
    pub fn new(
        http: reqwest::Client,
        config: &GatewayConfig,
        token: TokenCell,
        currency: impl Into<String>,
        fulfillment_flow: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            currency: currency.into(),
            fulfillment_flow: fulfillment_flow.into(),
            token,
            breaker: CircuitBreaker::new(config),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    async fn request(&self, method: Method, path: &str) -> OrderResult<RequestBuilder> {
        let token = self.token.current().await.ok_or_else(|| {
            OrderError::GatewayUnavailable("backend access token not available yet".to_string())
        })?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .bearer_auth(token))
    }

    /// Send a request and return the decoded JSON body
    async fn send(&self, builder: RequestBuilder) -> OrderResult<Value> {
        if self.breaker.is_open() {
            return Err(OrderError::GatewayUnavailable(
                "commerce backend circuit open".to_string(),
            ));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "Commerce backend request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.breaker.record_failure();
        } else {
            self.breaker.record_success();
        }

        match status {
            s if s.is_success() => {
                debug!(status = %s, url = %response.url(), "Commerce backend call succeeded");
                if s == StatusCode::NO_CONTENT {
                    return Ok(Value::Null);
                }
                let bytes = response.bytes().await?;
                if bytes.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(serde_json::from_slice(&bytes)?)
                }
            }
            StatusCode::NOT_FOUND => Err(OrderError::NotFound(response.url().path().to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                OrderError::GatewayUnavailable(format!("backend rejected token ({status})")),
            ),
            other => Err(OrderError::GatewayUnavailable(format!(
                "backend answered {other}"
            ))),
        }
    }

    async fn send_data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> OrderResult<T> {
        let body = self.send(builder).await?;
        let envelope: DataEnvelope<T> = serde_json::from_value(body)?;
        Ok(envelope.data)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    price: Vec<WirePrice>,
    #[serde(default)]
    relationships: Option<WireRelationships>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct WireRelationships {
    main_image: Option<DataEnvelope<IdOnly>>,
}

impl From<WireProduct> for Product {
    fn from(wire: WireProduct) -> Self {
        Product {
            id: wire.id,
            name: wire.name,
            description: wire.description,
            price: Money::from_minor(wire.price.first().map(|p| p.amount).unwrap_or(0)),
            image_id: wire
                .relationships
                .and_then(|r| r.main_image)
                .map(|image| image.data.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireFile {
    link: WireLink,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct WireCartItem {
    id: String,
    #[serde(default)]
    product_id: String,
    name: String,
    quantity: u32,
    meta: WireItemMeta,
}

#[derive(Debug, Deserialize)]
struct WireItemMeta {
    display_price: WireDisplayPrice<WireValueWrapper>,
}

#[derive(Debug, Deserialize)]
struct WireValueWrapper {
    value: WireAmount,
}

#[derive(Debug, Deserialize)]
struct WireDisplayPrice<T> {
    with_tax: T,
}

#[derive(Debug, Deserialize)]
struct WireAmount {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct WireCart {
    meta: WireCartMeta,
}

#[derive(Debug, Deserialize)]
struct WireCartMeta {
    display_price: WireDisplayPrice<WireAmount>,
}

impl From<WireCartItem> for LineItem {
    fn from(wire: WireCartItem) -> Self {
        LineItem {
            id: wire.id,
            product_id: wire.product_id,
            name: wire.name,
            quantity: wire.quantity,
            value: Money::from_minor(wire.meta.display_price.with_tax.value.amount),
        }
    }
}

/// Convert a flow entry of the fulfillment flow into a location
///
/// Coordinates may arrive as numbers or numeric strings depending on how
/// the field was declared in the backend.
pub fn parse_location_entry(entry: &Value) -> Option<FulfillmentLocation> {
    let address = entry.get("address")?.as_str()?.to_string();
    let latitude = lenient_f64(entry.get("latitude")?)?;
    let longitude = lenient_f64(entry.get("longitude")?)?;
    let agent = entry.get("deliveryman-telegram-id")?;
    let agent_chat_id = agent
        .as_i64()
        .or_else(|| agent.as_str().and_then(|s| s.trim().parse().ok()))?;

    Some(FulfillmentLocation {
        address,
        coordinates: Coordinates::new(latitude, longitude),
        agent_chat_id,
    })
}

fn lenient_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// ============================================================================
// Gateway implementations
// ============================================================================

#[async_trait]
impl CommerceGateway for MoltinClient {
    async fn list_products(&self) -> OrderResult<Vec<Product>> {
        let request = self.request(Method::GET, "/v2/products").await?;
        let products: Vec<WireProduct> = self.send_data(request).await?;
        Ok(products.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, product_id: &str) -> OrderResult<Product> {
        let request = self
            .request(Method::GET, &format!("/v2/products/{product_id}"))
            .await?;
        let product: WireProduct = self.send_data(request).await?;
        Ok(product.into())
    }

    async fn get_image_url(&self, image_id: &str) -> OrderResult<String> {
        let request = self
            .request(Method::GET, &format!("/v2/files/{image_id}"))
            .await?;
        let file: WireFile = self.send_data(request).await?;
        Ok(file.link.href)
    }

    async fn create_cart(&self, owner: &str) -> OrderResult<String> {
        let request = self.request(Method::POST, "/v2/carts").await?.json(&json!({
            "data": {
                "name": owner,
                "description": format!("cart of user {owner}"),
            }
        }));
        let cart: IdOnly = self.send_data(request).await?;
        Ok(cart.id)
    }

    async fn add_line_item(&self, cart_id: &str, product_id: &str, quantity: u32) -> OrderResult<()> {
        let request = self
            .request(Method::POST, &format!("/v2/carts/{cart_id}/items"))
            .await?
            .header(CURRENCY_HEADER, &self.currency)
            .json(&json!({
                "data": {
                    "id": product_id,
                    "type": "cart_item",
                    "quantity": quantity,
                }
            }));
        self.send(request).await?;
        Ok(())
    }

    async fn remove_line_item(&self, cart_id: &str, line_id: &str) -> OrderResult<()> {
        let request = self
            .request(Method::DELETE, &format!("/v2/carts/{cart_id}/items/{line_id}"))
            .await?;
        self.send(request).await?;
        Ok(())
    }

    async fn get_cart_items(&self, cart_id: &str) -> OrderResult<Vec<LineItem>> {
        let request = self
            .request(Method::GET, &format!("/v2/carts/{cart_id}/items"))
            .await?;
        let items: Vec<WireCartItem> = self.send_data(request).await?;
        Ok(items.into_iter().map(LineItem::from).collect())
    }

    async fn get_cart_total(&self, cart_id: &str) -> OrderResult<Money> {
        let request = self
            .request(Method::GET, &format!("/v2/carts/{cart_id}"))
            .await?;
        let cart: WireCart = self.send_data(request).await?;
        Ok(Money::from_minor(cart.meta.display_price.with_tax.amount))
    }

    async fn create_customer_record(&self, owner: &str, email: &str) -> OrderResult<String> {
        let request = self.request(Method::POST, "/v2/customers").await?.json(&json!({
            "data": {
                "type": "customer",
                "name": owner,
                "email": email,
            }
        }));
        let customer: IdOnly = self.send_data(request).await?;
        Ok(customer.id)
    }

    async fn create_entry(&self, flow: &str, fields: &[(&str, Value)]) -> OrderResult<()> {
        let mut data = Map::new();
        data.insert("type".to_string(), Value::from("entry"));
        for (slug, value) in fields {
            data.insert((*slug).to_string(), value.clone());
        }

        let request = self
            .request(Method::POST, &format!("/v2/flows/{flow}/entries"))
            .await?
            .json(&json!({ "data": data }));
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl FulfillmentDirectory for MoltinClient {
    async fn list_locations(&self) -> OrderResult<Vec<FulfillmentLocation>> {
        let request = self
            .request(
                Method::GET,
                &format!("/v2/flows/{}/entries", self.fulfillment_flow),
            )
            .await?
            .query(&[("page[limit]", ENTRIES_PAGE_LIMIT)]);
        let entries: Vec<Value> = self.send_data(request).await?;

        let locations: Vec<FulfillmentLocation> = entries
            .iter()
            .filter_map(|entry| {
                let parsed = parse_location_entry(entry);
                if parsed.is_none() {
                    warn!(entry = %entry, "Skipping malformed fulfillment location entry");
                }
                parsed
            })
            .collect();
        Ok(locations)
    }
}
