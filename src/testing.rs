//! In-memory collaborators for exercising the state machine without a
//! network, shared by unit and integration tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::FlowConfig;
use crate::errors::{OrderError, OrderResult};
use crate::gateway::{
    CommerceGateway, FulfillmentDirectory, Geocoder, InvoiceHandle, LineItem, PaymentGateway,
    Product, UserKey,
};
use crate::machine::{OrderContext, OrderMachine};
use crate::money::Money;
use crate::pricing::{Coordinates, FulfillmentLocation, EARTH_RADIUS_KM};
use crate::session::{CartRegistry, InMemoryCartRegistry, SessionStore};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable() -> OrderError {
    OrderError::GatewayUnavailable("simulated outage".to_string())
}

/// Catalog of `count` pizzas priced 100.00, 200.00, ...
pub fn sample_products(count: usize) -> Vec<Product> {
    (1..=count)
        .map(|n| Product {
            id: format!("pizza-{n}"),
            name: format!("Pizza {n}"),
            description: format!("Delicious pizza number {n}"),
            price: Money::from_major(100 * n as i64),
            image_id: (n % 2 == 1).then(|| format!("image-{n}")),
        })
        .collect()
}

/// Point `km` kilometres due north of `origin`
pub fn point_north_of(origin: Coordinates, km: f64) -> Coordinates {
    Coordinates::new(
        origin.latitude + (km / EARTH_RADIUS_KM).to_degrees(),
        origin.longitude,
    )
}

/// Commerce backend keeping carts in memory
#[derive(Default)]
pub struct MockCommerce {
    products: Vec<Product>,
    carts: Mutex<HashMap<String, Vec<LineItem>>>,
    customers: Mutex<Vec<(String, String)>>,
    entries: Mutex<Vec<(String, Vec<(String, Value)>)>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
    failing_customers: AtomicBool,
}

impl MockCommerce {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            ..Default::default()
        }
    }

    /// Make every call fail as if the backend were down
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_customers(&self, failing: bool) {
        self.failing_customers.store(failing, Ordering::SeqCst);
    }

    pub fn carts_created(&self) -> usize {
        lock(&self.carts).len()
    }

    pub fn customers(&self) -> Vec<(String, String)> {
        lock(&self.customers).clone()
    }

    pub fn entries(&self) -> Vec<(String, Vec<(String, Value)>)> {
        lock(&self.entries).clone()
    }

    pub fn items(&self, cart_id: &str) -> Vec<LineItem> {
        lock(&self.carts).get(cart_id).cloned().unwrap_or_default()
    }

    fn check(&self) -> OrderResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn product(&self, product_id: &str) -> OrderResult<&Product> {
        self.products
            .iter()
            .find(|product| product.id == product_id)
            .ok_or_else(|| OrderError::NotFound(format!("product {product_id}")))
    }
}

#[async_trait]
impl CommerceGateway for MockCommerce {
    async fn list_products(&self) -> OrderResult<Vec<Product>> {
        self.check()?;
        Ok(self.products.clone())
    }

    async fn get_product(&self, product_id: &str) -> OrderResult<Product> {
        self.check()?;
        self.product(product_id).cloned()
    }

    async fn get_image_url(&self, image_id: &str) -> OrderResult<String> {
        self.check()?;
        Ok(format!("https://images.example/{image_id}.png"))
    }

    async fn create_cart(&self, _owner: &str) -> OrderResult<String> {
        self.check()?;
        let cart_id = self.next_id("cart");
        lock(&self.carts).insert(cart_id.clone(), Vec::new());
        Ok(cart_id)
    }

    async fn add_line_item(&self, cart_id: &str, product_id: &str, quantity: u32) -> OrderResult<()> {
        self.check()?;
        let product = self.product(product_id)?.clone();
        let line_id = self.next_id("line");

        let mut carts = lock(&self.carts);
        let items = carts
            .get_mut(cart_id)
            .ok_or_else(|| OrderError::NotFound(format!("cart {cart_id}")))?;

        match items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => items.push(LineItem {
                id: line_id,
                product_id: product.id.clone(),
                name: product.name.clone(),
                quantity,
                value: Money::ZERO,
            }),
        }
        for item in items.iter_mut().filter(|item| item.product_id == product_id) {
            item.value = Money::from_minor(product.price.minor_units() * i64::from(item.quantity));
        }
        Ok(())
    }

    async fn remove_line_item(&self, cart_id: &str, line_id: &str) -> OrderResult<()> {
        self.check()?;
        let mut carts = lock(&self.carts);
        let items = carts
            .get_mut(cart_id)
            .ok_or_else(|| OrderError::NotFound(format!("cart {cart_id}")))?;
        items.retain(|item| item.id != line_id);
        Ok(())
    }

    async fn get_cart_items(&self, cart_id: &str) -> OrderResult<Vec<LineItem>> {
        self.check()?;
        lock(&self.carts)
            .get(cart_id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(format!("cart {cart_id}")))
    }

    async fn get_cart_total(&self, cart_id: &str) -> OrderResult<Money> {
        let items = self.get_cart_items(cart_id).await?;
        Ok(items.iter().fold(Money::ZERO, |total, item| total + item.value))
    }

    async fn create_customer_record(&self, owner: &str, email: &str) -> OrderResult<String> {
        self.check()?;
        if self.failing_customers.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        lock(&self.customers).push((owner.to_string(), email.to_string()));
        Ok(self.next_id("customer"))
    }

    async fn create_entry(&self, flow: &str, fields: &[(&str, Value)]) -> OrderResult<()> {
        self.check()?;
        let fields = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        lock(&self.entries).push((flow.to_string(), fields));
        Ok(())
    }
}

/// Fixed set of pizzerias
#[derive(Default)]
pub struct MockDirectory {
    locations: Vec<FulfillmentLocation>,
    failing: AtomicBool,
}

impl MockDirectory {
    pub fn new(locations: Vec<FulfillmentLocation>) -> Self {
        Self {
            locations,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FulfillmentDirectory for MockDirectory {
    async fn list_locations(&self) -> OrderResult<Vec<FulfillmentLocation>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.locations.clone())
    }
}

/// Geocoder answering from a fixed address book
#[derive(Default)]
pub struct MockGeocoder {
    addresses: Mutex<HashMap<String, Coordinates>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: &str, coordinates: Coordinates) {
        lock(&self.addresses).insert(address.to_string(), coordinates);
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> OrderResult<Option<Coordinates>> {
        Ok(lock(&self.addresses).get(address.trim()).copied())
    }
}

/// Invoice as the payment gateway received it
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedInvoice {
    pub user: UserKey,
    pub amount: Money,
    pub description: String,
    pub token: String,
}

/// Payment gateway recording issued invoices
#[derive(Default)]
pub struct MockPayments {
    invoices: Mutex<Vec<IssuedInvoice>>,
    failing: AtomicBool,
}

impl MockPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn invoices(&self) -> Vec<IssuedInvoice> {
        lock(&self.invoices).clone()
    }

    pub fn last_token(&self) -> Option<String> {
        lock(&self.invoices).last().map(|invoice| invoice.token.clone())
    }
}

#[async_trait]
impl PaymentGateway for MockPayments {
    async fn issue_invoice(
        &self,
        user: UserKey,
        amount: Money,
        description: &str,
        token: &str,
    ) -> OrderResult<InvoiceHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut invoices = lock(&self.invoices);
        invoices.push(IssuedInvoice {
            user,
            amount,
            description: description.to_string(),
            token: token.to_string(),
        });
        Ok(InvoiceHandle(format!("invoice-{}", invoices.len())))
    }
}

/// A machine wired to mocks, with handles on every mock
pub struct Harness {
    pub machine: OrderMachine,
    pub commerce: Arc<MockCommerce>,
    pub directory: Arc<MockDirectory>,
    pub geocoder: Arc<MockGeocoder>,
    pub payments: Arc<MockPayments>,
    pub carts: Arc<InMemoryCartRegistry>,
    pub sessions: Arc<SessionStore>,
}

impl Harness {
    pub fn new(products: Vec<Product>, locations: Vec<FulfillmentLocation>) -> OrderResult<Self> {
        Self::with_config(products, locations, FlowConfig::default())
    }

    pub fn with_config(
        products: Vec<Product>,
        locations: Vec<FulfillmentLocation>,
        config: FlowConfig,
    ) -> OrderResult<Self> {
        let commerce = Arc::new(MockCommerce::new(products));
        let directory = Arc::new(MockDirectory::new(locations));
        let geocoder = Arc::new(MockGeocoder::new());
        let payments = Arc::new(MockPayments::new());
        let carts = Arc::new(InMemoryCartRegistry::new());
        let registry: Arc<dyn CartRegistry> = carts.clone();
        let sessions = Arc::new(SessionStore::new(registry));

        let machine = OrderMachine::new(OrderContext {
            commerce: commerce.clone(),
            directory: directory.clone(),
            geocoder: geocoder.clone(),
            payments: payments.clone(),
            sessions: sessions.clone(),
            config,
        })?;

        Ok(Self {
            machine,
            commerce,
            directory,
            geocoder,
            payments,
            carts,
            sessions,
        })
    }
}
