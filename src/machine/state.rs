//! Conversation states and inbound events

use crate::pricing::Coordinates;
use crate::session::DeliveryMode;

/// Where a user is in the ordering flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
    Menu,
    ProductList,
    ProductDetail,
    Cart,
    AwaitingEmail,
    AwaitingLocation,
    DeliveryOffer,
    AwaitingPaymentPrecheck,
    PaymentSucceeded,
    /// Cancelled or completed; the session has been discarded
    Terminal,
}

// Choice ids carried by buttons
pub const NEXT_PAGE: &str = "next";
pub const PREV_PAGE: &str = "prev";
pub const VIEW_CART: &str = "cart";
pub const BACK_TO_MENU: &str = "menu";
pub const ADD_TO_CART: &str = "add";
pub const CHECKOUT: &str = "checkout";
pub const BACK: &str = "back";
pub const PICKUP: &str = "pickup";
pub const DELIVERY: &str = "delivery";
pub const PRODUCT_PREFIX: &str = "product:";
pub const REMOVE_PREFIX: &str = "remove:";

/// Something the user did
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `/start`, also used to refresh the catalog
    Start,
    /// `/cancel`
    Cancel,
    NextPage,
    PrevPage,
    SelectProduct(String),
    AddToCart,
    ViewCart,
    /// Remove the cart line with this id
    RemoveLine(String),
    BackToMenu,
    Checkout,
    Back,
    Text(String),
    Location(Coordinates),
    ChooseMode(DeliveryMode),
    /// Payment provider asks to confirm the invoice payload
    PreCheckout { payload: String },
    /// Payment provider reports a completed payment
    PaymentConfirmed { payload: String },
}

/// Event category used as transition table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Cancel,
    NextPage,
    PrevPage,
    SelectProduct,
    AddToCart,
    ViewCart,
    RemoveLine,
    BackToMenu,
    Checkout,
    Back,
    Text,
    Location,
    ChooseMode,
    PreCheckout,
    PaymentConfirmed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::Cancel => EventKind::Cancel,
            Event::NextPage => EventKind::NextPage,
            Event::PrevPage => EventKind::PrevPage,
            Event::SelectProduct(_) => EventKind::SelectProduct,
            Event::AddToCart => EventKind::AddToCart,
            Event::ViewCart => EventKind::ViewCart,
            Event::RemoveLine(_) => EventKind::RemoveLine,
            Event::BackToMenu => EventKind::BackToMenu,
            Event::Checkout => EventKind::Checkout,
            Event::Back => EventKind::Back,
            Event::Text(_) => EventKind::Text,
            Event::Location(_) => EventKind::Location,
            Event::ChooseMode(_) => EventKind::ChooseMode,
            Event::PreCheckout { .. } => EventKind::PreCheckout,
            Event::PaymentConfirmed { .. } => EventKind::PaymentConfirmed,
        }
    }

    /// Parse the id of a pressed button
    pub fn from_choice_id(id: &str) -> Option<Event> {
        if let Some(product_id) = id.strip_prefix(PRODUCT_PREFIX) {
            return (!product_id.is_empty()).then(|| Event::SelectProduct(product_id.to_string()));
        }
        if let Some(line_id) = id.strip_prefix(REMOVE_PREFIX) {
            return (!line_id.is_empty()).then(|| Event::RemoveLine(line_id.to_string()));
        }

        match id {
            NEXT_PAGE => Some(Event::NextPage),
            PREV_PAGE => Some(Event::PrevPage),
            VIEW_CART => Some(Event::ViewCart),
            BACK_TO_MENU => Some(Event::BackToMenu),
            ADD_TO_CART => Some(Event::AddToCart),
            CHECKOUT => Some(Event::Checkout),
            BACK => Some(Event::Back),
            PICKUP => Some(Event::ChooseMode(DeliveryMode::Pickup)),
            DELIVERY => Some(Event::ChooseMode(DeliveryMode::Delivery)),
            _ => None,
        }
    }

    /// Parse a text message, recognising bot commands
    pub fn from_text(text: &str) -> Event {
        let trimmed = text.trim();
        let command = trimmed
            .split_whitespace()
            .next()
            .and_then(|word| word.split('@').next())
            .unwrap_or("");

        match command {
            "/start" => Event::Start,
            "/cancel" => Event::Cancel,
            _ => Event::Text(trimmed.to_string()),
        }
    }
}
