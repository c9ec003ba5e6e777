//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Maps text, location and payment messages to flow events
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `payment_handler`: Answers pre-checkout queries and issues invoices
//! - `responder`: Renders machine directives as Telegram messages
//! - `ui_builder`: Creates keyboards

pub mod callback_handler;
pub mod message_handler;
pub mod payment_handler;
pub mod responder;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
pub use payment_handler::{pre_checkout_handler, TelegramPayments};
