//! # Pizzeria Telegram Bot
//!
//! A Telegram bot that takes pizza orders: it browses the catalog of an
//! e-commerce backend, manages the user's cart, prices delivery from the
//! nearest pizzeria and collects payment through Telegram invoices.

pub mod auth;
pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod localization;
pub mod machine;
pub mod money;
pub mod paginator;
pub mod pricing;
pub mod session;
pub mod testing;
