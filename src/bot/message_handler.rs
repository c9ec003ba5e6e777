//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

// Import the state machine
use crate::gateway::UserKey;
use crate::machine::{views, Event, OrderMachine};
use crate::pricing::Coordinates;

use super::responder::render;

/// Map a message to a flow event, `None` for messages the flow ignores
pub fn event_from_message(msg: &Message) -> Option<Event> {
    if let Some(payment) = msg.successful_payment() {
        return Some(Event::PaymentConfirmed {
            payload: payment.invoice_payload.clone(),
        });
    }

    if let Some(location) = msg.location() {
        return Some(Event::Location(Coordinates::new(
            location.latitude,
            location.longitude,
        )));
    }

    msg.text().map(Event::from_text)
}

fn is_help_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .and_then(|word| word.split('@').next())
        == Some("/help")
}

pub async fn message_handler(bot: Bot, msg: Message, machine: Arc<OrderMachine>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without a sender");
        return Ok(());
    };
    let language_code = user.language_code.clone();
    let user_key = UserKey(user.id.0);

    if msg.text().is_some_and(is_help_command) {
        info!(user_id = %user_key, "Help requested");
        return render(
            &bot,
            msg.chat.id,
            vec![views::help(language_code.as_deref())],
            language_code.as_deref(),
        )
        .await;
    }

    let Some(event) = event_from_message(&msg) else {
        debug!(user_id = %user_key, "Ignoring unsupported message");
        return Ok(());
    };
    debug!(user_id = %user_key, event = ?event.kind(), "Received message");

    let turn = machine
        .handle(user_key, event, language_code.as_deref())
        .await;
    render(&bot, msg.chat.id, turn.directives, language_code.as_deref()).await
}
