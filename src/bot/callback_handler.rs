//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

use crate::gateway::UserKey;
use crate::machine::{Event, OrderMachine, Turn};

use super::responder::render;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, machine: Arc<OrderMachine>) -> Result<()> {
    let user_key = UserKey(q.from.id.0);
    let language_code = q.from.language_code.clone();
    debug!(user_id = %user_key, data = ?q.data, "Received callback query");

    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        debug!(user_id = %user_key, "Callback without its message, ignoring");
        return Ok(());
    };
    let chat_id = message.chat().id;

    let Some(event) = q.data.as_deref().and_then(Event::from_choice_id) else {
        warn!(user_id = %user_key, data = ?q.data, "Unknown callback data");
        return Ok(());
    };

    let turn = machine
        .handle(user_key, event, language_code.as_deref())
        .await;
    let replace_screen = replaces_pressed_screen(&turn);
    render(&bot, chat_id, turn.directives, language_code.as_deref()).await?;

    // A held turn keeps the pressed screen so its buttons stay usable
    if replace_screen {
        if let Err(e) = bot.delete_message(chat_id, message.id()).await {
            warn!(user_id = %user_key, error = %e, "Failed to delete the previous screen");
        }
    }

    Ok(())
}

fn replaces_pressed_screen(turn: &Turn) -> bool {
    turn.completed
}
