//! UI Builder module for turning choice sets into Telegram keyboards

use teloxide::types::{ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

// Import localization
use crate::localization::t_lang;

// Import response types
use crate::machine::ChoiceSet;

/// Create an inline keyboard with one callback button per choice
pub fn inline_keyboard(choices: &ChoiceSet) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = choices
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|choice| InlineKeyboardButton::callback(choice.label.clone(), choice.id.clone()))
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Create a one-time reply keyboard asking for the user's location
pub fn location_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    let button = KeyboardButton::new(t_lang("button-share-location", language_code))
        .request(ButtonRequest::Location);

    KeyboardMarkup::new(vec![vec![button]])
        .resize_keyboard()
        .one_time_keyboard()
}
