//! Renders machine directives as Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use super::ui_builder::{inline_keyboard, location_keyboard};
use crate::machine::Directive;
use crate::pricing::Coordinates;

/// Send every directive of a turn to `chat_id`, in order
pub async fn render(
    bot: &Bot,
    chat_id: ChatId,
    directives: Vec<Directive>,
    language_code: Option<&str>,
) -> Result<()> {
    for directive in directives {
        match directive {
            Directive::Reply { text, choices } => {
                if choices.is_empty() {
                    bot.send_message(chat_id, text).await?;
                } else {
                    bot.send_message(chat_id, text)
                        .reply_markup(inline_keyboard(&choices))
                        .await?;
                }
            }
            Directive::ProductCard {
                text,
                image_url,
                choices,
            } => {
                let keyboard = inline_keyboard(&choices);
                let photo = image_url.as_deref().and_then(|url| match reqwest::Url::parse(url) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(url, error = %e, "Ignoring malformed image URL");
                        None
                    }
                });

                let sent_photo = match photo {
                    Some(url) => match bot
                        .send_photo(chat_id, InputFile::url(url))
                        .caption(text.clone())
                        .reply_markup(keyboard.clone())
                        .await
                    {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(user_id = %chat_id, error = %e, "Photo rejected, sending text instead");
                            false
                        }
                    },
                    None => false,
                };

                if !sent_photo {
                    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
                }
            }
            Directive::RequestLocation { text } => {
                bot.send_message(chat_id, text)
                    .reply_markup(location_keyboard(language_code))
                    .await?;
            }
            Directive::NotifyAgent {
                agent_chat_id,
                coordinates,
                text,
            } => {
                info!(user_id = %chat_id, agent_chat_id, "Sending order to delivery agent");
                // The order is already paid; the customer still gets the rest of the turn
                if let Err(e) = notify_agent(bot, ChatId(agent_chat_id), text, coordinates).await {
                    error!(user_id = %chat_id, agent_chat_id, error = %e, "Failed to notify delivery agent");
                }
            }
            Directive::ScheduleFollowUp { delay, text } => {
                debug!(user_id = %chat_id, delay_secs = delay.as_secs(), "Scheduling follow-up");
                let bot = bot.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = bot.send_message(chat_id, text).await {
                        error!(user_id = %chat_id, error = %e, "Failed to send follow-up");
                    }
                });
            }
            Directive::AnswerPrecheck { .. } => {
                warn!(user_id = %chat_id, "Pre-checkout answer outside of a pre-checkout query");
            }
        }
    }

    Ok(())
}

async fn notify_agent(bot: &Bot, agent: ChatId, text: String, coordinates: Coordinates) -> Result<()> {
    bot.send_message(agent, text).await?;
    bot.send_location(agent, coordinates.latitude, coordinates.longitude)
        .await?;
    Ok(())
}
