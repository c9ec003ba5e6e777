//! Payment handling: pre-checkout answers and the Telegram invoice adapter

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{LabeledPrice, PreCheckoutQuery};
use tracing::{debug, info, warn};

use crate::errors::{OrderError, OrderResult};
use crate::gateway::{InvoiceHandle, PaymentGateway, UserKey};
use crate::machine::{Directive, Event, OrderMachine};
use crate::money::Money;

use super::responder::render;

/// Answer a pre-checkout query from the payment provider
pub async fn pre_checkout_handler(
    bot: Bot,
    q: PreCheckoutQuery,
    machine: Arc<OrderMachine>,
) -> Result<()> {
    let user_key = UserKey(q.from.id.0);
    let language_code = q.from.language_code.clone();
    debug!(user_id = %user_key, "Received pre-checkout query");

    let event = Event::PreCheckout {
        payload: q.invoice_payload.clone(),
    };
    let turn = machine
        .handle(user_key, event, language_code.as_deref())
        .await;

    let (answers, rest): (Vec<Directive>, Vec<Directive>) = turn
        .directives
        .into_iter()
        .partition(|directive| matches!(directive, Directive::AnswerPrecheck { .. }));

    match answers.into_iter().next() {
        Some(Directive::AnswerPrecheck { ok: true, .. }) => {
            info!(user_id = %user_key, "Pre-checkout accepted");
            bot.answer_pre_checkout_query(q.id, true).await?;
        }
        Some(Directive::AnswerPrecheck { error, .. }) => {
            warn!(user_id = %user_key, "Pre-checkout rejected");
            let request = bot.answer_pre_checkout_query(q.id, false);
            match error {
                Some(error) => request.error_message(error).await?,
                None => request.await?,
            };
        }
        _ => {
            warn!(user_id = %user_key, "No pre-checkout answer produced, rejecting");
            bot.answer_pre_checkout_query(q.id, false).await?;
        }
    }

    render(&bot, ChatId(user_key.0 as i64), rest, language_code.as_deref()).await
}

/// Issues invoices through Telegram payments
pub struct TelegramPayments {
    bot: Bot,
    provider_token: String,
    currency: String,
    title: String,
}

impl TelegramPayments {
    pub fn new(
        bot: Bot,
        provider_token: impl Into<String>,
        currency: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            bot,
            provider_token: provider_token.into(),
            currency: currency.into(),
            title: title.into(),
        }
    }
}

/// Telegram takes invoice amounts as unsigned 32-bit minor units
fn invoice_amount(amount: Money) -> OrderResult<u32> {
    u32::try_from(amount.minor_units())
        .map_err(|_| OrderError::ValidationFailed(format!("invoice amount {amount} out of range")))
}

#[async_trait]
impl PaymentGateway for TelegramPayments {
    async fn issue_invoice(
        &self,
        user: UserKey,
        amount: Money,
        description: &str,
        token: &str,
    ) -> OrderResult<InvoiceHandle> {
        let prices = vec![LabeledPrice::new(self.title.clone(), invoice_amount(amount)?)];

        let message = self
            .bot
            .send_invoice(
                ChatId(user.0 as i64),
                self.title.clone(),
                description.to_string(),
                token.to_string(),
                self.currency.clone(),
                prices,
            )
            .provider_token(self.provider_token.clone())
            .await
            .map_err(|e| OrderError::GatewayUnavailable(format!("send_invoice failed: {e}")))?;

        Ok(InvoiceHandle(message.id.0.to_string()))
    }
}
