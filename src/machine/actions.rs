//! Actions run by transitions. Each one mutates the working session and
//! returns the next state; any error aborts the turn before commit.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};

use super::response::Directive;
use super::state::{Event, OrderState};
use super::{views, OrderMachine, Step};
use crate::errors::{OrderError, OrderResult};
use crate::gateway::{Product, UserKey};
use crate::localization::t_lang;
use crate::money::Money;
use crate::paginator::{PageMove, Paginator};
use crate::pricing::quote_delivery;
use crate::session::{validate_email, DeliveryMode, Session};

/// Length of the invoice payload token
const INVOICE_TOKEN_LEN: usize = 32;

fn invoice_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVOICE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl OrderMachine {
    /// Cart id of the session, resolved from the durable store or created
    async fn ensure_cart(&self, user: UserKey, session: &mut Session) -> OrderResult<String> {
        if let Some(cart_id) = &session.cart_id {
            return Ok(cart_id.clone());
        }

        let cart_id = match self.ctx.sessions.durable_cart_id(user).await? {
            Some(cart_id) => cart_id,
            None => {
                let cart_id = self.ctx.commerce.create_cart(&user.to_string()).await?;
                self.ctx.sessions.persist_cart_id(user, &cart_id).await?;
                info!(user_id = %user, cart_id = %cart_id, "Created cart");
                cart_id
            }
        };

        session.cart_id = Some(cart_id.clone());
        Ok(cart_id)
    }

    pub(super) async fn show_menu(&self, user: UserKey, session: &mut Session) -> OrderResult<Step> {
        session.reset_ephemeral();
        self.ensure_cart(user, session).await?;

        let products = self.ctx.commerce.list_products().await?;
        debug!(user_id = %user, products = products.len(), "Fetched catalog");
        let pages = Paginator::new(products, self.ctx.config.page_size);
        let page = views::catalog_page(&pages, self.ctx.config.menu_columns, None, session.language());
        session.product_pages = Some(pages);

        Ok(Step::to(OrderState::ProductList, vec![page]))
    }

    /// Re-render the current catalog page, rebuilding it when it is gone.
    /// Returning to the menu drops every per-turn field except the pages.
    pub(super) async fn show_page(&self, user: UserKey, session: &mut Session) -> OrderResult<Step> {
        let Some(pages) = session.product_pages.take() else {
            return self.show_menu(user, session).await;
        };

        session.reset_ephemeral();
        let page = views::catalog_page(&pages, self.ctx.config.menu_columns, None, session.language());
        session.product_pages = Some(pages);
        Ok(Step::to(OrderState::ProductList, vec![page]))
    }

    pub(super) async fn paginate(
        &self,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        let language = session.language_code.clone();
        let Some(pages) = session.product_pages.as_mut() else {
            return self.show_menu(user, session).await;
        };

        let moved = match event {
            Event::PrevPage => pages.retreat(),
            _ => pages.advance(),
        };
        let notice = match moved {
            PageMove::Moved => None,
            PageMove::AtEnd => Some("catalog-last-page"),
            PageMove::AtStart => Some("catalog-first-page"),
        };

        let page = views::catalog_page(
            pages,
            self.ctx.config.menu_columns,
            notice,
            language.as_deref(),
        );
        Ok(Step::to(OrderState::ProductList, vec![page]))
    }

    /// Product card with its image; a missing image only drops the photo
    async fn product_card(
        &self,
        product: &Product,
        notice: Option<&str>,
        language: Option<&str>,
    ) -> Directive {
        let image_url = match &product.image_id {
            Some(image_id) => match self.ctx.commerce.get_image_url(image_id).await {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(product_id = %product.id, error = %err, "Product image unavailable");
                    None
                }
            },
            None => None,
        };

        views::product_card(product, image_url, notice, &self.ctx.config.currency, language)
    }

    pub(super) async fn show_product(&self, session: &mut Session, event: &Event) -> OrderResult<Step> {
        let Event::SelectProduct(product_id) = event else {
            return Err(OrderError::ValidationFailed("no product selected".to_string()));
        };

        let product = self.ctx.commerce.get_product(product_id).await?;
        let card = self.product_card(&product, None, session.language()).await;
        session.selected_product_id = Some(product.id);

        Ok(Step::to(OrderState::ProductDetail, vec![card]))
    }

    pub(super) async fn add_to_cart(&self, user: UserKey, session: &mut Session) -> OrderResult<Step> {
        let product_id = session
            .selected_product_id
            .clone()
            .ok_or_else(|| OrderError::SessionAbsent("no product selected".to_string()))?;
        let cart_id = self.ensure_cart(user, session).await?;

        self.ctx
            .commerce
            .add_line_item(&cart_id, &product_id, self.ctx.config.line_item_quantity)
            .await?;
        info!(user_id = %user, product_id = %product_id, "Added product to cart");

        let cached = session
            .product_pages
            .as_ref()
            .and_then(|pages| pages.current().iter().find(|p| p.id == product_id).cloned());
        let product = match cached {
            Some(product) => product,
            None => self.ctx.commerce.get_product(&product_id).await?,
        };
        let card = self
            .product_card(&product, Some("cart-added"), session.language())
            .await;

        Ok(Step::to(OrderState::ProductDetail, vec![card]))
    }

    /// Show the cart, first removing the chosen line when it is in the cart
    pub(super) async fn show_cart(
        &self,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        let cart_id = self.ensure_cart(user, session).await?;
        let mut items = self.ctx.commerce.get_cart_items(&cart_id).await?;

        if let Event::RemoveLine(line_id) = event {
            if items.iter().any(|item| &item.id == line_id) {
                self.ctx.commerce.remove_line_item(&cart_id, line_id).await?;
                info!(user_id = %user, line_id = %line_id, "Removed cart line");
                items = self.ctx.commerce.get_cart_items(&cart_id).await?;
            } else {
                debug!(user_id = %user, line_id = %line_id, "Line is no longer in the cart");
            }
        }

        let total = self.ctx.commerce.get_cart_total(&cart_id).await?;
        session.cart_total = Some(total);
        clear_delivery(session);

        let cart = views::cart(&items, total, &self.ctx.config.currency, session.language());
        Ok(Step::to(OrderState::Cart, vec![cart]))
    }

    pub(super) async fn checkout(&self, user: UserKey, session: &mut Session) -> OrderResult<Step> {
        let cart_id = self.ensure_cart(user, session).await?;
        let total = self.ctx.commerce.get_cart_total(&cart_id).await?;
        session.cart_total = Some(total);

        if total.is_zero() {
            debug!(user_id = %user, "Checkout of an empty cart");
            return Ok(Step::to(
                OrderState::Menu,
                vec![views::empty_cart_notice(session.language())],
            ));
        }

        Ok(Step::to(
            OrderState::AwaitingEmail,
            vec![views::email_prompt("ask-email", session.language())],
        ))
    }

    pub(super) async fn store_email(
        &self,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        let Event::Text(text) = event else {
            return Err(OrderError::ValidationFailed("expected an e-mail".to_string()));
        };
        let email = validate_email(text).map_err(|key| OrderError::ValidationFailed(key.to_string()))?;

        match self
            .ctx
            .commerce
            .create_customer_record(&user.to_string(), &email)
            .await
        {
            Ok(customer_id) => debug!(user_id = %user, customer_id = %customer_id, "Customer recorded"),
            Err(err) => warn!(user_id = %user, error = %err, "Could not record the customer"),
        }

        session.delivery_email = Some(email);
        Ok(Step::to(
            OrderState::AwaitingLocation,
            vec![views::location_prompt("ask-location", session.language())],
        ))
    }

    pub(super) fn reprompt_email(&self, session: &Session, event: &Event) -> Step {
        let key = match event {
            Event::Text(text) => validate_email(text).err().unwrap_or("email-invalid"),
            _ => "email-invalid",
        };
        Step::to(
            OrderState::AwaitingEmail,
            vec![views::email_prompt(key, session.language())],
        )
    }

    pub(super) async fn locate_customer(&self, session: &mut Session, event: &Event) -> OrderResult<Step> {
        let coordinates = match event {
            Event::Location(coordinates) => *coordinates,
            Event::Text(address) => match self.ctx.geocoder.geocode(address).await? {
                Some(coordinates) => coordinates,
                None => {
                    debug!(address = %address, "Address not found");
                    return Ok(Step::to(
                        OrderState::AwaitingLocation,
                        vec![views::location_prompt("address-not-found", session.language())],
                    ));
                }
            },
            _ => return Err(OrderError::ValidationFailed("expected a location".to_string())),
        };

        let locations = self.ctx.directory.list_locations().await?;
        let quote = quote_delivery(coordinates, &locations, &self.ctx.config.pricing)
            .ok_or_else(|| OrderError::NotFound("no fulfillment locations".to_string()))?;
        info!(
            distance_km = quote.nearest.distance_km,
            tier = ?quote.tier,
            address = %quote.nearest.location.address,
            "Quoted delivery"
        );

        let offer = views::delivery_offer(&quote, &self.ctx.config.currency, session.language());
        session.customer_coordinates = Some(coordinates);
        session.delivery_tier = Some(quote.tier);
        session.delivery_price = quote.price;
        session.chosen_location = Some(quote.nearest);
        session.delivery_mode = None;
        session.invoice_token = None;

        Ok(Step::to(OrderState::DeliveryOffer, vec![offer]))
    }

    pub(super) async fn issue_invoice(
        &self,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        let Event::ChooseMode(mode) = event else {
            return Err(OrderError::ValidationFailed("expected a delivery mode".to_string()));
        };
        let delivery_price = session
            .delivery_price
            .ok_or_else(|| OrderError::ValidationFailed("delivery is out of range".to_string()))?;
        let delivery_price = match mode {
            DeliveryMode::Pickup => Money::ZERO,
            DeliveryMode::Delivery => delivery_price,
        };

        let cart_id = self.ensure_cart(user, session).await?;
        let total = self.ctx.commerce.get_cart_total(&cart_id).await?;
        if total.is_zero() {
            return Err(OrderError::ValidationFailed("cart is empty".to_string()));
        }

        let token = invoice_token();
        let description =
            views::invoice_description(total, delivery_price, &self.ctx.config.currency, session.language());
        let invoice = self
            .ctx
            .payments
            .issue_invoice(user, total + delivery_price, &description, &token)
            .await?;
        info!(user_id = %user, invoice = %invoice.0, mode = ?mode, "Invoice issued");

        session.cart_total = Some(total);
        session.delivery_mode = Some(*mode);
        session.delivery_price = Some(delivery_price);
        session.invoice_token = Some(token);

        Ok(Step::to(OrderState::AwaitingPaymentPrecheck, Vec::new()))
    }

    pub(super) fn precheck(&self, session: &Session, event: &Event) -> OrderResult<Step> {
        let Event::PreCheckout { payload } = event else {
            return Err(OrderError::PaymentMismatch);
        };
        check_payload(session, payload)?;

        Ok(Step::to(
            OrderState::PaymentSucceeded,
            vec![Directive::AnswerPrecheck {
                ok: true,
                error: None,
            }],
        ))
    }

    pub(super) async fn complete_order(
        &self,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        let Event::PaymentConfirmed { payload } = event else {
            return Err(OrderError::PaymentMismatch);
        };
        check_payload(session, payload)?;

        let language = session.language();
        let location = session
            .chosen_location
            .as_ref()
            .ok_or_else(|| OrderError::SessionAbsent("no fulfillment location".to_string()))?;

        if session.delivery_mode != Some(DeliveryMode::Delivery) {
            info!(user_id = %user, address = %location.location.address, "Order paid for pickup");
            return Ok(Step::to(
                OrderState::Terminal,
                vec![views::pickup_address(&location.location.address, language)],
            ));
        }

        let coordinates = session
            .customer_coordinates
            .ok_or_else(|| OrderError::SessionAbsent("no customer coordinates".to_string()))?;
        let cart_id = session
            .cart_id
            .clone()
            .ok_or_else(|| OrderError::SessionAbsent("no cart".to_string()))?;
        let items = self.ctx.commerce.get_cart_items(&cart_id).await?;
        let total = session.cart_total.unwrap_or(Money::ZERO);

        let fields = [
            ("customer-email", json!(session.delivery_email)),
            ("longitude", json!(coordinates.longitude)),
            ("latitude", json!(coordinates.latitude)),
        ];
        if let Err(err) = self
            .ctx
            .commerce
            .create_entry(&self.ctx.config.customer_address_flow, &fields)
            .await
        {
            warn!(user_id = %user, error = %err, "Could not store the customer address");
        }

        info!(
            user_id = %user,
            agent_chat_id = location.location.agent_chat_id,
            "Order paid for delivery, notifying agent"
        );
        Ok(Step::to(
            OrderState::Terminal,
            vec![
                Directive::NotifyAgent {
                    agent_chat_id: location.location.agent_chat_id,
                    coordinates,
                    text: views::agent_order(
                        &items,
                        total,
                        session.delivery_email.as_deref(),
                        &self.ctx.config.currency,
                        language,
                    ),
                },
                Directive::reply(t_lang("order-on-the-way", language)),
                Directive::ScheduleFollowUp {
                    delay: self.ctx.config.follow_up_delay,
                    text: t_lang("follow-up", language),
                },
            ],
        ))
    }
}

fn check_payload(session: &Session, payload: &str) -> OrderResult<()> {
    match &session.invoice_token {
        Some(token) if token == payload => Ok(()),
        _ => Err(OrderError::PaymentMismatch),
    }
}

/// Forget everything computed after the cart screen
fn clear_delivery(session: &mut Session) {
    session.customer_coordinates = None;
    session.chosen_location = None;
    session.delivery_tier = None;
    session.delivery_price = None;
    session.delivery_mode = None;
    session.invoice_token = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_tokens_are_alphanumeric_and_distinct() {
        let first = invoice_token();
        let second = invoice_token();
        assert_eq!(first.len(), INVOICE_TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_payload_must_match_token() {
        let mut session = Session::default();
        assert_eq!(check_payload(&session, "abc"), Err(OrderError::PaymentMismatch));

        session.invoice_token = Some("abc".to_string());
        assert_eq!(check_payload(&session, "abc"), Ok(()));
        assert_eq!(check_payload(&session, "abd"), Err(OrderError::PaymentMismatch));
    }
}
