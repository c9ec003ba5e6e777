//! # Ordering Flow Tests
//!
//! Drives the state machine through whole conversations against in-memory
//! collaborators.

use pizzeria_bot::errors::OrderError;
use pizzeria_bot::gateway::{CommerceGateway, UserKey};
use pizzeria_bot::machine::{Directive, Event, OrderState, Turn};
use pizzeria_bot::money::Money;
use pizzeria_bot::pricing::{Coordinates, FulfillmentLocation};
use pizzeria_bot::session::{CartRegistry, DeliveryMode};
use pizzeria_bot::testing::{point_north_of, sample_products, Harness};
use std::time::Duration;

const USER: UserKey = UserKey(42);
const AGENT_CHAT: i64 = 1001;
const PIZZERIA: Coordinates = Coordinates {
    latitude: 55.75,
    longitude: 37.6,
};

fn pizzeria() -> FulfillmentLocation {
    FulfillmentLocation {
        address: "Lenina 1".to_string(),
        coordinates: PIZZERIA,
        agent_chat_id: AGENT_CHAT,
    }
}

fn harness() -> Harness {
    Harness::new(sample_products(5), vec![pizzeria()]).unwrap()
}

async fn send(h: &Harness, event: Event) -> Turn {
    h.machine.handle(USER, event, Some("en")).await
}

fn text_of(turn: &Turn) -> String {
    turn.directives
        .iter()
        .filter_map(Directive::text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn ids_of(turn: &Turn) -> Vec<String> {
    turn.directives
        .iter()
        .filter_map(Directive::choices)
        .flat_map(|choices| choices.ids().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

async fn cart_id(h: &Harness) -> String {
    h.carts.cart_id(USER).await.unwrap().expect("cart id persisted")
}

/// Start, put pizza-1 (100.00) in the cart and open the cart
async fn with_pizza_in_cart(h: &Harness) -> Turn {
    send(h, Event::Start).await;
    send(h, Event::SelectProduct("pizza-1".into())).await;
    send(h, Event::AddToCart).await;
    send(h, Event::ViewCart).await
}

/// Go from the cart to the delivery offer for a customer `km` away
async fn offer_at(h: &Harness, km: f64) -> Turn {
    with_pizza_in_cart(h).await;
    send(h, Event::Checkout).await;
    send(h, Event::Text("a@b.com".into())).await;
    send(h, Event::Location(point_north_of(PIZZERIA, km))).await
}

#[tokio::test]
async fn test_start_resolves_cart_and_shows_first_page() {
    let h = harness();

    let turn = send(&h, Event::Start).await;

    assert_eq!(turn.state, OrderState::ProductList);
    let ids = ids_of(&turn);
    assert!(ids.contains(&"product:pizza-1".to_string()));
    assert!(ids.contains(&"product:pizza-3".to_string()));
    assert!(!ids.contains(&"product:pizza-4".to_string()));
    assert!(ids.contains(&"next".to_string()));
    assert_eq!(h.commerce.carts_created(), 1);
    assert!(h.carts.cart_id(USER).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cart_is_created_once() {
    let h = harness();

    send(&h, Event::Start).await;
    let first = cart_id(&h).await;
    send(&h, Event::Cancel).await;
    send(&h, Event::Start).await;

    assert_eq!(h.commerce.carts_created(), 1);
    assert_eq!(cart_id(&h).await, first);
}

#[tokio::test]
async fn test_pagination_clamps_at_both_ends() {
    let h = harness();
    send(&h, Event::Start).await;

    let second = send(&h, Event::NextPage).await;
    assert_eq!(second.state, OrderState::ProductList);
    assert!(ids_of(&second).contains(&"product:pizza-4".to_string()));

    let past_end = send(&h, Event::NextPage).await;
    assert_eq!(past_end.state, OrderState::ProductList);
    assert!(text_of(&past_end).contains("last page"));
    assert!(ids_of(&past_end).contains(&"product:pizza-5".to_string()));

    send(&h, Event::PrevPage).await;
    let before_start = send(&h, Event::PrevPage).await;
    assert!(text_of(&before_start).contains("first page"));
    assert!(ids_of(&before_start).contains(&"product:pizza-1".to_string()));
}

#[tokio::test]
async fn test_empty_catalog_shows_single_empty_page() {
    let h = Harness::new(Vec::new(), vec![pizzeria()]).unwrap();

    let turn = send(&h, Event::Start).await;
    assert_eq!(turn.state, OrderState::ProductList);
    assert!(text_of(&turn).contains("menu is empty"));
    assert_eq!(ids_of(&turn), vec!["cart".to_string()]);

    let next = send(&h, Event::NextPage).await;
    assert_eq!(next.state, OrderState::ProductList);
}

#[tokio::test]
async fn test_product_detail_has_image_and_actions() {
    let h = harness();
    send(&h, Event::Start).await;

    let turn = send(&h, Event::SelectProduct("pizza-1".into())).await;

    assert_eq!(turn.state, OrderState::ProductDetail);
    match &turn.directives[0] {
        Directive::ProductCard { text, image_url, .. } => {
            assert!(text.contains("Pizza 1"));
            assert!(text.contains("100.00 RUB"));
            assert_eq!(image_url.as_deref(), Some("https://images.example/image-1.png"));
        }
        other => panic!("expected a product card, got {other:?}"),
    }
    let ids = ids_of(&turn);
    assert!(ids.contains(&"add".to_string()));
    assert!(ids.contains(&"menu".to_string()));
    assert!(ids.contains(&"cart".to_string()));

    let back = send(&h, Event::BackToMenu).await;
    assert_eq!(back.state, OrderState::ProductList);
}

#[tokio::test]
async fn test_unknown_product_holds_state() {
    let h = harness();
    send(&h, Event::Start).await;

    let turn = send(&h, Event::SelectProduct("missing".into())).await;

    assert_eq!(turn.state, OrderState::ProductList);
    assert_eq!(h.machine.state_of(USER), Some(OrderState::ProductList));
}

#[tokio::test]
async fn test_add_then_remove_restores_cart() {
    let h = harness();
    send(&h, Event::Start).await;
    send(&h, Event::SelectProduct("pizza-2".into())).await;
    send(&h, Event::AddToCart).await;

    let cart = cart_id(&h).await;
    let items_before = h.commerce.items(&cart);
    let total_before = h.commerce.get_cart_total(&cart).await.unwrap();

    send(&h, Event::BackToMenu).await;
    send(&h, Event::SelectProduct("pizza-1".into())).await;
    let added = send(&h, Event::AddToCart).await;
    assert_eq!(added.state, OrderState::ProductDetail);
    assert!(text_of(&added).contains("added to your cart"));

    let cart_view = send(&h, Event::ViewCart).await;
    assert_eq!(cart_view.state, OrderState::Cart);
    let line = h
        .commerce
        .items(&cart)
        .into_iter()
        .find(|item| item.product_id == "pizza-1")
        .expect("pizza-1 line");
    assert!(ids_of(&cart_view).contains(&format!("remove:{}", line.id)));

    let removed = send(&h, Event::RemoveLine(line.id)).await;
    assert_eq!(removed.state, OrderState::Cart);
    assert_eq!(h.commerce.items(&cart), items_before);
    assert_eq!(h.commerce.get_cart_total(&cart).await.unwrap(), total_before);
}

#[tokio::test]
async fn test_removing_unknown_line_only_refreshes() {
    let h = harness();
    with_pizza_in_cart(&h).await;
    let cart = cart_id(&h).await;
    let before = h.commerce.items(&cart);

    let turn = send(&h, Event::RemoveLine("line-999".into())).await;

    assert_eq!(turn.state, OrderState::Cart);
    assert_eq!(h.commerce.items(&cart), before);
}

#[tokio::test]
async fn test_checkout_of_empty_cart_returns_to_menu() {
    let h = harness();
    send(&h, Event::Start).await;
    send(&h, Event::ViewCart).await;

    let turn = send(&h, Event::Checkout).await;

    assert_eq!(turn.state, OrderState::Menu);
    assert!(text_of(&turn).contains("cart is empty"));

    let menu = send(&h, Event::BackToMenu).await;
    assert_eq!(menu.state, OrderState::ProductList);
}

#[tokio::test]
async fn test_email_step() {
    let h = harness();
    with_pizza_in_cart(&h).await;

    let prompt = send(&h, Event::Checkout).await;
    assert_eq!(prompt.state, OrderState::AwaitingEmail);

    let invalid = send(&h, Event::Text("not-an-email".into())).await;
    assert_eq!(invalid.state, OrderState::AwaitingEmail);
    assert!(text_of(&invalid).contains("does not look like an e-mail"));

    let valid = send(&h, Event::Text("a@b.com".into())).await;
    assert_eq!(valid.state, OrderState::AwaitingLocation);
    assert!(matches!(valid.directives[0], Directive::RequestLocation { .. }));
    assert_eq!(
        h.commerce.customers(),
        vec![(USER.to_string(), "a@b.com".to_string())]
    );
}

#[tokio::test]
async fn test_back_from_email_returns_to_cart() {
    let h = harness();
    with_pizza_in_cart(&h).await;
    send(&h, Event::Checkout).await;

    let turn = send(&h, Event::Back).await;
    assert_eq!(turn.state, OrderState::Cart);
}

#[tokio::test]
async fn test_customer_record_failure_does_not_block() {
    let h = harness();
    h.commerce.set_failing_customers(true);
    with_pizza_in_cart(&h).await;
    send(&h, Event::Checkout).await;

    let turn = send(&h, Event::Text("a@b.com".into())).await;
    assert_eq!(turn.state, OrderState::AwaitingLocation);
}

#[tokio::test]
async fn test_nearby_customer_gets_free_delivery_and_pickup() {
    let h = harness();

    let offer = offer_at(&h, 0.2).await;

    assert_eq!(offer.state, OrderState::DeliveryOffer);
    assert!(text_of(&offer).contains("for free"));
    assert_eq!(ids_of(&offer), vec!["pickup", "delivery", "back"]);

    let invoice = send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    assert_eq!(invoice.state, OrderState::AwaitingPaymentPrecheck);
    assert_eq!(h.payments.invoices()[0].amount, Money::from_major(100));
}

#[tokio::test]
async fn test_near_customer_pays_near_fee() {
    let h = harness();

    let offer = offer_at(&h, 1.0).await;
    assert!(text_of(&offer).contains("100.00 RUB"));

    send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    let invoices = h.payments.invoices();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].user, USER);
    assert_eq!(invoices[0].amount.minor_units(), 20_000);
}

#[tokio::test]
async fn test_pickup_is_not_charged_for_delivery() {
    let h = harness();
    offer_at(&h, 10.0).await;

    send(&h, Event::ChooseMode(DeliveryMode::Pickup)).await;
    assert_eq!(h.payments.invoices()[0].amount, Money::from_major(100));
}

#[tokio::test]
async fn test_far_customer_gets_no_invoice() {
    let h = harness();

    let offer = offer_at(&h, 25.0).await;
    assert_eq!(offer.state, OrderState::DeliveryOffer);
    assert!(text_of(&offer).contains("cannot deliver"));
    assert_eq!(ids_of(&offer), vec!["back"]);

    let attempt = send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    assert_eq!(attempt.state, OrderState::DeliveryOffer);
    assert!(h.payments.invoices().is_empty());

    let back = send(&h, Event::Back).await;
    assert_eq!(back.state, OrderState::Cart);
}

#[tokio::test]
async fn test_typed_address_is_geocoded() {
    let h = harness();
    h.geocoder.insert("Tverskaya 7", point_north_of(PIZZERIA, 1.0));
    with_pizza_in_cart(&h).await;
    send(&h, Event::Checkout).await;
    send(&h, Event::Text("a@b.com".into())).await;

    let miss = send(&h, Event::Text("Nowhere street".into())).await;
    assert_eq!(miss.state, OrderState::AwaitingLocation);
    assert!(text_of(&miss).contains("could not find this address"));

    let hit = send(&h, Event::Text("Tverskaya 7".into())).await;
    assert_eq!(hit.state, OrderState::DeliveryOffer);
}

#[tokio::test]
async fn test_precheck_compares_payload() {
    let h = harness();
    offer_at(&h, 1.0).await;
    send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    let token = h.payments.last_token().unwrap();

    let rejected = send(
        &h,
        Event::PreCheckout {
            payload: "forged".into(),
        },
    )
    .await;
    assert_eq!(rejected.state, OrderState::AwaitingPaymentPrecheck);
    assert!(matches!(
        rejected.directives[0],
        Directive::AnswerPrecheck { ok: false, .. }
    ));

    let accepted = send(&h, Event::PreCheckout { payload: token }).await;
    assert_eq!(accepted.state, OrderState::PaymentSucceeded);
    assert_eq!(
        accepted.directives,
        vec![Directive::AnswerPrecheck {
            ok: true,
            error: None
        }]
    );
}

#[tokio::test]
async fn test_precheck_without_invoice_is_rejected() {
    let h = harness();

    let turn = send(
        &h,
        Event::PreCheckout {
            payload: "anything".into(),
        },
    )
    .await;

    assert!(matches!(
        turn.directives[0],
        Directive::AnswerPrecheck { ok: false, .. }
    ));
    assert_eq!(h.machine.state_of(USER), None);
}

#[tokio::test]
async fn test_paid_delivery_notifies_agent() {
    let h = harness();
    let customer = point_north_of(PIZZERIA, 1.0);
    offer_at(&h, 1.0).await;
    send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    let token = h.payments.last_token().unwrap();
    send(&h, Event::PreCheckout { payload: token.clone() }).await;

    let done = send(&h, Event::PaymentConfirmed { payload: token }).await;

    assert_eq!(done.state, OrderState::Terminal);
    let notify = done
        .directives
        .iter()
        .find_map(|directive| match directive {
            Directive::NotifyAgent {
                agent_chat_id,
                coordinates,
                text,
            } => Some((*agent_chat_id, *coordinates, text.clone())),
            _ => None,
        })
        .expect("agent notification");
    assert_eq!(notify.0, AGENT_CHAT);
    assert_eq!(notify.1, customer);
    assert!(notify.2.contains("Pizza 1"));
    assert!(notify.2.contains("a@b.com"));

    assert!(done.directives.iter().any(|directive| matches!(
        directive,
        Directive::ScheduleFollowUp { delay, .. } if *delay == Duration::from_secs(3600)
    )));

    let entries = h.commerce.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "customer-address");
    assert_eq!(h.machine.state_of(USER), None);
}

#[tokio::test]
async fn test_paid_pickup_reveals_address() {
    let h = harness();
    offer_at(&h, 0.2).await;
    send(&h, Event::ChooseMode(DeliveryMode::Pickup)).await;
    let token = h.payments.last_token().unwrap();
    send(&h, Event::PreCheckout { payload: token.clone() }).await;

    let done = send(&h, Event::PaymentConfirmed { payload: token }).await;

    assert_eq!(done.state, OrderState::Terminal);
    assert!(text_of(&done).contains("Lenina 1"));
    assert!(!done
        .directives
        .iter()
        .any(|directive| matches!(directive, Directive::NotifyAgent { .. })));
    assert!(h.commerce.entries().is_empty());
}

#[tokio::test]
async fn test_cancel_discards_session_from_any_state() {
    let h = harness();
    with_pizza_in_cart(&h).await;
    let cart = cart_id(&h).await;

    let turn = send(&h, Event::Cancel).await;

    assert_eq!(turn.state, OrderState::Terminal);
    assert!(text_of(&turn).contains("Goodbye"));
    assert_eq!(h.machine.state_of(USER), None);
    assert_eq!(h.sessions.active_sessions(), 0);
    assert_eq!(cart_id(&h).await, cart);
}

#[tokio::test]
async fn test_gateway_failure_holds_state() {
    let h = harness();
    with_pizza_in_cart(&h).await;
    h.commerce.set_failing(true);

    let turn = send(&h, Event::Checkout).await;

    assert_eq!(turn.state, OrderState::Cart);
    assert!(text_of(&turn).contains("not responding"));
    assert_eq!(h.machine.state_of(USER), Some(OrderState::Cart));

    h.commerce.set_failing(false);
    let retry = send(&h, Event::Checkout).await;
    assert_eq!(retry.state, OrderState::AwaitingEmail);
}

#[tokio::test]
async fn test_failed_turn_is_not_completed() {
    let h = harness();
    send(&h, Event::Start).await;
    h.commerce.set_failing(true);

    let turn = send(&h, Event::ViewCart).await;

    assert!(!turn.completed);
    assert_eq!(turn.state, OrderState::ProductList);
    assert_eq!(h.machine.state_of(USER), Some(OrderState::ProductList));

    h.commerce.set_failing(false);
    let retry = send(&h, Event::ViewCart).await;
    assert!(retry.completed);
    assert_eq!(retry.state, OrderState::Cart);
}

#[tokio::test]
async fn test_hint_is_not_completed() {
    let h = harness();
    with_pizza_in_cart(&h).await;

    let turn = send(&h, Event::NextPage).await;
    assert!(!turn.completed);
}

#[tokio::test]
async fn test_back_to_menu_clears_order_fields() {
    let h = harness();
    offer_at(&h, 1.0).await;
    let cart = send(&h, Event::Back).await;
    assert_eq!(cart.state, OrderState::Cart);
    let before = h.sessions.load(USER).unwrap();
    assert!(before.cart_total.is_some());
    assert_eq!(before.delivery_email.as_deref(), Some("a@b.com"));

    let menu = send(&h, Event::BackToMenu).await;

    assert_eq!(menu.state, OrderState::ProductList);
    let session = h.sessions.load(USER).unwrap();
    assert!(session.cart_total.is_none());
    assert!(session.delivery_email.is_none());
    assert!(session.selected_product_id.is_none());
    assert!(session.product_pages.is_some());
    assert_eq!(session.cart_id, before.cart_id);
}

#[tokio::test]
async fn test_failed_invoice_keeps_offer() {
    let h = harness();
    offer_at(&h, 1.0).await;
    h.payments.set_failing(true);

    let turn = send(&h, Event::ChooseMode(DeliveryMode::Delivery)).await;
    assert_eq!(turn.state, OrderState::DeliveryOffer);
    assert_eq!(h.machine.state_of(USER), Some(OrderState::DeliveryOffer));
}

#[tokio::test]
async fn test_no_locations_is_not_found() {
    let h = Harness::new(sample_products(2), Vec::new()).unwrap();
    with_pizza_in_cart(&h).await;
    send(&h, Event::Checkout).await;
    send(&h, Event::Text("a@b.com".into())).await;

    let turn = send(&h, Event::Location(PIZZERIA)).await;

    assert_eq!(turn.state, OrderState::AwaitingLocation);
    assert!(text_of(&turn).contains("could not find"));
    assert_eq!(OrderError::NotFound(String::new()).message_key(), "error-not-found");
}

#[tokio::test]
async fn test_absent_session_shows_menu() {
    let h = harness();

    let turn = send(&h, Event::NextPage).await;
    assert_eq!(turn.state, OrderState::ProductList);
}

#[tokio::test]
async fn test_unexpected_event_gets_hint() {
    let h = harness();
    with_pizza_in_cart(&h).await;

    let turn = send(&h, Event::NextPage).await;

    assert_eq!(turn.state, OrderState::Cart);
    assert!(text_of(&turn).contains("use the buttons"));
}

#[tokio::test]
async fn test_start_restarts_midway() {
    let h = harness();
    offer_at(&h, 1.0).await;

    let turn = send(&h, Event::Start).await;
    assert_eq!(turn.state, OrderState::ProductList);
    assert_eq!(h.commerce.carts_created(), 1);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let h = harness();
    let other = UserKey(7);

    with_pizza_in_cart(&h).await;
    let turn = h.machine.handle(other, Event::Start, None).await;

    assert_eq!(turn.state, OrderState::ProductList);
    assert_eq!(h.machine.state_of(USER), Some(OrderState::Cart));
    assert_eq!(h.commerce.carts_created(), 2);
}

#[tokio::test]
async fn test_replies_follow_user_language() {
    let h = harness();

    let turn = h.machine.handle(USER, Event::Start, Some("ru")).await;
    assert!(text_of(&turn).contains("Наше меню"));
}
