//! Text and button builders for every screen of the flow

use crate::gateway::{LineItem, Product};
use crate::localization::{t_args_lang, t_lang};
use crate::money::Money;
use crate::paginator::Paginator;
use crate::pricing::{DeliveryQuote, DeliveryTier};

use super::response::{Choice, ChoiceSet, Directive};
use super::state::{
    ADD_TO_CART, BACK, BACK_TO_MENU, CHECKOUT, DELIVERY, NEXT_PAGE, PICKUP, PREV_PAGE,
    PRODUCT_PREFIX, REMOVE_PREFIX, VIEW_CART,
};

fn button(key: &str, id: impl Into<String>, lang: Option<&str>) -> Choice {
    Choice::new(t_lang(key, lang), id)
}

fn amount(money: Money, currency: &str) -> String {
    format!("{money} {currency}")
}

/// Current catalog page with product buttons and page controls
pub fn catalog_page(
    pages: &Paginator<Product>,
    columns: usize,
    notice: Option<&str>,
    lang: Option<&str>,
) -> Directive {
    let mut text = if pages.is_empty() {
        t_lang("catalog-empty", lang)
    } else {
        let page = (pages.index() + 1).to_string();
        let count = pages.page_count().to_string();
        t_args_lang("catalog-title", &[("page", page.as_str()), ("pages", count.as_str())], lang)
    };
    if let Some(key) = notice {
        text = format!("{}\n\n{}", t_lang(key, lang), text);
    }

    let products = pages
        .current()
        .iter()
        .map(|product| Choice::new(&product.name, format!("{PRODUCT_PREFIX}{}", product.id)))
        .collect();

    let mut footer = Vec::new();
    if pages.index() > 0 {
        footer.push(button("button-prev", PREV_PAGE, lang));
    }
    if pages.index() + 1 < pages.page_count() {
        footer.push(button("button-next", NEXT_PAGE, lang));
    }
    footer.push(button("button-cart", VIEW_CART, lang));

    Directive::reply_with(text, ChoiceSet::grid(products, columns, footer))
}

/// Product photo with name, price and description
pub fn product_card(
    product: &Product,
    image_url: Option<String>,
    notice: Option<&str>,
    currency: &str,
    lang: Option<&str>,
) -> Directive {
    let price = amount(product.price, currency);
    let mut text = format!(
        "{}\n\n{}\n\n{}",
        product.name,
        t_args_lang("product-price", &[("price", price.as_str())], lang),
        product.description
    );
    if let Some(key) = notice {
        text.push_str("\n\n");
        text.push_str(&t_args_lang(key, &[("name", product.name.as_str())], lang));
    }

    let choices = ChoiceSet::new()
        .row(vec![button("button-add", ADD_TO_CART, lang)])
        .row(vec![
            button("button-cart", VIEW_CART, lang),
            button("button-menu", BACK_TO_MENU, lang),
        ]);

    Directive::ProductCard {
        text,
        image_url,
        choices,
    }
}

/// Plain listing of cart lines and total
pub fn cart_summary(items: &[LineItem], total: Money, currency: &str, lang: Option<&str>) -> String {
    let mut lines = vec![t_lang("cart-title", lang)];
    for item in items {
        let quantity = item.quantity.to_string();
        let value = amount(item.value, currency);
        lines.push(t_args_lang(
            "cart-line",
            &[("name", item.name.as_str()), ("quantity", quantity.as_str()), ("value", value.as_str())],
            lang,
        ));
    }
    let total = amount(total, currency);
    lines.push(t_args_lang("cart-total", &[("total", total.as_str())], lang));
    lines.join("\n")
}

/// Cart with a remove button per line
pub fn cart(items: &[LineItem], total: Money, currency: &str, lang: Option<&str>) -> Directive {
    if items.is_empty() {
        let choices = ChoiceSet::new().row(vec![button("button-menu", BACK_TO_MENU, lang)]);
        return Directive::reply_with(t_lang("cart-empty", lang), choices);
    }

    let removals = items
        .iter()
        .map(|item| {
            Choice::new(
                t_args_lang("button-remove", &[("name", item.name.as_str())], lang),
                format!("{REMOVE_PREFIX}{}", item.id),
            )
        })
        .collect();
    let footer = vec![
        button("button-checkout", CHECKOUT, lang),
        button("button-menu", BACK_TO_MENU, lang),
    ];

    Directive::reply_with(
        cart_summary(items, total, currency, lang),
        ChoiceSet::grid(removals, 1, footer),
    )
}

pub fn empty_cart_notice(lang: Option<&str>) -> Directive {
    let choices = ChoiceSet::new().row(vec![button("button-menu", BACK_TO_MENU, lang)]);
    Directive::reply_with(t_lang("cart-empty", lang), choices)
}

/// E-mail prompt; `key` selects the first prompt or a validation message
pub fn email_prompt(key: &str, lang: Option<&str>) -> Directive {
    let choices = ChoiceSet::new().row(vec![button("button-back", BACK, lang)]);
    Directive::reply_with(t_lang(key, lang), choices)
}

pub fn location_prompt(key: &str, lang: Option<&str>) -> Directive {
    Directive::RequestLocation {
        text: t_lang(key, lang),
    }
}

/// Delivery offer for the nearest pizzeria
pub fn delivery_offer(quote: &DeliveryQuote, currency: &str, lang: Option<&str>) -> Directive {
    let distance = format!("{:.1}", quote.nearest.distance_km);
    let address = quote.nearest.location.address.as_str();
    let back = vec![button("button-back", BACK, lang)];
    let modes = vec![
        button("button-pickup", PICKUP, lang),
        button("button-delivery", DELIVERY, lang),
    ];

    let (text, choices) = match (quote.tier, quote.price) {
        (DeliveryTier::Free, _) => (
            t_args_lang(
                "delivery-free",
                &[("distance", distance.as_str()), ("address", address)],
                lang,
            ),
            ChoiceSet::new().row(modes).row(back),
        ),
        (DeliveryTier::Near | DeliveryTier::Far, Some(price)) => {
            let price = amount(price, currency);
            (
                t_args_lang(
                    "delivery-paid",
                    &[("distance", distance.as_str()), ("address", address), ("price", price.as_str())],
                    lang,
                ),
                ChoiceSet::new().row(modes).row(back),
            )
        }
        _ => (
            t_args_lang("delivery-too-far", &[("distance", distance.as_str())], lang),
            ChoiceSet::new().row(back),
        ),
    };

    Directive::reply_with(text, choices)
}

pub fn invoice_description(
    total: Money,
    delivery: Money,
    currency: &str,
    lang: Option<&str>,
) -> String {
    let total = amount(total, currency);
    let delivery = amount(delivery, currency);
    t_args_lang(
        "invoice-description",
        &[("total", total.as_str()), ("delivery", delivery.as_str())],
        lang,
    )
}

pub fn pickup_address(address: &str, lang: Option<&str>) -> Directive {
    Directive::reply(t_args_lang("pickup-address", &[("address", address)], lang))
}

/// Order text for the delivery agent
pub fn agent_order(
    items: &[LineItem],
    total: Money,
    email: Option<&str>,
    currency: &str,
    lang: Option<&str>,
) -> String {
    let mut text = format!(
        "{}\n\n{}",
        t_lang("agent-order-title", lang),
        cart_summary(items, total, currency, lang)
    );
    if let Some(email) = email {
        text.push_str("\n\n");
        text.push_str(&t_args_lang("agent-order-email", &[("email", email)], lang));
    }
    text
}

pub fn farewell(lang: Option<&str>) -> Directive {
    Directive::reply(t_lang("farewell", lang))
}

pub fn hint(lang: Option<&str>) -> Directive {
    Directive::reply(t_lang("hint-unexpected", lang))
}

pub fn help(lang: Option<&str>) -> Directive {
    Directive::reply(t_lang("help", lang))
}
