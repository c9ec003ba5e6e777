//! # Delivery Pricing Tests

use pizzeria_bot::config::PricingConfig;
use pizzeria_bot::money::Money;
use pizzeria_bot::pricing::{quote_delivery, tier_for_distance, Coordinates, DeliveryTier, FulfillmentLocation};
use pizzeria_bot::testing::point_north_of;

const CUSTOMER: Coordinates = Coordinates {
    latitude: 55.75,
    longitude: 37.6,
};

fn pizzeria(address: &str, km: f64) -> FulfillmentLocation {
    FulfillmentLocation {
        address: address.to_string(),
        coordinates: point_north_of(CUSTOMER, km),
        agent_chat_id: 1,
    }
}

fn rank(tier: DeliveryTier) -> u8 {
    match tier {
        DeliveryTier::Free => 0,
        DeliveryTier::Near => 1,
        DeliveryTier::Far => 2,
        DeliveryTier::OutOfRange => 3,
    }
}

#[test]
fn test_tiers_never_decrease_with_distance() {
    let config = PricingConfig::default();
    let mut previous = DeliveryTier::Free;

    for step in 0..=3000 {
        let distance = step as f64 * 0.01;
        let tier = tier_for_distance(distance, &config);
        assert!(rank(tier) >= rank(previous), "tier dropped at {distance} km");
        previous = tier;
    }
    assert_eq!(previous, DeliveryTier::OutOfRange);
}

#[test]
fn test_quote_uses_nearest_pizzeria() {
    let config = PricingConfig::default();
    let locations = vec![pizzeria("far", 12.0), pizzeria("near", 1.0), pizzeria("remote", 40.0)];

    let quote = quote_delivery(CUSTOMER, &locations, &config).unwrap();

    assert_eq!(quote.nearest.location.address, "near");
    assert!((quote.nearest.distance_km - 1.0).abs() < 1e-6);
    assert_eq!(quote.tier, DeliveryTier::Near);
    assert_eq!(quote.price, Some(Money::from_major(100)));
}

#[test]
fn test_quote_examples() {
    let config = PricingConfig::default();
    let cases = [
        (0.2, DeliveryTier::Free, Some(Money::ZERO)),
        (1.0, DeliveryTier::Near, Some(Money::from_major(100))),
        (5.0, DeliveryTier::Far, Some(Money::from_major(300))),
        (25.0, DeliveryTier::OutOfRange, None),
    ];

    for (km, tier, price) in cases {
        let quote = quote_delivery(CUSTOMER, &[pizzeria("only", km)], &config).unwrap();
        assert_eq!(quote.tier, tier, "{km} km");
        assert_eq!(quote.price, price, "{km} km");
    }
}

#[test]
fn test_custom_pricing_config() {
    let config = PricingConfig {
        free_radius_km: 1.0,
        near_radius_km: 2.0,
        max_radius_km: 4.0,
        near_fee: 50,
        far_fee: 150,
    };

    let quote = quote_delivery(CUSTOMER, &[pizzeria("only", 3.0)], &config).unwrap();
    assert_eq!(quote.tier, DeliveryTier::Far);
    assert_eq!(quote.price, Some(Money::from_minor(15_000)));
}

#[test]
fn test_quote_without_locations() {
    assert!(quote_delivery(CUSTOMER, &[], &PricingConfig::default()).is_none());
}
