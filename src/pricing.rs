//! # Delivery Pricing Module
//!
//! Picks the fulfillment location nearest to a customer and maps the
//! distance to a delivery tier. Tiers are half-open intervals, a boundary
//! distance belongs to the upper tier.

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::money::Money;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A pizzeria the order can be fulfilled from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentLocation {
    pub address: String,
    pub coordinates: Coordinates,
    /// Chat of the delivery agent attached to this location
    pub agent_chat_id: i64,
}

/// The nearest location together with its distance from the customer
#[derive(Debug, Clone, PartialEq)]
pub struct NearestLocation {
    pub location: FulfillmentLocation,
    pub distance_km: f64,
}

/// Delivery price bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTier {
    /// Close enough for free delivery; pickup is suggested as well
    Free,
    /// Short trip, flat near fee
    Near,
    /// Long trip, flat far fee
    Far,
    /// Too far to deliver
    OutOfRange,
}

impl DeliveryTier {
    /// Delivery fee of the tier, `None` when nothing is delivered
    pub fn price(self, config: &PricingConfig) -> Option<Money> {
        match self {
            DeliveryTier::Free => Some(Money::ZERO),
            DeliveryTier::Near => Some(Money::from_major(config.near_fee)),
            DeliveryTier::Far => Some(Money::from_major(config.far_fee)),
            DeliveryTier::OutOfRange => None,
        }
    }
}

/// Result of pricing a delivery for one customer position
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryQuote {
    pub nearest: NearestLocation,
    pub tier: DeliveryTier,
    pub price: Option<Money>,
}

/// Great-circle distance between two points (haversine formula)
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Find the location closest to `customer`, `None` for an empty directory
pub fn nearest_location(
    customer: Coordinates,
    locations: &[FulfillmentLocation],
) -> Option<NearestLocation> {
    locations
        .iter()
        .map(|location| NearestLocation {
            distance_km: distance_km(customer, location.coordinates),
            location: location.clone(),
        })
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
}

/// Map a distance to its tier. Non-finite or negative input is out of range.
pub fn tier_for_distance(distance_km: f64, config: &PricingConfig) -> DeliveryTier {
    if !distance_km.is_finite() || distance_km < 0.0 {
        DeliveryTier::OutOfRange
    } else if distance_km < config.free_radius_km {
        DeliveryTier::Free
    } else if distance_km < config.near_radius_km {
        DeliveryTier::Near
    } else if distance_km < config.max_radius_km {
        DeliveryTier::Far
    } else {
        DeliveryTier::OutOfRange
    }
}

/// Price delivery to `customer` from the nearest of `locations`
pub fn quote_delivery(
    customer: Coordinates,
    locations: &[FulfillmentLocation],
    config: &PricingConfig,
) -> Option<DeliveryQuote> {
    let nearest = nearest_location(customer, locations)?;
    let tier = tier_for_distance(nearest.distance_km, config);
    Some(DeliveryQuote {
        price: tier.price(config),
        tier,
        nearest,
    })
}
