//! Yandex geocoder adapter

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::Geocoder;
use crate::errors::{OrderError, OrderResult};
use crate::pricing::Coordinates;

pub struct YandexGeocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YandexGeocoder {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    response: GeocodeBody,
}

#[derive(Debug, Deserialize)]
struct GeocodeBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    feature_member: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    /// "longitude latitude", space separated
    pos: String,
}

/// Most relevant match of a geocoder response, `None` when empty
fn most_relevant(response: GeocodeResponse) -> OrderResult<Option<Coordinates>> {
    let Some(member) = response.response.collection.feature_member.into_iter().next() else {
        return Ok(None);
    };

    let mut parts = member.geo_object.point.pos.split_whitespace();
    let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
        return Err(OrderError::GatewayUnavailable(
            "geocoder returned a malformed point".to_string(),
        ));
    };
    let parse = |raw: &str| {
        raw.parse::<f64>().map_err(|_| {
            OrderError::GatewayUnavailable(format!("geocoder returned a bad coordinate: {raw}"))
        })
    };

    Ok(Some(Coordinates::new(parse(lat)?, parse(lon)?)))
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn geocode(&self, address: &str) -> OrderResult<Option<Coordinates>> {
        let response: GeocodeResponse = self
            .http
            .get(&self.base_url)
            .query(&[
                ("geocode", address),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let coordinates = most_relevant(response)?;
        debug!(found = coordinates.is_some(), "Geocoder lookup finished");
        Ok(coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_most_relevant_swaps_to_lat_lon() {
        let response: GeocodeResponse = serde_json::from_value(json!({
            "response": { "GeoObjectCollection": { "featureMember": [
                { "GeoObject": { "Point": { "pos": "37.617698 55.755864" } } },
                { "GeoObject": { "Point": { "pos": "30.0 59.0" } } }
            ] } }
        }))
        .unwrap();

        let coordinates = most_relevant(response).unwrap().unwrap();
        assert!((coordinates.latitude - 55.755864).abs() < 1e-9);
        assert!((coordinates.longitude - 37.617698).abs() < 1e-9);
    }

    #[test]
    fn test_empty_collection_is_not_found() {
        let response: GeocodeResponse = serde_json::from_value(json!({
            "response": { "GeoObjectCollection": { "featureMember": [] } }
        }))
        .unwrap();
        assert_eq!(most_relevant(response).unwrap(), None);
    }

    #[test]
    fn test_malformed_point_is_gateway_error() {
        let response: GeocodeResponse = serde_json::from_value(json!({
            "response": { "GeoObjectCollection": { "featureMember": [
                { "GeoObject": { "Point": { "pos": "nonsense" } } }
            ] } }
        }))
        .unwrap();
        assert!(matches!(
            most_relevant(response),
            Err(OrderError::GatewayUnavailable(_))
        ));
    }
}
