//! Nominatim / `OpenStreetMap` geocoder client.
//!
//! Reverse lookups use `/reverse` and forward lookups use `/search`, both
//! with `format=jsonv2&addressdetails=1`. The public instance allows
//! roughly one request per second; the enricher's batch size and
//! inter-batch delay are what keep us near that budget.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use area_addresses_address_models::LocationInfo;
use async_trait::async_trait;

use crate::address::AddressComponents;
use crate::service_registry::NominatimSettings;
use crate::{ForwardGeocodeService, GeocodeError, GeocodedPlace, ReverseGeocodeService};

/// Keys Nominatim may use for the settlement name, most specific first.
const CITY_KEYS: &[&str] = &["city", "town", "village", "hamlet", "municipality"];

/// A Nominatim endpoint.
#[derive(Debug, Clone)]
pub struct NominatimService {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimService {
    /// Creates a service using an existing HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Creates a service with its own HTTP client configured from
    /// `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &NominatimSettings) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self::new(client, settings.base_url.clone()))
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, GeocodeError> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(query)
            .query(&[("format", "jsonv2"), ("addressdetails", "1")])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if status.is_server_error() {
            return Err(GeocodeError::ServiceUnavailable {
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ReverseGeocodeService for NominatimService {
    async fn lookup(&self, lat: f64, lng: f64) -> Result<Option<LocationInfo>, GeocodeError> {
        let lat = format!("{lat:.7}");
        let lon = format!("{lng:.7}");
        let body = self
            .get_json("reverse", &[("lat", &lat), ("lon", &lon), ("zoom", "18")])
            .await?;

        Ok(parse_reverse(&body)?
            .map(|components| components.to_location())
            .filter(|location| !location.is_empty()))
    }
}

#[async_trait]
impl ForwardGeocodeService for NominatimService {
    async fn search(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let body = self
            .get_json("search", &[("q", query), ("limit", "1")])
            .await?;
        parse_search(&body)
    }
}

/// Parses a `/reverse` response into address components.
///
/// Nominatim answers an unknown location with `{"error": "Unable to
/// geocode"}`, which is reported as `Ok(None)`.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not a JSON object.
pub fn parse_reverse(body: &serde_json::Value) -> Result<Option<AddressComponents>, GeocodeError> {
    if !body.is_object() {
        return Err(GeocodeError::Parse {
            message: "Nominatim reverse response is not an object".to_string(),
        });
    }

    if body.get("error").is_some() {
        return Ok(None);
    }

    Ok(Some(components_from_result(body)))
}

/// Parses a `/search` response, taking the first (best) match.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not an array or the match
/// lacks coordinates.
pub fn parse_search(body: &serde_json::Value) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lng = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let components = components_from_result(first);

    Ok(Some(GeocodedPlace {
        lat,
        lng,
        location: components.to_location(),
        display_name: components.display_name,
    }))
}

fn components_from_result(result: &serde_json::Value) -> AddressComponents {
    let address = &result["address"];
    let field = |key: &str| address[key].as_str().map(ToString::to_string);

    AddressComponents {
        house_number: field("house_number"),
        road: field("road"),
        street: field("street"),
        building: field("building"),
        amenity: field("amenity"),
        shop: field("shop"),
        name: result["name"].as_str().map(ToString::to_string),
        display_name: result["display_name"].as_str().map(ToString::to_string),
        city: CITY_KEYS.iter().find_map(|key| field(key)),
        state: field("state"),
        postal_code: field("postcode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reverse_result() {
        let body = serde_json::json!({
            "place_id": 1,
            "lat": "40.7440",
            "lon": "-74.0324",
            "name": "",
            "display_name": "123, Washington Street, Hoboken, Hudson County, New Jersey, 07030, United States",
            "address": {
                "house_number": "123",
                "road": "Washington Street",
                "city": "Hoboken",
                "county": "Hudson County",
                "state": "New Jersey",
                "postcode": "07030",
                "country": "United States"
            }
        });
        let location = parse_reverse(&body).unwrap().unwrap().to_location();
        assert_eq!(location.address_line, "123 Washington Street");
        assert_eq!(location.city, "Hoboken");
        assert_eq!(location.state, "New Jersey");
        assert_eq!(location.postal_code, "07030");
    }

    #[test]
    fn town_used_when_no_city() {
        let body = serde_json::json!({
            "display_name": "Old Mill, Smalltown, Vermont",
            "address": { "amenity": "Old Mill", "town": "Smalltown", "village": "Ignored" }
        });
        let location = parse_reverse(&body).unwrap().unwrap().to_location();
        assert_eq!(location.address_line, "Old Mill");
        assert_eq!(location.city, "Smalltown");
    }

    #[test]
    fn unable_to_geocode_is_none() {
        let body = serde_json::json!({ "error": "Unable to geocode" });
        assert!(parse_reverse(&body).unwrap().is_none());
    }

    #[test]
    fn non_object_reverse_is_parse_error() {
        let body = serde_json::json!([]);
        assert!(matches!(
            parse_reverse(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn parses_search_result() {
        let body = serde_json::json!([{
            "lat": "41.8827",
            "lon": "-87.6278",
            "display_name": "100, North State Street, Chicago, Illinois, 60602, United States",
            "address": {
                "house_number": "100",
                "road": "North State Street",
                "city": "Chicago",
                "state": "Illinois",
                "postcode": "60602"
            }
        }]);
        let place = parse_search(&body).unwrap().unwrap();
        assert!((place.lat - 41.8827).abs() < 1e-4);
        assert!((place.lng - -87.6278).abs() < 1e-4);
        assert_eq!(place.location.address_line, "100 North State Street");
        assert!(place.display_name.unwrap().starts_with("100, North State"));
    }

    #[test]
    fn parses_search_empty() {
        let body = serde_json::json!([]);
        assert!(parse_search(&body).unwrap().is_none());
    }
}
