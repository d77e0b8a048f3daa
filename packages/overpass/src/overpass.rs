//! Overpass API client.
//!
//! Builds an Overpass QL query for a bounding box and maps the returned
//! elements to [`RawCandidate`]s. Nodes use their own position; ways and
//! relations use the `center` emitted by `out center`.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL>

use std::collections::BTreeMap;

use area_addresses_address_models::RawCandidate;
use area_addresses_geometry_models::BoundingBox;
use async_trait::async_trait;

use crate::service_registry::OverpassSettings;
use crate::{FeatureFilter, QueryError, SpatialQueryService};

/// An Overpass API endpoint.
#[derive(Debug, Clone)]
pub struct OverpassService {
    client: reqwest::Client,
    base_url: String,
    query_timeout_secs: u64,
}

impl OverpassService {
    /// Creates a service using an existing HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String, query_timeout_secs: u64) -> Self {
        Self {
            client,
            base_url,
            query_timeout_secs,
        }
    }

    /// Creates a service with its own HTTP client configured from
    /// `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Http`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &OverpassSettings) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("area-addresses/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::new(
            client,
            settings.base_url.clone(),
            settings.query_timeout_secs,
        ))
    }
}

#[async_trait]
impl SpatialQueryService for OverpassService {
    async fn find_features(
        &self,
        bbox: &BoundingBox,
        filter: FeatureFilter,
    ) -> Result<Vec<RawCandidate>, QueryError> {
        let query = build_query(bbox, filter, self.query_timeout_secs);
        log::trace!("Overpass query:\n{query}");

        let resp = self
            .client
            .post(&self.base_url)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(QueryError::RateLimited);
        }
        if status.is_server_error() {
            return Err(QueryError::ServiceUnavailable {
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Builds the Overpass QL query for a bounding box.
#[must_use]
pub fn build_query(bbox: &BoundingBox, filter: FeatureFilter, timeout_secs: u64) -> String {
    let b = format!(
        "{:.7},{:.7},{:.7},{:.7}",
        bbox.south, bbox.west, bbox.north, bbox.east
    );

    let statements = match filter {
        FeatureFilter::AddressBearing => format!(
            "  node[\"addr:housenumber\"]({b});\n  way[\"addr:housenumber\"]({b});\n  way[\"building\"]({b});\n"
        ),
        FeatureFilter::Buildings => format!("  way[\"building\"]({b});\n"),
    };

    format!("[out:json][timeout:{timeout_secs}];\n(\n{statements});\nout center tags;")
}

/// Parses an Overpass JSON response into candidates.
///
/// Elements without a usable position are skipped. A `remark` reporting a
/// runtime error (the server gave up mid-query) is surfaced as
/// [`QueryError::ServiceUnavailable`] because the element list is partial.
///
/// # Errors
///
/// Returns [`QueryError`] if the body has no `elements` array or reports a
/// server-side runtime error.
pub fn parse_response(body: &serde_json::Value) -> Result<Vec<RawCandidate>, QueryError> {
    if let Some(remark) = body.get("remark").and_then(serde_json::Value::as_str)
        && remark.contains("runtime error")
    {
        return Err(QueryError::ServiceUnavailable {
            message: remark.to_string(),
        });
    }

    let elements = body
        .get("elements")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| QueryError::Parse {
            message: "Overpass response missing 'elements' array".to_string(),
        })?;

    let mut candidates = Vec::with_capacity(elements.len());
    let mut skipped = 0_usize;

    for element in elements {
        let position = match element.get("type").and_then(serde_json::Value::as_str) {
            Some("node") => lat_lon(element),
            Some(_) => element.get("center").and_then(lat_lon),
            None => None,
        };

        let Some((lat, lng)) = position else {
            skipped += 1;
            continue;
        };

        let raw_tags: BTreeMap<String, String> = element
            .get("tags")
            .and_then(serde_json::Value::as_object)
            .map(|tags| {
                tags.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        candidates.push(RawCandidate { lat, lng, raw_tags });
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} Overpass elements without a position");
    }

    Ok(candidates)
}

fn lat_lon(value: &serde_json::Value) -> Option<(f64, f64)> {
    let lat = value.get("lat").and_then(serde_json::Value::as_f64)?;
    let lon = value.get("lon").and_then(serde_json::Value::as_f64)?;
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_address_query() {
        let bbox = BoundingBox {
            south: 40.0,
            west: -74.0,
            north: 40.01,
            east: -73.99,
        };
        let query = build_query(&bbox, FeatureFilter::AddressBearing, 25);
        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains("node[\"addr:housenumber\"](40.0000000,-74.0000000,40.0100000,-73.9900000);"));
        assert!(query.contains("way[\"building\"]"));
        assert!(query.ends_with("out center tags;"));
    }

    #[test]
    fn builds_buildings_query() {
        let bbox = BoundingBox {
            south: 1.0,
            west: 2.0,
            north: 3.0,
            east: 4.0,
        };
        let query = build_query(&bbox, FeatureFilter::Buildings, 10);
        assert_eq!(
            query,
            "[out:json][timeout:10];\n(\n  way[\"building\"](1.0000000,2.0000000,3.0000000,4.0000000);\n);\nout center tags;"
        );
    }

    #[test]
    fn parses_nodes_and_way_centers() {
        let body = serde_json::json!({
            "version": 0.6,
            "elements": [
                {
                    "type": "node",
                    "id": 1,
                    "lat": 40.0051,
                    "lon": -73.9952,
                    "tags": { "addr:housenumber": "12", "addr:street": "Main Street" }
                },
                {
                    "type": "way",
                    "id": 2,
                    "center": { "lat": 40.0061, "lon": -73.9941 },
                    "tags": { "building": "yes", "levels": 3 }
                },
                { "type": "way", "id": 3, "tags": { "building": "yes" } }
            ]
        });

        let candidates = parse_response(&body).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!((candidates[0].lat - 40.0051).abs() < 1e-9);
        assert_eq!(candidates[0].tag("addr:street"), Some("Main Street"));
        assert!((candidates[1].lng - -73.9941).abs() < 1e-9);
        // Non-string tag values are dropped.
        assert!(!candidates[1].raw_tags.contains_key("levels"));
    }

    #[test]
    fn empty_elements_is_not_an_error() {
        let body = serde_json::json!({ "elements": [] });
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn runtime_error_remark_is_unavailable() {
        let body = serde_json::json!({
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 3 after 26 seconds."
        });
        assert!(matches!(
            parse_response(&body),
            Err(QueryError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn missing_elements_is_parse_error() {
        let body = serde_json::json!({ "error": "bad" });
        assert!(matches!(
            parse_response(&body),
            Err(QueryError::Parse { .. })
        ));
    }
}
