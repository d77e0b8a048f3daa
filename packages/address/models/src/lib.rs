#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address candidate and record types.
//!
//! A [`RawCandidate`] is what the spatial query service hands back: a point
//! and its raw tags. After containment filtering and enrichment it becomes
//! an [`AddressRecord`], the unit the collection pipeline emits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An unfiltered, unenriched feature returned by the spatial query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    /// Representative latitude (node position or way center).
    pub lat: f64,
    /// Representative longitude.
    pub lng: f64,
    /// Raw key/value tags as returned by the service.
    pub raw_tags: BTreeMap<String, String>,
}

impl RawCandidate {
    /// Returns a tag value, treating blank values as absent.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.raw_tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Best-effort postal fields for a point. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    /// Street address line (e.g. "123 Main St").
    pub address_line: String,
    /// City, town or village.
    pub city: String,
    /// State or province.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
}

impl LocationInfo {
    /// `true` when every field is filled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.address_line.is_empty()
            && !self.city.is_empty()
            && !self.state.is_empty()
            && !self.postal_code.is_empty()
    }

    /// `true` when no field is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address_line.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.postal_code.is_empty()
    }

    /// Fills each empty field from `other`, keeping fields already set.
    pub fn fill_missing(&mut self, other: &Self) {
        fill(&mut self.address_line, &other.address_line);
        fill(&mut self.city, &other.city);
        fill(&mut self.state, &other.state);
        fill(&mut self.postal_code, &other.postal_code);
    }
}

fn fill(target: &mut String, source: &str) {
    if target.is_empty() && !source.is_empty() {
        source.clone_into(target);
    }
}

/// A collected street address inside the requested region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// Opaque identifier, stable for the record's lifetime.
    pub id: String,
    /// Street address line. Never empty.
    pub address_line: String,
    /// City (may be empty if enrichment failed).
    pub city: String,
    /// State (may be empty if enrichment failed).
    pub state: String,
    /// Postal code (may be empty if enrichment failed).
    pub postal_code: String,
    /// Latitude of the representative point.
    pub lat: f64,
    /// Longitude of the representative point.
    pub lng: f64,
}

impl AddressRecord {
    /// Creates a record with a fresh id.
    ///
    /// Returns `None` when the location has no address line; such records
    /// are dropped rather than emitted with a placeholder.
    #[must_use]
    pub fn new(info: LocationInfo, lat: f64, lng: f64) -> Option<Self> {
        let address_line = info.address_line.trim().to_string();
        if address_line.is_empty() {
            return None;
        }

        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            address_line,
            city: info.city,
            state: info.state,
            postal_code: info.postal_code,
            lat,
            lng,
        })
    }
}

/// Lowercases an address line or query, trims it and collapses
/// whitespace runs.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
