//! Address line derivation.
//!
//! Geocoders and raw map data describe a location with many optional
//! components. Downstream deduplication and display need one consistent
//! address line, so it is always derived with the same priority order:
//!
//! 1. house number + road
//! 2. house number + street
//! 3. road
//! 4. street
//! 5. building name
//! 6. amenity name
//! 7. shop name
//! 8. generic name
//! 9. first comma-separated segment of the display string
//!
//! The first rule that yields a non-empty value wins. If none does, there
//! is no address line.

use area_addresses_address_models::{LocationInfo, RawCandidate};

/// Optional address components of a single location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressComponents {
    /// House number (e.g. "123").
    pub house_number: Option<String>,
    /// Road name as reported by a geocoder.
    pub road: Option<String>,
    /// Street name (OSM `addr:street`).
    pub street: Option<String>,
    /// Name of the building.
    pub building: Option<String>,
    /// Name of the amenity (cafe, school, ...).
    pub amenity: Option<String>,
    /// Name of the shop.
    pub shop: Option<String>,
    /// Generic feature name.
    pub name: Option<String>,
    /// Full comma-separated display string.
    pub display_name: Option<String>,
    /// City, town or village.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
}

impl AddressComponents {
    /// Derives the address line using the fixed priority order.
    #[must_use]
    pub fn address_line(&self) -> Option<String> {
        let house = non_empty(self.house_number.as_ref());
        let road = non_empty(self.road.as_ref());
        let street = non_empty(self.street.as_ref());

        if let Some(house) = house {
            if let Some(road) = road {
                return Some(format!("{house} {road}"));
            }
            if let Some(street) = street {
                return Some(format!("{house} {street}"));
            }
        }

        road.or(street)
            .or_else(|| non_empty(self.building.as_ref()))
            .or_else(|| non_empty(self.amenity.as_ref()))
            .or_else(|| non_empty(self.shop.as_ref()))
            .or_else(|| non_empty(self.name.as_ref()))
            .or_else(|| {
                non_empty(self.display_name.as_ref())
                    .and_then(|d| d.split(',').next())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .map(ToString::to_string)
    }

    /// Converts the components into postal fields, leaving anything unknown
    /// empty.
    #[must_use]
    pub fn to_location(&self) -> LocationInfo {
        LocationInfo {
            address_line: self.address_line().unwrap_or_default(),
            city: non_empty(self.city.as_ref()).unwrap_or_default().to_string(),
            state: non_empty(self.state.as_ref()).unwrap_or_default().to_string(),
            postal_code: non_empty(self.postal_code.as_ref())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Extracts address components from a raw OSM feature's `addr:*` tags.
#[must_use]
pub fn components_from_osm_tags(candidate: &RawCandidate) -> AddressComponents {
    let tag = |key: &str| candidate.tag(key).map(ToString::to_string);

    AddressComponents {
        house_number: tag("addr:housenumber"),
        street: tag("addr:street"),
        name: tag("name"),
        city: tag("addr:city"),
        state: tag("addr:state"),
        postal_code: tag("addr:postcode"),
        ..AddressComponents::default()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn full() -> AddressComponents {
        AddressComponents {
            house_number: some("12"),
            road: some("Main Road"),
            street: some("Main Street"),
            building: some("Tower A"),
            amenity: some("Joe's Cafe"),
            shop: some("Corner Shop"),
            name: some("Landmark"),
            display_name: some("Display Segment, Town, State"),
            ..AddressComponents::default()
        }
    }

    #[test]
    fn follows_priority_order() {
        let mut c = full();
        assert_eq!(c.address_line().as_deref(), Some("12 Main Road"));

        c.road = None;
        assert_eq!(c.address_line().as_deref(), Some("12 Main Street"));

        c.house_number = None;
        c.road = some("Main Road");
        assert_eq!(c.address_line().as_deref(), Some("Main Road"));

        c.road = None;
        assert_eq!(c.address_line().as_deref(), Some("Main Street"));

        c.street = None;
        assert_eq!(c.address_line().as_deref(), Some("Tower A"));

        c.building = None;
        assert_eq!(c.address_line().as_deref(), Some("Joe's Cafe"));

        c.amenity = None;
        assert_eq!(c.address_line().as_deref(), Some("Corner Shop"));

        c.shop = None;
        assert_eq!(c.address_line().as_deref(), Some("Landmark"));

        c.name = None;
        assert_eq!(c.address_line().as_deref(), Some("Display Segment"));

        c.display_name = None;
        assert_eq!(c.address_line(), None);
    }

    #[test]
    fn house_number_alone_is_not_an_address() {
        let c = AddressComponents {
            house_number: some("12"),
            ..AddressComponents::default()
        };
        assert_eq!(c.address_line(), None);
    }

    #[test]
    fn blank_components_are_skipped() {
        let c = AddressComponents {
            house_number: some("  "),
            road: some(""),
            street: some(" Elm St "),
            display_name: some(" , Town"),
            ..AddressComponents::default()
        };
        assert_eq!(c.address_line().as_deref(), Some("Elm St"));

        let only_blank_display = AddressComponents {
            display_name: some(" , Town"),
            ..AddressComponents::default()
        };
        assert_eq!(only_blank_display.address_line(), None);
    }

    #[test]
    fn to_location_leaves_unknown_fields_empty() {
        let c = AddressComponents {
            road: some("Elm St"),
            city: some("Springfield"),
            ..AddressComponents::default()
        };
        let location = c.to_location();
        assert_eq!(location.address_line, "Elm St");
        assert_eq!(location.city, "Springfield");
        assert!(location.state.is_empty());
        assert!(location.postal_code.is_empty());
    }

    #[test]
    fn reads_osm_address_tags() {
        let candidate = RawCandidate {
            lat: 40.0,
            lng: -74.0,
            raw_tags: BTreeMap::from([
                ("addr:housenumber".to_string(), "123".to_string()),
                ("addr:street".to_string(), "Main St".to_string()),
                ("addr:city".to_string(), "Hoboken".to_string()),
                ("addr:postcode".to_string(), "07030".to_string()),
                ("building".to_string(), "yes".to_string()),
            ]),
        };
        let location = components_from_osm_tags(&candidate).to_location();
        assert_eq!(location.address_line, "123 Main St");
        assert_eq!(location.city, "Hoboken");
        assert_eq!(location.postal_code, "07030");
        assert!(location.state.is_empty());
    }

    #[test]
    fn bare_building_tag_has_no_address() {
        let candidate = RawCandidate {
            lat: 40.0,
            lng: -74.0,
            raw_tags: BTreeMap::from([("building".to_string(), "yes".to_string())]),
        };
        assert!(components_from_osm_tags(&candidate).to_location().is_empty());
    }
}
