#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure geometric predicates over user-drawn regions.
//!
//! Everything in this crate is a synchronous function of its input with no
//! I/O. Coordinates are WGS84 degrees; callers are expected to validate
//! input with [`validate_region`] before relying on the predicates.

pub mod geojson_region;

use area_addresses_geometry_models::{BoundingBox, LatLng, Region};
use geo::BoundingRect as _;
use thiserror::Error;

/// Mean Earth radius used by [`distance_meters`].
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors describing why a region cannot be collected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegionError {
    /// Polygon ring has fewer than three distinct vertices.
    #[error("Polygon needs at least 3 vertices, got {count}")]
    TooFewVertices {
        /// Number of distinct vertices found.
        count: usize,
    },

    /// A coordinate is NaN, infinite, or outside the WGS84 range.
    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lng: f64,
    },

    /// Circle radius is not a positive finite number.
    #[error("Invalid circle radius: {radius_m} m")]
    InvalidRadius {
        /// Offending radius in meters.
        radius_m: f64,
    },

    /// The region's bounding box has no area.
    #[error("Region has an empty bounding box")]
    DegenerateBounds,

    /// `GeoJSON` input could not be turned into a region.
    #[error("GeoJSON error: {message}")]
    GeoJson {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Returns `true` if the point lies inside the region.
///
/// Polygons use ray casting with a half-open edge test
/// (`(yi > y) != (yj > y)`) so that a ray passing exactly through a vertex
/// is counted once. Circles compare the haversine distance to the radius
/// (inclusive). Rectangles use inclusive coordinate bounds.
#[must_use]
pub fn contains_point(region: &Region, lat: f64, lng: f64) -> bool {
    match region {
        Region::Polygon { ring } => ring_contains(ring, lat, lng),
        Region::Circle { center, radius_m } => {
            distance_meters(center.lat, center.lng, lat, lng) <= *radius_m
        }
        Region::Rectangle { a, b } => BoundingBox::from_corners(*a, *b).contains(lat, lng),
    }
}

fn ring_contains(ring: &[LatLng], lat: f64, lng: f64) -> bool {
    let (x, y) = (lng, lat);
    let mut inside = false;
    let Some(mut j) = ring.len().checked_sub(1) else {
        return false;
    };

    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Returns the axis-aligned bounding box of the region.
///
/// An empty polygon yields an all-zero box, which
/// [`BoundingBox::is_degenerate`] reports as degenerate.
#[must_use]
pub fn bounding_box(region: &Region) -> BoundingBox {
    match region {
        Region::Polygon { ring } => {
            let line: geo::LineString<f64> = ring.iter().map(|p| (p.lng, p.lat)).collect();
            line.bounding_rect().map_or(
                BoundingBox {
                    south: 0.0,
                    west: 0.0,
                    north: 0.0,
                    east: 0.0,
                },
                |rect| BoundingBox {
                    south: rect.min().y,
                    west: rect.min().x,
                    north: rect.max().y,
                    east: rect.max().x,
                },
            )
        }
        Region::Circle { center, radius_m } => circle_bounds(*center, *radius_m),
        Region::Rectangle { a, b } => BoundingBox::from_corners(*a, *b),
    }
}

fn circle_bounds(center: LatLng, radius_m: f64) -> BoundingBox {
    let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
    // Longitude degrees shrink toward the poles.
    let cos_lat = center.lat.to_radians().cos().abs().max(1e-9);
    let dlng = (dlat / cos_lat).min(180.0);

    let west = center.lng - dlng;
    let east = center.lng + dlng;
    if west < -180.0 || east > 180.0 {
        log::warn!(
            "Circle at ({:.6},{:.6}) r={radius_m}m crosses the antimeridian; \
             bounds are clamped to ±180 and the far side is not covered",
            center.lat,
            center.lng
        );
    }

    BoundingBox {
        south: (center.lat - dlat).max(-90.0),
        west: west.max(-180.0),
        north: (center.lat + dlat).min(90.0),
        east: east.min(180.0),
    }
}

/// Great-circle distance between two points in meters (haversine).
#[must_use]
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Checks that a region is well formed enough to plan queries for.
///
/// # Errors
///
/// Returns [`RegionError`] if any coordinate is out of range, a polygon has
/// fewer than three distinct vertices, a circle radius is not positive, or
/// the bounding box has no area.
pub fn validate_region(region: &Region) -> Result<BoundingBox, RegionError> {
    match region {
        Region::Polygon { ring } => {
            for p in ring {
                check_coordinate(*p)?;
            }
            let mut distinct: Vec<LatLng> = Vec::with_capacity(ring.len());
            for p in ring {
                if !distinct.contains(p) {
                    distinct.push(*p);
                }
            }
            if distinct.len() < 3 {
                return Err(RegionError::TooFewVertices {
                    count: distinct.len(),
                });
            }
        }
        Region::Circle { center, radius_m } => {
            check_coordinate(*center)?;
            if !radius_m.is_finite() || *radius_m <= 0.0 {
                return Err(RegionError::InvalidRadius {
                    radius_m: *radius_m,
                });
            }
        }
        Region::Rectangle { a, b } => {
            check_coordinate(*a)?;
            check_coordinate(*b)?;
        }
    }

    let bbox = bounding_box(region);
    if bbox.is_degenerate() {
        return Err(RegionError::DegenerateBounds);
    }
    Ok(bbox)
}

fn check_coordinate(p: LatLng) -> Result<(), RegionError> {
    if p.lat.is_finite()
        && p.lng.is_finite()
        && (-90.0..=90.0).contains(&p.lat)
        && (-180.0..=180.0).contains(&p.lng)
    {
        Ok(())
    } else {
        Err(RegionError::InvalidCoordinate {
            lat: p.lat,
            lng: p.lng,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ]
    }

    #[test]
    fn polygon_contains_interior_point() {
        let region = Region::Polygon { ring: square() };
        assert!(contains_point(&region, 0.5, 0.5));
        assert!(!contains_point(&region, 1.5, 0.5));
        assert!(!contains_point(&region, 0.5, -0.1));
    }

    #[test]
    fn polygon_handles_concave_shape() {
        // An L shape: the notch at (0.75, 0.75) is outside.
        let ring = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(0.5, 1.0),
            LatLng::new(0.5, 0.5),
            LatLng::new(1.0, 0.5),
            LatLng::new(1.0, 0.0),
        ];
        let region = Region::Polygon { ring };
        assert!(contains_point(&region, 0.25, 0.75));
        assert!(contains_point(&region, 0.75, 0.25));
        assert!(!contains_point(&region, 0.75, 0.75));
    }

    #[test]
    fn winding_direction_does_not_change_classification() {
        let cw = Region::Polygon { ring: square() };
        let mut reversed = square();
        reversed.reverse();
        let ccw = Region::Polygon { ring: reversed };

        let samples = [
            (0.5, 0.5),
            (0.1, 0.9),
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.5, 0.0),
            (1.2, 0.3),
        ];
        for (lat, lng) in samples {
            assert_eq!(
                contains_point(&cw, lat, lng),
                contains_point(&ccw, lat, lng),
                "winding changed result at ({lat}, {lng})"
            );
        }
    }

    #[test]
    fn closed_ring_matches_open_ring() {
        let open = Region::Polygon { ring: square() };
        let mut closed_ring = square();
        closed_ring.push(closed_ring[0]);
        let closed = Region::Polygon { ring: closed_ring };

        for (lat, lng) in [(0.5, 0.5), (0.99, 0.01), (2.0, 2.0), (0.0, 0.5)] {
            assert_eq!(
                contains_point(&open, lat, lng),
                contains_point(&closed, lat, lng)
            );
        }
    }

    #[test]
    fn interior_agrees_with_geo_contains() {
        use geo::Contains as _;

        let ring = vec![
            LatLng::new(40.0, -74.0),
            LatLng::new(40.02, -73.99),
            LatLng::new(40.01, -73.97),
            LatLng::new(39.99, -73.98),
        ];
        let poly = geo::Polygon::new(ring.iter().map(|p| (p.lng, p.lat)).collect(), vec![]);
        let region = Region::Polygon { ring };

        for i in 0..20 {
            for j in 0..20 {
                let lat = 39.985 + f64::from(i) * 0.0018;
                let lng = -74.005 + f64::from(j) * 0.0018;
                let expected = poly.contains(&geo::Point::new(lng, lat));
                // geo::Contains excludes the boundary; only compare where it says inside
                if expected {
                    assert!(contains_point(&region, lat, lng), "({lat}, {lng})");
                }
            }
        }
    }

    #[test]
    fn circle_containment_is_inclusive_on_radius() {
        let center = LatLng::new(40.0, -74.0);
        let region = Region::Circle {
            center,
            radius_m: 50.0,
        };
        // One meter of latitude is 1 / (R * pi / 180) degrees.
        let deg_per_m = 1.0 / (EARTH_RADIUS_M.to_radians());
        assert!(contains_point(&region, 40.0 + 49.9 * deg_per_m, -74.0));
        assert!(!contains_point(&region, 40.0 + 50.1 * deg_per_m, -74.0));
        assert!(contains_point(&region, 40.0, -74.0));
    }

    #[test]
    fn rectangle_is_inclusive() {
        let region = Region::Rectangle {
            a: LatLng::new(40.0, -74.0),
            b: LatLng::new(40.01, -73.99),
        };
        assert!(contains_point(&region, 40.0, -74.0));
        assert!(contains_point(&region, 40.005, -73.995));
        assert!(!contains_point(&region, 40.0101, -73.995));
    }

    #[test]
    fn distance_matches_known_value() {
        // One degree of latitude on this sphere.
        let d = distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
        assert!(distance_meters(40.0, -74.0, 40.0, -74.0).abs() < f64::EPSILON);
    }

    #[test]
    fn circle_bbox_contains_circle_edge() {
        let center = LatLng::new(45.0, 10.0);
        let region = Region::Circle {
            center,
            radius_m: 1_000.0,
        };
        let bbox = bounding_box(&region);
        assert!(bbox.north > 45.0 && bbox.south < 45.0);
        // East edge should be about 1 km away along the parallel.
        let east = distance_meters(45.0, 10.0, 45.0, bbox.east);
        assert!((east - 1_000.0).abs() < 5.0, "got {east}");
    }

    #[test]
    fn circle_bbox_is_clamped_at_antimeridian() {
        let region = Region::Circle {
            center: LatLng::new(0.0, 179.999),
            radius_m: 1_000.0,
        };
        let bbox = bounding_box(&region);
        assert!((bbox.east - 180.0).abs() < f64::EPSILON);
        assert!(bbox.west > 179.98 && bbox.west < 179.999);
        assert!(contains_point(&region, 0.0, 180.0));
    }

    #[test]
    fn polygon_bbox() {
        let bbox = bounding_box(&Region::Polygon { ring: square() });
        assert_eq!(
            bbox,
            BoundingBox {
                south: 0.0,
                west: 0.0,
                north: 1.0,
                east: 1.0
            }
        );
    }

    #[test]
    fn validate_rejects_bad_regions() {
        assert_eq!(
            validate_region(&Region::Polygon {
                ring: vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0), LatLng::new(0.0, 0.0)],
            }),
            Err(RegionError::TooFewVertices { count: 2 })
        );
        assert_eq!(
            validate_region(&Region::Circle {
                center: LatLng::new(0.0, 0.0),
                radius_m: 0.0,
            }),
            Err(RegionError::InvalidRadius { radius_m: 0.0 })
        );
        assert_eq!(
            validate_region(&Region::Rectangle {
                a: LatLng::new(40.0, -74.0),
                b: LatLng::new(40.0, -73.0),
            }),
            Err(RegionError::DegenerateBounds)
        );
        assert!(matches!(
            validate_region(&Region::Rectangle {
                a: LatLng::new(91.0, -74.0),
                b: LatLng::new(40.0, -73.0),
            }),
            Err(RegionError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn validate_accepts_good_rectangle() {
        let bbox = validate_region(&Region::Rectangle {
            a: LatLng::new(40.0, -74.0),
            b: LatLng::new(40.01, -73.99),
        })
        .unwrap();
        assert!((bbox.lat_span() - 0.01).abs() < 1e-9);
    }
}
