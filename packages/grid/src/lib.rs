#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query grid planning.
//!
//! Splits a region's bounding box into square cells small enough for the
//! spatial query service to answer in one request. When the region is too
//! large for the configured cell budget the cells grow instead of being
//! truncated, so coverage stays complete at a coarser resolution.
//!
//! Cells whose center falls outside the region are dropped before they are
//! ever queried. This is a center-point approximation: a cell that overlaps
//! the region edge but whose center is outside is not queried.

use area_addresses_geometry::{bounding_box, contains_point};
use area_addresses_geometry_models::{Cell, Region};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on the number of cells per region.
pub const DEFAULT_MAX_CELLS: usize = 100;

/// Default target cell edge length in meters.
pub const DEFAULT_CELL_EDGE_M: f64 = 1_000.0;

/// Default meters per degree used to convert the cell edge to degrees.
pub const DEFAULT_METERS_PER_DEGREE: f64 = 111_320.0;

/// Each growth step after the square-root rescale.
const GROWTH_FACTOR: f64 = 1.05;

/// Errors from grid planning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    /// Cell size is zero, negative or not finite.
    #[error("Invalid target cell size: {size} degrees")]
    InvalidCellSize {
        /// Offending size in degrees.
        size: f64,
    },
}

/// Grid sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Target cell edge length in degrees.
    pub target_cell_size: f64,
    /// Maximum number of cells the planner may emit.
    pub max_cells: usize,
}

impl GridConfig {
    /// Builds a config from an edge length in meters and an explicit
    /// meters-per-degree conversion.
    #[must_use]
    pub fn from_meters(edge_m: f64, meters_per_degree: f64, max_cells: usize) -> Self {
        Self {
            target_cell_size: edge_m / meters_per_degree,
            max_cells,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::from_meters(
            DEFAULT_CELL_EDGE_M,
            DEFAULT_METERS_PER_DEGREE,
            DEFAULT_MAX_CELLS,
        )
    }
}

/// Plans the query cells for a region in row-major order (south to north,
/// west to east within a row).
///
/// # Errors
///
/// Returns [`GridError::InvalidCellSize`] if the configured cell size is not
/// a positive finite number.
pub fn plan_cells(region: &Region, config: &GridConfig) -> Result<Vec<Cell>, GridError> {
    let mut size = config.target_cell_size;
    if !(size.is_finite() && size > 0.0) {
        return Err(GridError::InvalidCellSize { size });
    }

    let bbox = bounding_box(region);
    let lat_span = bbox.lat_span().max(0.0);
    let lng_span = bbox.lng_span().max(0.0);

    let mut estimate = estimate_cells(lat_span, lng_span, size);
    if estimate == 0 || config.max_cells == 0 {
        return Ok(vec![]);
    }

    if estimate > config.max_cells {
        #[allow(clippy::cast_precision_loss)]
        let scale = (estimate as f64 / config.max_cells as f64).sqrt();
        size *= scale;
        estimate = estimate_cells(lat_span, lng_span, size);

        // Rounding up rows and columns can still overshoot after the rescale.
        while estimate > config.max_cells {
            size *= GROWTH_FACTOR;
            estimate = estimate_cells(lat_span, lng_span, size);
        }

        log::debug!(
            "Grid rescaled from {:.5}° to {size:.5}° cells to fit {} cells",
            config.target_cell_size,
            config.max_cells
        );
    }

    let rows = steps(lat_span, size);
    let cols = steps(lng_span, size);
    let mut cells = Vec::with_capacity(estimate);
    let mut dropped = 0_usize;

    for row in 0..rows {
        #[allow(clippy::cast_precision_loss)]
        let south = (row as f64).mul_add(size, bbox.south);
        if south >= bbox.north {
            continue;
        }
        let north = (south + size).min(bbox.north);

        for col in 0..cols {
            #[allow(clippy::cast_precision_loss)]
            let west = (col as f64).mul_add(size, bbox.west);
            if west >= bbox.east {
                continue;
            }
            let east = (west + size).min(bbox.east);

            let cell = Cell {
                south,
                west,
                north,
                east,
            };
            let center = cell.center();
            if contains_point(region, center.lat, center.lng) {
                cells.push(cell);
            } else {
                dropped += 1;
            }
        }
    }

    log::debug!(
        "Planned {} cells ({rows}x{cols} grid, {dropped} outside the {})",
        cells.len(),
        region.kind()
    );

    Ok(cells)
}

/// Number of cells a `size`-degree grid needs to cover the spans.
fn estimate_cells(lat_span: f64, lng_span: f64, size: f64) -> usize {
    steps(lat_span, size).saturating_mul(steps(lng_span, size))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn steps(span: f64, size: f64) -> usize {
    (span / size).ceil() as usize
}

#[cfg(test)]
mod tests {
    use area_addresses_geometry_models::LatLng;

    use super::*;

    fn rect(s: f64, w: f64, n: f64, e: f64) -> Region {
        Region::Rectangle {
            a: LatLng::new(s, w),
            b: LatLng::new(n, e),
        }
    }

    fn assert_centers_inside(region: &Region, cells: &[Cell]) {
        for cell in cells {
            let c = cell.center();
            assert!(
                contains_point(region, c.lat, c.lng),
                "cell center ({}, {}) outside region",
                c.lat,
                c.lng
            );
        }
    }

    #[test]
    fn small_rectangle_is_one_cell() {
        let region = rect(40.0, -74.0, 40.005, -73.995);
        let cells = plan_cells(&region, &GridConfig::default()).unwrap();
        assert_eq!(cells.len(), 1);
        assert!((cells[0].north - 40.005).abs() < 1e-12);
        assert!((cells[0].east - -73.995).abs() < 1e-12);
    }

    #[test]
    fn cells_are_clipped_and_row_major() {
        let region = rect(40.0, -74.0, 40.025, -73.975);
        let config = GridConfig {
            target_cell_size: 0.01,
            max_cells: 100,
        };
        let cells = plan_cells(&region, &config).unwrap();
        assert_eq!(cells.len(), 9);

        for cell in &cells {
            assert!(cell.south >= 40.0 && cell.north <= 40.025 + 1e-12);
            assert!(cell.west >= -74.0 && cell.east <= -73.975 + 1e-12);
        }
        for pair in cells.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                a.south < b.south || ((a.south - b.south).abs() < 1e-12 && a.west < b.west),
                "cells out of row-major order"
            );
        }
        // Last column and row are clipped to the bounding box.
        assert!((cells[8].east - -73.975).abs() < 1e-12);
        assert!((cells[8].north - 40.025).abs() < 1e-12);
    }

    #[test]
    fn large_area_respects_max_cells() {
        let config = GridConfig::default();
        for region in [
            rect(30.0, -100.0, 40.0, -90.0),
            rect(-60.0, -170.0, 70.0, 170.0),
            rect(40.0, -74.0, 40.3, -73.1),
        ] {
            let cells = plan_cells(&region, &config).unwrap();
            assert!(!cells.is_empty());
            assert!(cells.len() <= config.max_cells, "got {}", cells.len());
        }
    }

    #[test]
    fn tight_cap_is_respected() {
        let region = rect(40.0, -74.0, 40.1, -73.7);
        for max_cells in [1, 2, 3, 7, 10] {
            let config = GridConfig {
                target_cell_size: 0.001,
                max_cells,
            };
            let cells = plan_cells(&region, &config).unwrap();
            assert!(cells.len() <= max_cells);
            assert!(!cells.is_empty());
        }
    }

    #[test]
    fn circle_cells_have_centers_inside() {
        let region = Region::Circle {
            center: LatLng::new(40.0, -74.0),
            radius_m: 3_000.0,
        };
        let cells = plan_cells(&region, &GridConfig::default()).unwrap();
        assert!(!cells.is_empty());
        assert_centers_inside(&region, &cells);

        // Corners of the circle's bounding box are outside, so some grid
        // positions must have been dropped.
        let bbox = bounding_box(&region);
        let full = estimate_cells(bbox.lat_span(), bbox.lng_span(), GridConfig::default().target_cell_size);
        assert!(cells.len() < full);
    }

    #[test]
    fn triangle_cells_have_centers_inside() {
        let region = Region::Polygon {
            ring: vec![
                LatLng::new(40.0, -74.0),
                LatLng::new(40.05, -74.0),
                LatLng::new(40.0, -73.95),
            ],
        };
        let cells = plan_cells(&region, &GridConfig::default()).unwrap();
        assert!(!cells.is_empty());
        assert_centers_inside(&region, &cells);
    }

    #[test]
    fn degenerate_region_yields_no_cells() {
        let region = rect(40.0, -74.0, 40.0, -73.0);
        assert!(plan_cells(&region, &GridConfig::default()).unwrap().is_empty());

        let point = rect(40.0, -74.0, 40.0, -74.0);
        assert!(plan_cells(&point, &GridConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn zero_max_cells_yields_no_cells() {
        let config = GridConfig {
            max_cells: 0,
            ..GridConfig::default()
        };
        assert!(plan_cells(&rect(40.0, -74.0, 40.1, -73.9), &config).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_cell_size() {
        let region = rect(40.0, -74.0, 40.1, -73.9);
        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = GridConfig {
                target_cell_size: size,
                max_cells: 10,
            };
            assert!(matches!(
                plan_cells(&region, &config),
                Err(GridError::InvalidCellSize { .. })
            ));
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let region = Region::Circle {
            center: LatLng::new(51.5, -0.12),
            radius_m: 2_500.0,
        };
        let a = plan_cells(&region, &GridConfig::default()).unwrap();
        let b = plan_cells(&region, &GridConfig::default()).unwrap();
        assert_eq!(a, b);
    }
}
