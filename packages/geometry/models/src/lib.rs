#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic region and grid cell types.
//!
//! A [`Region`] is the shape a user draws on the map. It is handed to the
//! collection pipeline by value and never mutated afterwards. [`Cell`]s are
//! the rectangular query tiles carved out of a region's [`BoundingBox`].

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// An axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge (minimum latitude).
    pub south: f64,
    /// Western edge (minimum longitude).
    pub west: f64,
    /// Northern edge (maximum latitude).
    pub north: f64,
    /// Eastern edge (maximum longitude).
    pub east: f64,
}

impl BoundingBox {
    /// Creates a bounding box from two arbitrary opposite corners.
    #[must_use]
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south: a.lat.min(b.lat),
            west: a.lng.min(b.lng),
            north: a.lat.max(b.lat),
            east: a.lng.max(b.lng),
        }
    }

    /// Latitude span in degrees.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    #[must_use]
    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// The center point of the box.
    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Whether the box has (near) zero area along either axis.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.lat_span() > f64::EPSILON && self.lng_span() > f64::EPSILON)
    }

    /// Inclusive point-in-box test.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }
}

/// A user-drawn area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    /// A closed ring of vertices. The closing vertex may or may not repeat
    /// the first one.
    Polygon {
        /// Ring vertices in drawing order.
        ring: Vec<LatLng>,
    },
    /// A circle around a center point.
    Circle {
        /// Circle center.
        center: LatLng,
        /// Radius in meters.
        radius_m: f64,
    },
    /// An axis-aligned rectangle given by two opposite corners.
    Rectangle {
        /// First corner.
        a: LatLng,
        /// Opposite corner.
        b: LatLng,
    },
}

impl Region {
    /// Short, human-readable name of the region's shape.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Polygon { .. } => "polygon",
            Self::Circle { .. } => "circle",
            Self::Rectangle { .. } => "rectangle",
        }
    }
}

/// A rectangular query tile produced by the grid planner.
///
/// Cells carry no identity beyond their bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Southern edge.
    pub south: f64,
    /// Western edge.
    pub west: f64,
    /// Northern edge.
    pub north: f64,
    /// Eastern edge.
    pub east: f64,
}

impl Cell {
    /// The representative point used for containment checks.
    #[must_use]
    pub fn center(&self) -> LatLng {
        self.bbox().center()
    }

    /// The cell's bounds as a [`BoundingBox`].
    #[must_use]
    pub const fn bbox(&self) -> BoundingBox {
        BoundingBox {
            south: self.south,
            west: self.west,
            north: self.north,
            east: self.east,
        }
    }
}
