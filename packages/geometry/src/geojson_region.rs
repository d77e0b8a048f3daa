//! Converts drawing-tool `GeoJSON` output into [`Region`]s.
//!
//! Map drawing tools export shapes as `GeoJSON`. Polygons and rectangles
//! arrive as `Polygon` geometries; circles arrive as a `Point` feature with
//! a `radius` property in meters (the Leaflet.draw convention). Only the
//! exterior ring of a polygon is used; holes are ignored.

use area_addresses_geometry_models::{LatLng, Region};
use geojson::{Feature, GeoJson};

use crate::RegionError;

/// Parses a `GeoJSON` document into a [`Region`].
///
/// Accepts a bare geometry, a feature, or a feature collection (the first
/// feature is used).
///
/// # Errors
///
/// Returns [`RegionError::GeoJson`] if the document is malformed or does not
/// describe a polygon or a circle.
pub fn region_from_geojson(input: &str) -> Result<Region, RegionError> {
    let geojson: GeoJson = input.parse().map_err(|e| RegionError::GeoJson {
        message: format!("{e}"),
    })?;

    match geojson {
        GeoJson::Geometry(geom) => region_from_geometry(geom, None),
        GeoJson::Feature(feature) => region_from_feature(feature),
        GeoJson::FeatureCollection(collection) => {
            let feature = collection
                .features
                .into_iter()
                .next()
                .ok_or_else(|| RegionError::GeoJson {
                    message: "FeatureCollection has no features".to_string(),
                })?;
            region_from_feature(feature)
        }
    }
}

fn region_from_feature(feature: Feature) -> Result<Region, RegionError> {
    let radius = feature
        .property("radius")
        .and_then(serde_json::Value::as_f64);

    let geom = feature.geometry.ok_or_else(|| RegionError::GeoJson {
        message: "Feature has no geometry".to_string(),
    })?;

    region_from_geometry(geom, radius)
}

fn region_from_geometry(
    geom: geojson::Geometry,
    radius_m: Option<f64>,
) -> Result<Region, RegionError> {
    if let geojson::Value::Point(coords) = &geom.value {
        let (Some(&lng), Some(&lat)) = (coords.first(), coords.get(1)) else {
            return Err(RegionError::GeoJson {
                message: "Point has fewer than 2 coordinates".to_string(),
            });
        };
        let radius_m = radius_m.ok_or_else(|| RegionError::GeoJson {
            message: "Point feature needs a 'radius' property to describe a circle".to_string(),
        })?;
        return Ok(Region::Circle {
            center: LatLng::new(lat, lng),
            radius_m,
        });
    }

    let geo_geom: geo::Geometry<f64> = geom.try_into().map_err(|e: geojson::Error| {
        RegionError::GeoJson {
            message: format!("{e}"),
        }
    })?;

    let polygon = match geo_geom {
        geo::Geometry::Polygon(p) => p,
        geo::Geometry::MultiPolygon(mp) if mp.0.len() == 1 => {
            mp.0.into_iter()
                .next()
                .ok_or_else(|| RegionError::GeoJson {
                    message: "MultiPolygon is empty".to_string(),
                })?
        }
        other => {
            return Err(RegionError::GeoJson {
                message: format!("Unsupported geometry: {}", geometry_name(&other)),
            });
        }
    };

    let ring = polygon
        .exterior()
        .coords()
        .map(|c| LatLng::new(c.y, c.x))
        .collect();

    Ok(Region::Polygon { ring })
}

const fn geometry_name(geom: &geo::Geometry<f64>) -> &'static str {
    match geom {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
