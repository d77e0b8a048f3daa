//! Region arguments.

use std::path::Path;

use area_addresses_geometry::geojson_region::region_from_geojson;
use area_addresses_geometry_models::{LatLng, Region};

/// Parses `N` comma-separated numbers.
fn parse_numbers<const N: usize>(input: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!(
            "{what} needs {N} comma-separated numbers, got \"{input}\""
        ));
    }

    let mut values = [0.0; N];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .map_err(|_| format!("Invalid number \"{part}\" in {what}"))?;
    }
    Ok(values)
}

/// Parses `south,west,north,east` into a rectangle.
///
/// # Errors
///
/// Returns a message if the input is not four numbers.
pub fn parse_rect(input: &str) -> Result<Region, String> {
    let [south, west, north, east] = parse_numbers::<4>(input, "--rect")?;
    Ok(Region::Rectangle {
        a: LatLng::new(south, west),
        b: LatLng::new(north, east),
    })
}

/// Parses `lat,lng,radius_m` into a circle.
///
/// # Errors
///
/// Returns a message if the input is not three numbers.
pub fn parse_circle(input: &str) -> Result<Region, String> {
    let [lat, lng, radius_m] = parse_numbers::<3>(input, "--circle")?;
    Ok(Region::Circle {
        center: LatLng::new(lat, lng),
        radius_m,
    })
}

/// Reads a `GeoJSON` polygon (or point with a `radius` property) from a
/// file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no usable shape.
pub fn load_geojson(path: &Path) -> Result<Region, Box<dyn std::error::Error>> {
    let input = std::fs::read_to_string(path)?;
    Ok(region_from_geojson(&input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rect() {
        let region = parse_rect("40.0, -74.0, 40.01, -73.99").unwrap();
        assert_eq!(
            region,
            Region::Rectangle {
                a: LatLng::new(40.0, -74.0),
                b: LatLng::new(40.01, -73.99),
            }
        );
    }

    #[test]
    fn parses_circle() {
        let region = parse_circle("40.0,-74.0,250").unwrap();
        assert!(matches!(region, Region::Circle { radius_m, .. } if (radius_m - 250.0).abs() < f64::EPSILON));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_circle("1,2,3,4").is_err());
    }

    #[test]
    fn rejects_non_numbers() {
        let err = parse_circle("40.0,west,10").unwrap_err();
        assert!(err.contains("west"));
    }
}
