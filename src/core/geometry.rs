//! Bounding-box geometry used to size render requests.
//!
//! Only what request sizing needs: the bbox of a polygon's outer ring, a
//! spherical-rectangle area approximation, the lon/lat aspect ratio and the
//! adaptive pixel dimensions derived from them.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Smallest edge, in pixels, requested from the imagery service.
pub const MIN_PIXELS: u32 = 128;
/// Largest edge, in pixels, requested from the imagery service.
pub const MAX_PIXELS: u32 = 2048;

/// Outer ring of a polygon as `[[lon, lat], ...]`.
///
/// Points are kept as raw sequences so that malformed input can be reported
/// as `InvalidGeometry` instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub ring: Vec<Vec<f64>>,
}

impl Polygon {
    pub fn new(ring: Vec<Vec<f64>>) -> Self {
        Self { ring }
    }

    /// Closed ring tracing the outline of a bbox.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            ring: vec![
                vec![bbox.min_lon, bbox.min_lat],
                vec![bbox.max_lon, bbox.min_lat],
                vec![bbox.max_lon, bbox.max_lat],
                vec![bbox.min_lon, bbox.max_lat],
                vec![bbox.min_lon, bbox.min_lat],
            ],
        }
    }
}

/// Axis-aligned lon/lat rectangle, serialized as `[minLon, minLat, maxLon, maxLat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", try_from = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let values = [min_lon, min_lat, max_lon, max_lat];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::geometry(format!("bbox has non-finite values: {values:?}")));
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(Error::geometry(format!("bbox min exceeds max: {values:?}")));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Center point as `(lon, lat)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Non-zero width and height; points and lines have no usable aspect ratio.
    pub fn has_extent(&self) -> bool {
        self.max_lon > self.min_lon && self.max_lat > self.min_lat
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = Error;

    fn try_from(v: [f64; 4]) -> Result<Self> {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaEstimate {
    pub area_m2: f64,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelDimensions {
    pub width: u32,
    pub height: u32,
}

/// Min/max lon/lat over the outer ring.
pub fn bbox_of(polygon: &Polygon) -> Result<BoundingBox> {
    if polygon.ring.is_empty() {
        return Err(Error::geometry("polygon ring is empty"));
    }

    let mut min_lon = f64::INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut max_lat = f64::NEG_INFINITY;

    for (i, point) in polygon.ring.iter().enumerate() {
        let (lon, lat) = match point.as_slice() {
            [lon, lat] if lon.is_finite() && lat.is_finite() => (*lon, *lat),
            other => {
                return Err(Error::geometry(format!(
                    "point {i} is not a finite [lon, lat] pair: {other:?}"
                )));
            }
        };
        min_lon = min_lon.min(lon);
        min_lat = min_lat.min(lat);
        max_lon = max_lon.max(lon);
        max_lat = max_lat.max(lat);
    }

    BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
}

/// Spherical-rectangle area R²·Δλ·(sin φ2 − sin φ1), always non-negative.
///
/// A sizing approximation, not an exact geodesic area.
pub fn area(bbox: &BoundingBox) -> f64 {
    let d_lambda = (bbox.max_lon - bbox.min_lon).to_radians();
    let phi1 = bbox.min_lat.to_radians();
    let phi2 = bbox.max_lat.to_radians();
    (EARTH_RADIUS_M * EARTH_RADIUS_M * d_lambda * (phi2.sin() - phi1.sin())).abs()
}

/// Δlon / Δlat in radians, with the sign of the raw bbox.
///
/// Only meaningful for boxes with extent; a zero-height box yields inf or NaN.
pub fn aspect_ratio(bbox: &BoundingBox) -> f64 {
    let d_lon = (bbox.max_lon - bbox.min_lon).to_radians();
    let d_lat = (bbox.max_lat - bbox.min_lat).to_radians();
    d_lon / d_lat
}

pub fn estimate(bbox: &BoundingBox) -> AreaEstimate {
    AreaEstimate {
        area_m2: area(bbox),
        aspect_ratio: aspect_ratio(bbox),
    }
}

#[inline]
fn clamp_pixels(v: f64) -> u32 {
    if !v.is_finite() {
        return MIN_PIXELS;
    }
    (v.round() as i64).clamp(MIN_PIXELS as i64, MAX_PIXELS as i64) as u32
}

/// Pixel dimensions for a render covering `area_m2` at `resolution_m` per pixel.
///
/// The square side √area / resolution is clamped first; width and height then
/// split it so that width·height ≈ side² and width/height ≈ aspect ratio, each
/// clamped independently. Unusable aspect ratios or resolutions yield a square.
pub fn optimal_pixel_size(area_m2: f64, resolution_m: f64, aspect_ratio: f64) -> PixelDimensions {
    let raw_side = if resolution_m.is_finite() && resolution_m > 0.0 {
        area_m2.max(0.0).sqrt() / resolution_m
    } else {
        f64::NAN
    };
    let side = if raw_side.is_finite() {
        raw_side.clamp(MIN_PIXELS as f64, MAX_PIXELS as f64)
    } else {
        MIN_PIXELS as f64
    };

    let ratio = aspect_ratio.abs();
    if !ratio.is_finite() || ratio == 0.0 {
        let s = clamp_pixels(side);
        return PixelDimensions { width: s, height: s };
    }

    let k = ratio.sqrt();
    PixelDimensions {
        width: clamp_pixels(side * k),
        height: clamp_pixels(side / k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn santiago() -> BoundingBox {
        BoundingBox::new(-70.6, -33.5, -70.5, -33.4).unwrap()
    }

    #[test]
    fn bbox_of_ring() {
        let poly = Polygon::new(vec![
            vec![-70.6, -33.5],
            vec![-70.5, -33.5],
            vec![-70.5, -33.4],
            vec![-70.6, -33.4],
            vec![-70.6, -33.5],
        ]);
        let b = bbox_of(&poly).unwrap();
        assert_eq!(b.to_array(), [-70.6, -33.5, -70.5, -33.4]);
    }

    #[test]
    fn bbox_of_rejects_empty_and_malformed() {
        assert!(matches!(
            bbox_of(&Polygon::new(vec![])),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            bbox_of(&Polygon::new(vec![vec![1.0, 2.0], vec![3.0]])),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            bbox_of(&Polygon::new(vec![vec![1.0, 2.0, 3.0]])),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            bbox_of(&Polygon::new(vec![vec![f64::NAN, 2.0]])),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn area_is_non_negative_and_plausible() {
        let a = area(&santiago());
        assert!(a > 0.0);
        // ~11.1 km x ~9.3 km
        assert!(a > 9.0e7 && a < 1.2e8, "area {a}");

        let degenerate = BoundingBox::new(10.0, 10.0, 10.0, 10.0).unwrap();
        assert_eq!(area(&degenerate), 0.0);

        assert!(!degenerate.has_extent());

        let southern = BoundingBox::new(0.0, -60.0, 1.0, -59.0).unwrap();
        assert!(area(&southern) >= 0.0);
        assert!(southern.has_extent());
        assert!(!BoundingBox::new(0.0, 1.0, 2.0, 1.0).unwrap().has_extent());
    }

    #[test]
    fn aspect_ratio_is_lon_over_lat() {
        let b = BoundingBox::new(0.0, 0.0, 2.0, 1.0).unwrap();
        assert!((aspect_ratio(&b) - 2.0).abs() < 1e-12);
        assert!((aspect_ratio(&santiago()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pixel_size_example_bbox_at_10m() {
        let b = santiago();
        let est = estimate(&b);
        let dims = optimal_pixel_size(est.area_m2, 10.0, est.aspect_ratio);
        assert!((MIN_PIXELS..=MAX_PIXELS).contains(&dims.width));
        assert!((MIN_PIXELS..=MAX_PIXELS).contains(&dims.height));
        let ratio = dims.width as f64 / dims.height as f64;
        assert!((ratio - est.aspect_ratio).abs() / est.aspect_ratio < 0.05);
    }

    #[test]
    fn pixel_size_is_always_clamped() {
        for &(area_m2, res, ar) in &[
            (1.0, 10.0, 1.0),
            (1.0e14, 10.0, 1.0),
            (1.0e8, 10.0, 100.0),
            (1.0e8, 10.0, 0.001),
            (1.0e8, 0.0, 1.0),
            (1.0e8, 10.0, f64::NAN),
            (1.0e8, 10.0, f64::INFINITY),
            (0.0, 10.0, 0.0),
        ] {
            let d = optimal_pixel_size(area_m2, res, ar);
            assert!((MIN_PIXELS..=MAX_PIXELS).contains(&d.width), "{d:?}");
            assert!((MIN_PIXELS..=MAX_PIXELS).contains(&d.height), "{d:?}");
        }
    }

    #[test]
    fn pixel_size_tracks_aspect_ratio() {
        let d = optimal_pixel_size(1.0e8, 10.0, 2.0);
        let ratio = d.width as f64 / d.height as f64;
        assert!((ratio - 2.0).abs() < 0.01, "{d:?}");
        let product = d.width as f64 * d.height as f64;
        assert!((product - 1.0e6).abs() / 1.0e6 < 0.01);
    }

    #[test]
    fn bbox_serializes_as_array() {
        let json = serde_json::to_string(&santiago()).unwrap();
        assert_eq!(json, "[-70.6,-33.5,-70.5,-33.4]");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, santiago());
        assert!(serde_json::from_str::<BoundingBox>("[1.0,1.0,0.0,0.0]").is_err());
    }
}
