//! Raw raster parsing and robust backscatter statistics.
//!
//! Rasters arrive pixel-interleaved (`[b0, b1, .., bn]` per pixel, row-major).
//! Radar statistics rasters carry linear power bands followed by a data mask
//! band; masked or non-positive pixels are excluded from every aggregate,
//! never zero-filled.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::mode::AcquisitionMode;
use crate::error::{Error, Result};
use crate::types::{AggregationStrategy, SampleType};

/// Floor applied to linear power before taking logarithms.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Typed raster samples with their declared shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub sample_type: SampleType,
}

impl RasterBuffer {
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        band_count: usize,
        sample_type: SampleType,
    ) -> Result<Self> {
        let expected = expected_len(width, height, band_count)?;
        if data.len() != expected {
            return Err(Error::MalformedRaster(format!(
                "{} samples for {}x{}x{} raster (expected {})",
                data.len(),
                width,
                height,
                band_count,
                expected
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            band_count,
            sample_type,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn sample(&self, pixel: usize, band: usize) -> f32 {
        self.data[pixel * self.band_count + band]
    }

    /// Copy one band out as a `(rows, cols)` array.
    pub fn band(&self, band: usize) -> Result<Array2<f32>> {
        if band >= self.band_count {
            return Err(Error::MalformedRaster(format!(
                "band {} requested from {}-band raster",
                band, self.band_count
            )));
        }
        let values: Vec<f32> = self
            .data
            .iter()
            .skip(band)
            .step_by(self.band_count)
            .copied()
            .collect();
        Array2::from_shape_vec((self.height, self.width), values)
            .map_err(|e| Error::MalformedRaster(e.to_string()))
    }
}

/// Band positions of a radar statistics raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    pub co: usize,
    pub cross: Option<usize>,
    pub mask: Option<usize>,
}

impl BandLayout {
    /// `[co, cross, mask]`
    pub const DUAL: BandLayout = BandLayout {
        co: 0,
        cross: Some(1),
        mask: Some(2),
    };
    /// `[co, mask]`
    pub const SINGLE: BandLayout = BandLayout {
        co: 0,
        cross: None,
        mask: Some(1),
    };
    /// `[co]`, every pixel in the data footprint.
    pub const UNMASKED: BandLayout = BandLayout {
        co: 0,
        cross: None,
        mask: None,
    };

    /// Layout of the statistics raster rendered for `mode`.
    pub fn for_mode(mode: &AcquisitionMode) -> Self {
        if mode.is_dual() {
            Self::DUAL
        } else {
            Self::SINGLE
        }
    }

    pub fn band_count(&self) -> usize {
        1 + usize::from(self.cross.is_some()) + usize::from(self.mask.is_some())
    }

    /// The raster must carry exactly the bands this layout names.
    pub fn check(&self, raster: &RasterBuffer) -> Result<()> {
        if raster.band_count != self.band_count() {
            return Err(Error::MalformedRaster(format!(
                "{}-band raster for a {}-band layout",
                raster.band_count,
                self.band_count()
            )));
        }
        Ok(())
    }
}

fn expected_len(width: usize, height: usize, band_count: usize) -> Result<usize> {
    if width == 0 || height == 0 || band_count == 0 {
        return Err(Error::MalformedRaster(format!(
            "empty raster shape {}x{}x{}",
            width, height, band_count
        )));
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(band_count))
        .ok_or_else(|| Error::MalformedRaster("raster shape overflows".into()))
}

/// Interpret little-endian bytes as a pixel-interleaved raster of `sample_type`.
pub fn parse_raster(
    bytes: &[u8],
    width: usize,
    height: usize,
    band_count: usize,
    sample_type: SampleType,
) -> Result<RasterBuffer> {
    let expected = expected_len(width, height, band_count)?;
    let bps = sample_type.bytes_per_sample();
    if bytes.len() != expected * bps {
        return Err(Error::MalformedRaster(format!(
            "{} bytes for {}x{}x{} {} raster (expected {})",
            bytes.len(),
            width,
            height,
            band_count,
            sample_type,
            expected * bps
        )));
    }

    let data: Vec<f32> = match sample_type {
        SampleType::Uint8 => bytes.iter().map(|&b| b as f32).collect(),
        SampleType::Uint16 => bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        SampleType::Float32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };

    RasterBuffer::new(data, width, height, band_count, sample_type)
}

/// 10·log10(max(linear, epsilon)); finite for zero and negative input.
#[inline]
pub fn to_decibel(linear: f64, epsilon: f64) -> f64 {
    10.0 * linear.max(epsilon).log10()
}

/// One pixel of a linear-power band with its companion mask value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub linear: f64,
    pub mask: f64,
}

impl Sample {
    pub fn new(linear: f64, mask: f64) -> Self {
        Self { linear, mask }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidSample {
    pub linear: f64,
    pub db: f64,
}

/// A pixel counts when its mask is set (non-zero, not NaN) and its linear
/// power is positive.
#[inline]
pub fn is_valid_pixel(linear: f64, mask: f64) -> bool {
    mask != 0.0 && !mask.is_nan() && linear > 0.0
}

/// `Some` only for unmasked pixels with positive linear power.
#[inline]
pub fn mask_and_convert(sample: Sample, epsilon: f64) -> Option<ValidSample> {
    if !is_valid_pixel(sample.linear, sample.mask) {
        return None;
    }
    Some(ValidSample {
        linear: sample.linear,
        db: to_decibel(sample.linear, epsilon),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandStatistics {
    /// `None` when no pixel is valid; never NaN.
    pub mean: Option<f64>,
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub min_db: Option<f64>,
    pub max_db: Option<f64>,
    pub std_db: Option<f64>,
}

impl BandStatistics {
    fn empty(total_pixels: usize) -> Self {
        Self {
            mean: None,
            total_pixels,
            valid_pixels: 0,
            min_db: None,
            max_db: None,
            std_db: None,
        }
    }
}

/// Aggregate linear-power samples into dB statistics.
///
/// Min/max/std are always over per-pixel dB (Welford, single pass). The mean
/// follows `strategy`.
pub fn aggregate(samples: &[Sample], strategy: AggregationStrategy, epsilon: f64) -> BandStatistics {
    let mut count: u64 = 0;
    let mut min_db = f64::INFINITY;
    let mut max_db = f64::NEG_INFINITY;
    let mut mean = 0.0_f64;
    let mut m2 = 0.0_f64;
    let mut ln_sum = 0.0_f64;

    for v in samples.iter().filter_map(|&s| mask_and_convert(s, epsilon)) {
        count += 1;
        if v.db < min_db { min_db = v.db; }
        if v.db > max_db { max_db = v.db; }

        // Welford's online algorithm
        let delta = v.db - mean;
        mean += delta / (count as f64);
        let delta2 = v.db - mean;
        m2 += delta * delta2;

        ln_sum += v.linear.max(epsilon).ln();
    }

    if count == 0 {
        return BandStatistics::empty(samples.len());
    }

    let mean_value = match strategy {
        AggregationStrategy::MeanOfDecibels => mean,
        AggregationStrategy::GeometricMean => {
            let geo = (ln_sum / count as f64).exp();
            to_decibel(geo, epsilon)
        }
    };
    let std_db = if count > 1 { (m2 / (count as f64)).sqrt() } else { 0.0 };

    BandStatistics {
        mean: mean_value.is_finite().then_some(mean_value),
        total_pixels: samples.len(),
        valid_pixels: count as usize,
        min_db: Some(min_db),
        max_db: Some(max_db),
        std_db: Some(std_db),
    }
}

/// Statistics of a radar statistics raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarStatistics {
    pub strategy: AggregationStrategy,
    pub co_polarized: BandStatistics,
    pub cross_polarized: Option<BandStatistics>,
    /// Mean co − cross difference in dB when both means exist.
    pub ratio_db: Option<f64>,
}

/// Summarize a statistics raster laid out as `layout`.
pub fn summarize_raster(
    raster: &RasterBuffer,
    layout: &BandLayout,
    strategy: AggregationStrategy,
    epsilon: f64,
) -> Result<RadarStatistics> {
    layout.check(raster)?;
    let band_samples = |band: usize| -> Vec<Sample> {
        (0..raster.pixel_count())
            .map(|p| {
                let mask = layout.mask.map(|m| raster.sample(p, m) as f64).unwrap_or(1.0);
                Sample::new(raster.sample(p, band) as f64, mask)
            })
            .collect()
    };

    let co_polarized = aggregate(&band_samples(layout.co), strategy, epsilon);
    let cross_polarized = layout
        .cross
        .map(|band| aggregate(&band_samples(band), strategy, epsilon));
    let ratio_db = match (co_polarized.mean, cross_polarized.and_then(|c| c.mean)) {
        (Some(co), Some(cross)) => Some(co - cross),
        _ => None,
    };

    Ok(RadarStatistics {
        strategy,
        co_polarized,
        cross_polarized,
        ratio_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_db(db: f64) -> f64 {
        10f64.powf(db / 10.0)
    }

    #[test]
    fn decibel_floor_is_finite() {
        let zero = to_decibel(0.0, DEFAULT_EPSILON);
        let negative = to_decibel(-5.0, DEFAULT_EPSILON);
        assert!(zero.is_finite() && negative.is_finite());
        assert!((zero - -60.0).abs() < 1e-9);
        assert_eq!(zero, negative);
        assert!((to_decibel(0.1, DEFAULT_EPSILON) - -10.0).abs() < 1e-9);
    }

    #[test]
    fn aggregate_empty_and_all_masked() {
        let stats = aggregate(&[], AggregationStrategy::MeanOfDecibels, DEFAULT_EPSILON);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.valid_pixels, 0);
        assert_eq!(stats.total_pixels, 0);

        let masked = vec![Sample::new(0.1, 0.0), Sample::new(0.0, 1.0), Sample::new(-1.0, 1.0)];
        let stats = aggregate(&masked, AggregationStrategy::GeometricMean, DEFAULT_EPSILON);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.valid_pixels, 0);
        assert_eq!(stats.total_pixels, 3);
        let json = serde_json::to_value(stats).unwrap();
        assert!(json["mean"].is_null());
    }

    #[test]
    fn aggregate_four_valid_samples() {
        let mut samples: Vec<Sample> = [-10.0, -15.0, -30.0, -5.0]
            .iter()
            .map(|&db| Sample::new(from_db(db), 1.0))
            .collect();
        samples.push(Sample::new(0.5, 0.0));
        samples.push(Sample::new(0.0, 1.0));

        for strategy in [AggregationStrategy::MeanOfDecibels, AggregationStrategy::GeometricMean] {
            let stats = aggregate(&samples, strategy, DEFAULT_EPSILON);
            let mean = stats.mean.unwrap();
            assert!((mean - -15.0).abs() < 1e-9, "{strategy}: {mean}");
            assert_eq!(stats.valid_pixels, 4);
            assert_eq!(stats.total_pixels, 6);
            assert!((stats.min_db.unwrap() - -30.0).abs() < 1e-9);
            assert!((stats.max_db.unwrap() - -5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn parse_float32_raster() {
        let values: [f32; 6] = [0.1, 0.01, 1.0, 0.2, 0.02, 0.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let raster = parse_raster(&bytes, 2, 1, 3, SampleType::Float32).unwrap();
        assert_eq!(raster.data, values.to_vec());
        assert_eq!(raster.sample(1, 1), 0.02);
        let vh = raster.band(1).unwrap();
        assert_eq!(vh.dim(), (1, 2));
        assert_eq!(vh[[0, 0]], 0.01);
    }

    #[test]
    fn parse_integer_rasters() {
        let r = parse_raster(&[1, 2, 3, 4], 2, 2, 1, SampleType::Uint8).unwrap();
        assert_eq!(r.data, vec![1.0, 2.0, 3.0, 4.0]);

        let bytes: Vec<u8> = [500u16, 65535].iter().flat_map(|v| v.to_le_bytes()).collect();
        let r = parse_raster(&bytes, 1, 1, 2, SampleType::Uint16).unwrap();
        assert_eq!(r.data, vec![500.0, 65535.0]);
    }

    #[test]
    fn parse_rejects_inconsistent_length() {
        assert!(matches!(
            parse_raster(&[0u8; 7], 2, 1, 1, SampleType::Float32),
            Err(Error::MalformedRaster(_))
        ));
        assert!(matches!(
            parse_raster(&[], 0, 0, 1, SampleType::Uint8),
            Err(Error::MalformedRaster(_))
        ));
        assert!(matches!(
            RasterBuffer::new(vec![1.0; 5], 2, 2, 1, SampleType::Float32),
            Err(Error::MalformedRaster(_))
        ));
    }

    #[test]
    fn summarize_dual_pol_raster_with_mask() {
        let data = vec![
            0.1, 0.01, 1.0, //
            0.1, 0.01, 1.0, //
            5.0, 5.0, 0.0, // masked
            0.0, 0.01, 1.0, // non-positive co-pol
        ];
        let raster = RasterBuffer::new(data, 2, 2, 3, SampleType::Float32).unwrap();
        let stats = summarize_raster(
            &raster,
            &BandLayout::DUAL,
            AggregationStrategy::MeanOfDecibels,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert_eq!(stats.co_polarized.valid_pixels, 2);
        assert!((stats.co_polarized.mean.unwrap() - -10.0).abs() < 1e-5);
        let cross = stats.cross_polarized.unwrap();
        assert_eq!(cross.valid_pixels, 3);
        assert!((cross.mean.unwrap() - -20.0).abs() < 1e-5);
        assert!((stats.ratio_db.unwrap() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn summarize_single_band_without_mask() {
        let raster = RasterBuffer::new(vec![0.1, 0.1], 2, 1, 1, SampleType::Float32).unwrap();
        let stats = summarize_raster(
            &raster,
            &BandLayout::UNMASKED,
            AggregationStrategy::GeometricMean,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert_eq!(stats.co_polarized.valid_pixels, 2);
        assert!(stats.cross_polarized.is_none());
        assert!(stats.ratio_db.is_none());
    }

    #[test]
    fn single_pol_mask_band_is_not_read_as_cross() {
        // [co, mask]; the mask is 1.0 everywhere and must not show up as 0 dB VH
        let raster =
            RasterBuffer::new(vec![0.001, 1.0, 0.001, 0.0], 2, 1, 2, SampleType::Float32).unwrap();
        let stats = summarize_raster(
            &raster,
            &BandLayout::SINGLE,
            AggregationStrategy::MeanOfDecibels,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert_eq!(stats.co_polarized.valid_pixels, 1);
        assert!((stats.co_polarized.mean.unwrap() - -30.0).abs() < 1e-4);
        assert!(stats.cross_polarized.is_none());

        assert!(matches!(
            summarize_raster(&raster, &BandLayout::DUAL, AggregationStrategy::MeanOfDecibels, DEFAULT_EPSILON),
            Err(Error::MalformedRaster(_))
        ));
    }

    #[test]
    fn layout_follows_acquisition_mode() {
        let dual = crate::core::mode::classify("S1A_IW_GRDH_1SDV_x");
        let single = crate::core::mode::classify("S1A_IW_GRDH_1SSV_x");
        assert_eq!(BandLayout::for_mode(&dual), BandLayout::DUAL);
        assert_eq!(BandLayout::for_mode(&single), BandLayout::SINGLE);
        assert_eq!(BandLayout::DUAL.band_count(), 3);
        assert_eq!(BandLayout::SINGLE.band_count(), 2);
    }

    #[test]
    fn nan_mask_is_no_data() {
        assert!(!is_valid_pixel(0.1, f64::NAN));
        assert!(!is_valid_pixel(0.1, 0.0));
        assert!(!is_valid_pixel(f64::NAN, 1.0));
        assert!(is_valid_pixel(0.1, 1.0));
        assert!(mask_and_convert(Sample::new(0.1, f64::NAN), DEFAULT_EPSILON).is_none());
    }
}
