//! Shared types and enums used across sarscene.
//! Includes `Polarization`, `InstrumentMode`, `SampleType`, `OutputFormat`,
//! `Season`, `RenderVariant`, `AggregationStrategy` and `FallbackTier`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarization {
    Vv,
    Vh,
    Hh,
    Hv,
}

impl Polarization {
    /// Band name as used in remote per-pixel scripts.
    pub fn band_name(&self) -> &'static str {
        match self {
            Polarization::Vv => "VV",
            Polarization::Vh => "VH",
            Polarization::Hh => "HH",
            Polarization::Hv => "HV",
        }
    }

    /// Cross-polarized companion of a co-polarized channel.
    pub fn cross(&self) -> Polarization {
        match self {
            Polarization::Vv => Polarization::Vh,
            Polarization::Hh => Polarization::Hv,
            Polarization::Vh => Polarization::Vv,
            Polarization::Hv => Polarization::Hh,
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentMode {
    /// Interferometric Wide swath
    Iw,
    /// Extra Wide swath
    Ew,
    /// Stripmap
    Sm,
    /// Wave
    Wv,
}

impl std::fmt::Display for InstrumentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentMode::Iw => write!(f, "IW"),
            InstrumentMode::Ew => write!(f, "EW"),
            InstrumentMode::Sm => write!(f, "SM"),
            InstrumentMode::Wv => write!(f, "WV"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleType {
    Uint8,
    Uint16,
    Float32,
}

impl SampleType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleType::Uint8 => 1,
            SampleType::Uint16 => 2,
            SampleType::Float32 => 4,
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::Uint8 => write!(f, "UINT8"),
            SampleType::Uint16 => write!(f, "UINT16"),
            SampleType::Float32 => write!(f, "FLOAT32"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg, // Lossy, preview only
    Tiff,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Tiff => "image/tiff",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tiff",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub fn from_latitude(lat: f64) -> Self {
        if lat < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    /// Meteorological season for a calendar month (1-12).
    pub fn from_month(month: u32, hemisphere: Hemisphere) -> Season {
        let northern = match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        };
        match hemisphere {
            Hemisphere::North => northern,
            Hemisphere::South => northern.opposite(),
        }
    }

    pub fn opposite(&self) -> Season {
        match self {
            Season::Summer => Season::Winter,
            Season::Autumn => Season::Spring,
            Season::Winter => Season::Summer,
            Season::Spring => Season::Autumn,
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
        };
        write!(f, "{}", s)
    }
}

/// Visualization or measurement product requested from the imagery service.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderVariant {
    TrueColor,
    Ndvi,
    Highlight,
    RadarBackscatter,
    RadarLandCover,
    RadarWaterMask,
    RadarStatistics,
}

impl RenderVariant {
    pub fn is_radar(&self) -> bool {
        matches!(
            self,
            RenderVariant::RadarBackscatter
                | RenderVariant::RadarLandCover
                | RenderVariant::RadarWaterMask
                | RenderVariant::RadarStatistics
        )
    }

    /// Variants whose rules read the cross-polarized channel.
    pub fn needs_cross_polarization(&self) -> bool {
        matches!(
            self,
            RenderVariant::RadarLandCover | RenderVariant::RadarWaterMask
        )
    }
}

impl std::fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderVariant::TrueColor => write!(f, "TrueColor"),
            RenderVariant::Ndvi => write!(f, "Ndvi"),
            RenderVariant::Highlight => write!(f, "Highlight"),
            RenderVariant::RadarBackscatter => write!(f, "RadarBackscatter"),
            RenderVariant::RadarLandCover => write!(f, "RadarLandCover"),
            RenderVariant::RadarWaterMask => write!(f, "RadarWaterMask"),
            RenderVariant::RadarStatistics => write!(f, "RadarStatistics"),
        }
    }
}

/// How per-pixel backscatter is folded into one summary value.
///
/// `MeanOfDecibels` averages 10·log10(p) per pixel. `GeometricMean` takes the
/// geometric mean of linear power and converts that to dB. Both reduce speckle
/// the same way analytically; they differ only in where the epsilon floor and
/// rounding enter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    MeanOfDecibels,
    GeometricMean,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        AggregationStrategy::MeanOfDecibels
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationStrategy::MeanOfDecibels => write!(f, "MeanOfDecibels"),
            AggregationStrategy::GeometricMean => write!(f, "GeometricMean"),
        }
    }
}

/// Date-selection strategy of the fallback cascade, in priority order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    Exact,
    Curated,
    Neighborhood,
    RelaxedQuality,
}

impl std::fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackTier::Exact => write!(f, "exact date"),
            FallbackTier::Curated => write!(f, "curated date"),
            FallbackTier::Neighborhood => write!(f, "nearby date"),
            FallbackTier::RelaxedQuality => write!(f, "relaxed quality filter"),
        }
    }
}
