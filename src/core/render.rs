//! Render requests for the remote imagery-processing service.
//!
//! Every visualization goes through one builder parameterized by a
//! `VariantDescriptor` (collection, output sample type, format, bands,
//! quality filter and per-pixel script), instead of one hand-written
//! request body per product.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::classification::{land_cover_rules, thresholds_for, water_mask_rules};
use crate::core::geometry::{BoundingBox, PixelDimensions, Polygon};
use crate::core::mode::{AcquisitionMode, DEFAULT_MODE};
use crate::core::script;
use crate::error::{Error, Result};
use crate::types::{OutputFormat, RenderVariant, SampleType, Season};

pub const CRS84: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

/// Cloud coverage ceiling (percent) for optical variants.
pub const DEFAULT_MAX_CLOUD_COVERAGE: f64 = 20.0;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DataCollection {
    #[serde(rename = "sentinel-2-l2a")]
    Sentinel2L2a,
    #[serde(rename = "sentinel-1-grd")]
    Sentinel1Grd,
}

impl DataCollection {
    pub fn id(&self) -> &'static str {
        match self {
            DataCollection::Sentinel2L2a => "sentinel-2-l2a",
            DataCollection::Sentinel1Grd => "sentinel-1-grd",
        }
    }
}

impl std::fmt::Display for DataCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// What distinguishes one render variant from another.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDescriptor {
    pub variant: RenderVariant,
    pub collection: DataCollection,
    pub sample_type: SampleType,
    pub output_bands: usize,
    pub format: OutputFormat,
    /// `None` for collections without a quality filter (radar).
    pub max_cloud_coverage: Option<f64>,
    pub evalscript: String,
}

/// Descriptor for `variant`, using the acquisition mode for radar band names and
/// the season for classification thresholds.
///
/// Classification variants need the cross-polarized channel and are refused for
/// single-polarization modes.
pub fn describe(
    variant: RenderVariant,
    mode: &AcquisitionMode,
    season: Option<Season>,
) -> Result<VariantDescriptor> {
    check_mode(variant, mode, variant.needs_cross_polarization())?;
    Ok(descriptor_for(variant, mode, season))
}

fn check_mode(variant: RenderVariant, mode: &AcquisitionMode, needs_cross: bool) -> Result<()> {
    if needs_cross && !mode.is_dual() {
        return Err(Error::DualPolarizationRequired {
            variant,
            polarization: mode.primary_polarization,
        });
    }
    Ok(())
}

fn descriptor_for(
    variant: RenderVariant,
    mode: &AcquisitionMode,
    season: Option<Season>,
) -> VariantDescriptor {
    let optical = |evalscript: String, output_bands: usize| VariantDescriptor {
        variant,
        collection: DataCollection::Sentinel2L2a,
        sample_type: SampleType::Uint8,
        output_bands,
        format: OutputFormat::Png,
        max_cloud_coverage: Some(DEFAULT_MAX_CLOUD_COVERAGE),
        evalscript,
    };
    let radar = |evalscript: String, sample_type, output_bands, format| VariantDescriptor {
        variant,
        collection: DataCollection::Sentinel1Grd,
        sample_type,
        output_bands,
        format,
        max_cloud_coverage: None,
        evalscript,
    };
    let thresholds = thresholds_for(season);

    match variant {
        RenderVariant::TrueColor => optical(script::true_color_script(3000.0, 1.5), 3),
        RenderVariant::Ndvi => optical(script::ndvi_script(), 4),
        RenderVariant::Highlight => optical(script::highlight_script(), 4),
        RenderVariant::RadarBackscatter => radar(
            script::radar_backscatter_script(mode.primary_polarization, -25.0, 5.0),
            SampleType::Uint8,
            2,
            OutputFormat::Png,
        ),
        RenderVariant::RadarLandCover => radar(
            script::classification_script(
                &land_cover_rules(&thresholds),
                mode.primary_polarization,
            ),
            SampleType::Uint8,
            1,
            OutputFormat::Png,
        ),
        RenderVariant::RadarWaterMask => radar(
            script::classification_script(
                &water_mask_rules(&thresholds),
                mode.primary_polarization,
            ),
            SampleType::Uint8,
            1,
            OutputFormat::Png,
        ),
        RenderVariant::RadarStatistics => {
            let pols = mode.polarizations();
            let bands = pols.len() + 1;
            radar(
                script::radar_statistics_script(&pols),
                SampleType::Float32,
                bands,
                OutputFormat::Tiff,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub input: RenderInput,
    pub output: RenderOutput,
    pub evalscript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    pub bounds: Bounds,
    pub data: Vec<DataSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub bbox: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeoJsonPolygon>,
    pub properties: BoundsProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsProperties {
    pub crs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPolygon {
    #[serde(rename = "type")]
    pub type_: String,
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub type_: DataCollection,
    #[serde(rename = "dataFilter")]
    pub data_filter: DataFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing: Option<RadarProcessing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilter {
    pub time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cloud_coverage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl TimeRange {
    /// The whole UTC day of `date`.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            from: format!("{date}T00:00:00Z"),
            to: format!("{date}T23:59:59Z"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarProcessing {
    pub back_coeff: String,
    pub orthorectify: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub width: u32,
    pub height: u32,
    pub responses: Vec<OutputResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputResponse {
    pub identifier: String,
    pub format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub type_: String,
}

/// Sentinel-1 product polarization filter code (`DV`, `SV`, `DH`, `SH`).
fn polarization_filter(mode: &AcquisitionMode) -> String {
    let prefix = if mode.is_dual() { 'D' } else { 'S' };
    let suffix = match mode.primary_polarization {
        crate::types::Polarization::Hh | crate::types::Polarization::Hv => 'H',
        _ => 'V',
    };
    format!("{prefix}{suffix}")
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder producing a `RenderRequest` for one date.
///
/// The resolver keeps one builder per request and re-targets it with
/// `date` / `max_cloud_coverage` for each fallback attempt.
#[derive(Debug, Clone)]
pub struct RenderRequestBuilder {
    descriptor: VariantDescriptor,
    mode: AcquisitionMode,
    season: Option<Season>,
    bbox: BoundingBox,
    polygon: Option<Polygon>,
    dimensions: PixelDimensions,
    date: Option<NaiveDate>,
    max_cloud_coverage: Option<f64>,
    dual_polarization: bool,
}

impl RenderRequestBuilder {
    pub fn new(variant: RenderVariant, bbox: BoundingBox, dimensions: PixelDimensions) -> Self {
        Self::from_descriptor(descriptor_for(variant, &DEFAULT_MODE, None), bbox, dimensions)
    }

    pub fn from_descriptor(
        descriptor: VariantDescriptor,
        bbox: BoundingBox,
        dimensions: PixelDimensions,
    ) -> Self {
        let max_cloud_coverage = descriptor.max_cloud_coverage;
        Self {
            descriptor,
            mode: DEFAULT_MODE,
            season: None,
            bbox,
            polygon: None,
            dimensions,
            date: None,
            max_cloud_coverage,
            dual_polarization: false,
        }
    }

    /// Only accept dual-polarization modes from here on, for renders whose
    /// output is classified locally.
    pub fn require_dual_polarization(mut self) -> Result<Self> {
        self.dual_polarization = true;
        check_mode(self.descriptor.variant, &self.mode, true)?;
        Ok(self)
    }

    pub fn requires_dual_polarization(&self) -> bool {
        self.dual_polarization || self.descriptor.variant.needs_cross_polarization()
    }

    /// Rebuild the descriptor for a specific acquisition mode and season.
    pub fn mode_and_season(mut self, mode: AcquisitionMode, season: Option<Season>) -> Result<Self> {
        check_mode(self.descriptor.variant, &mode, self.requires_dual_polarization())?;
        let descriptor = descriptor_for(self.descriptor.variant, &mode, season);
        self.max_cloud_coverage = descriptor.max_cloud_coverage;
        self.descriptor = descriptor;
        self.mode = mode;
        self.season = season;
        Ok(self)
    }

    /// Re-target the acquisition mode, keeping the season and any quality
    /// override already applied.
    pub fn acquisition_mode(mut self, mode: AcquisitionMode) -> Result<Self> {
        check_mode(self.descriptor.variant, &mode, self.requires_dual_polarization())?;
        if mode != self.mode {
            self.descriptor = descriptor_for(self.descriptor.variant, &mode, self.season);
            self.mode = mode;
        }
        Ok(self)
    }

    /// Clip the render to the polygon rather than its bbox.
    pub fn geometry(mut self, polygon: Polygon) -> Self {
        self.polygon = Some(polygon);
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Override the quality filter. Ignored for collections without one.
    pub fn max_cloud_coverage(mut self, percent: f64) -> Self {
        if self.descriptor.max_cloud_coverage.is_some() {
            self.max_cloud_coverage = Some(percent);
        }
        self
    }

    pub fn descriptor(&self) -> &VariantDescriptor {
        &self.descriptor
    }

    pub fn mode(&self) -> &AcquisitionMode {
        &self.mode
    }

    pub fn season(&self) -> Option<Season> {
        self.season
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn dimensions(&self) -> PixelDimensions {
        self.dimensions
    }

    pub fn current_max_cloud_coverage(&self) -> Option<f64> {
        self.max_cloud_coverage
    }

    /// Assemble the request. A builder without a date targets today's UTC day.
    pub fn build(&self) -> RenderRequest {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let is_radar = self.descriptor.variant.is_radar();

        let data_filter = DataFilter {
            time_range: TimeRange::day(date),
            max_cloud_coverage: self.max_cloud_coverage,
            acquisition_mode: is_radar.then(|| self.mode.instrument_mode.to_string()),
            polarization: is_radar.then(|| polarization_filter(&self.mode)),
        };
        let processing = is_radar.then(|| RadarProcessing {
            back_coeff: "GAMMA0_ELLIPSOID".to_string(),
            orthorectify: true,
        });

        RenderRequest {
            input: RenderInput {
                bounds: Bounds {
                    bbox: self.bbox.to_array(),
                    geometry: self.polygon.as_ref().map(|p| GeoJsonPolygon {
                        type_: "Polygon".to_string(),
                        coordinates: vec![p.ring.clone()],
                    }),
                    properties: BoundsProperties {
                        crs: CRS84.to_string(),
                    },
                },
                data: vec![DataSource {
                    type_: self.descriptor.collection,
                    data_filter,
                    processing,
                }],
            },
            output: RenderOutput {
                width: self.dimensions.width,
                height: self.dimensions.height,
                responses: vec![OutputResponse {
                    identifier: "default".to_string(),
                    format: ResponseFormat {
                        type_: self.descriptor.format.mime_type().to_string(),
                    },
                }],
            },
            evalscript: self.descriptor.evalscript.clone(),
        }
    }
}
