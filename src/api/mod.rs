//! High-level library API: plan a request from a polygon, then render,
//! measure, classify or compare scenes through `SceneService`. Prefer these
//! entrypoints over the low-level `core` modules when integrating sarscene.
use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::classification::{
    CoverClass, class_histogram, classify_raster, land_cover_rules, thresholds_for,
    water_mask_rules,
};
use crate::core::geometry::{
    AreaEstimate, BoundingBox, PixelDimensions, Polygon, bbox_of, estimate, optimal_pixel_size,
};
use crate::core::mode;
use crate::core::params::ResolverConfig;
use crate::core::render::RenderRequestBuilder;
use crate::core::resolver::{Resolution, SceneResolver, neighborhood_order};
use crate::core::stats::{BandLayout, RadarStatistics, RasterBuffer, summarize_raster};
use crate::error::{Error, Result};
use crate::io::catalog::{CatalogQuery, CatalogService, find_dates};
use crate::io::imagery::ImageryService;
use crate::io::raster::decode_payload;
use crate::types::{FallbackTier, Hemisphere, RenderVariant, Season};

/// Inbound request: an area, a date and what to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub date: NaiveDate,
    /// Second date for side-by-side statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_date: Option<NaiveDate>,
    /// Overrides the season derived from the date and hemisphere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
    #[serde(default = "default_variant")]
    pub variant: RenderVariant,
    /// Meters per pixel; the resolver default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_m: Option<f64>,
    /// Scene identifier whose acquisition mode should be assumed for radar renders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
}

fn default_variant() -> RenderVariant {
    RenderVariant::TrueColor
}

impl SceneRequest {
    pub fn new(polygon: Option<Polygon>, bbox: Option<BoundingBox>, date: NaiveDate, variant: RenderVariant) -> Self {
        Self {
            polygon,
            bbox,
            date,
            compare_date: None,
            season: None,
            variant,
            resolution_m: None,
            scene_id: None,
        }
    }

    pub fn for_bbox(bbox: BoundingBox, date: NaiveDate, variant: RenderVariant) -> Self {
        Self::new(None, Some(bbox), date, variant)
    }

    pub fn for_polygon(polygon: Polygon, date: NaiveDate, variant: RenderVariant) -> Self {
        Self::new(Some(polygon), None, date, variant)
    }

    /// The polygon wins over an explicit bbox when both are given.
    pub fn area_bbox(&self) -> Result<BoundingBox> {
        match (&self.polygon, &self.bbox) {
            (Some(polygon), _) => bbox_of(polygon),
            (None, Some(bbox)) => Ok(*bbox),
            (None, None) => Err(Error::geometry("request carries neither polygon nor bbox")),
        }
    }

    /// Explicit season, else the season of the request month in the area's hemisphere.
    pub fn effective_season(&self, bbox: &BoundingBox) -> Season {
        self.season.unwrap_or_else(|| {
            let (_, lat) = bbox.center();
            Season::from_month(self.date.month(), Hemisphere::from_latitude(lat))
        })
    }
}

/// Geometry-derived sizing of a request, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePlan {
    pub bbox: BoundingBox,
    pub estimate: AreaEstimate,
    pub dimensions: PixelDimensions,
    pub resolution_m: f64,
    pub season: Season,
}

/// Size a request. Boxes without width or height are refused as `InvalidGeometry`.
pub fn plan(request: &SceneRequest, config: &ResolverConfig) -> Result<ScenePlan> {
    let bbox = request.area_bbox()?;
    if !bbox.has_extent() {
        return Err(Error::geometry(format!("area has no extent: {bbox}")));
    }
    let resolution_m = request.resolution_m.unwrap_or(config.default_resolution_m);
    if !(resolution_m > 0.0) || !resolution_m.is_finite() {
        return Err(Error::InvalidArgument {
            arg: "resolution",
            value: resolution_m.to_string(),
        });
    }
    let estimate = estimate(&bbox);
    let dimensions = optimal_pixel_size(estimate.area_m2, resolution_m, estimate.aspect_ratio);
    Ok(ScenePlan {
        bbox,
        estimate,
        dimensions,
        resolution_m,
        season: request.effective_season(&bbox),
    })
}

/// Successful response envelope; `T` carries the product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene<T> {
    pub has_coverage: bool,
    pub resolved_date: NaiveDate,
    pub used_bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub tier: FallbackTier,
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub payload: T,
}

/// Expected "nothing to show" response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoCoverage {
    pub has_coverage: bool,
    pub attempted_dates: Vec<NaiveDate>,
    pub suggested_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SceneResponse<T> {
    Covered(Scene<T>),
    NoCoverage(NoCoverage),
}

impl<T> SceneResponse<T> {
    pub fn has_coverage(&self) -> bool {
        matches!(self, SceneResponse::Covered(_))
    }

    pub fn scene(&self) -> Option<&Scene<T>> {
        match self {
            SceneResponse::Covered(s) => Some(s),
            SceneResponse::NoCoverage(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub content_type: String,
    pub size_bytes: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsPayload {
    pub statistics: RadarStatistics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedPayload {
    pub season: Season,
    /// Pixel count per class.
    pub histogram: BTreeMap<CoverClass, usize>,
    /// Encoded class bytes (class × 50), `(rows, cols)`.
    #[serde(skip)]
    pub classes: Array2<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub primary: SceneResponse<StatisticsPayload>,
    pub secondary: SceneResponse<StatisticsPayload>,
    /// Change of mean co-polarized backscatter, secondary minus primary.
    pub co_polarized_change_db: Option<f64>,
}

fn class_from_code(code: u8, water_mask: bool) -> CoverClass {
    match code {
        1 => CoverClass::Water,
        2 => CoverClass::DenseVegetation,
        3 => CoverClass::Forest,
        4 => CoverClass::LowVegetation,
        5 if water_mask => CoverClass::NotWater,
        5 => CoverClass::BareSoilUrban,
        _ => CoverClass::NoData,
    }
}

fn ensure_dual(variant: RenderVariant, builder: &RenderRequestBuilder) -> Result<()> {
    let mode = builder.mode();
    if !mode.is_dual() {
        return Err(Error::DualPolarizationRequired {
            variant,
            polarization: mode.primary_polarization,
        });
    }
    Ok(())
}

/// Entry point tying geometry, resolution and decoding together.
pub struct SceneService<C, I> {
    catalog: C,
    imagery: I,
    config: ResolverConfig,
}

impl<C: CatalogService, I: ImageryService> SceneService<C, I> {
    pub fn new(catalog: C, imagery: I, config: ResolverConfig) -> Self {
        Self {
            catalog,
            imagery,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn builder(
        &self,
        request: &SceneRequest,
        plan: &ScenePlan,
        variant: RenderVariant,
    ) -> Result<RenderRequestBuilder> {
        let mode = request
            .scene_id
            .as_deref()
            .map(mode::classify)
            .unwrap_or(mode::DEFAULT_MODE);
        let mut builder = RenderRequestBuilder::new(variant, plan.bbox, plan.dimensions)
            .mode_and_season(mode, Some(plan.season))?;
        if let Some(polygon) = &request.polygon {
            builder = builder.geometry(polygon.clone());
        }
        Ok(builder)
    }

    /// Resolve `date` for `variant`; `Ok(Err(no_coverage))` when every tier failed.
    async fn resolve(
        &self,
        request: &SceneRequest,
        variant: RenderVariant,
        date: NaiveDate,
    ) -> Result<(ScenePlan, std::result::Result<Resolution, NoCoverage>)> {
        let plan = plan(request, &self.config)?;
        let builder = self.builder(request, &plan, variant)?;
        let outcome = self.resolve_with(&builder, date).await?;
        Ok((plan, outcome))
    }

    async fn resolve_with(
        &self,
        builder: &RenderRequestBuilder,
        date: NaiveDate,
    ) -> Result<std::result::Result<Resolution, NoCoverage>> {
        let resolver = SceneResolver::new(&self.catalog, &self.imagery, &self.config);
        match resolver.resolve(builder, date).await {
            Ok(resolution) => Ok(Ok(resolution)),
            Err(Error::NoCoverageFound { attempted }) => {
                let suggested_dates = self.suggest_dates(builder, date).await?;
                Ok(Err(NoCoverage {
                    has_coverage: false,
                    attempted_dates: attempted,
                    suggested_dates,
                }))
            }
            Err(e) => Err(e),
        }
    }

    /// Catalog dates near `date`, nearest first, for the no-coverage response.
    async fn suggest_dates(&self, builder: &RenderRequestBuilder, date: NaiveDate) -> Result<Vec<NaiveDate>> {
        let window = Duration::days(self.config.suggestion_window_days);
        let relaxed = builder
            .descriptor()
            .max_cloud_coverage
            .map(|_| self.config.relaxed_max_cloud_coverage);
        let query = CatalogQuery::new(
            *builder.bbox(),
            date - window,
            date + window,
            builder.descriptor().collection,
        )
        .max_cloud_coverage(relaxed)
        .limit(self.config.catalog_page_size);
        let dates = find_dates(&self.catalog, &query, self.config.max_catalog_items).await?;
        let mut suggested = neighborhood_order(date, &dates, self.config.suggestion_window_days);
        suggested.truncate(self.config.suggestion_limit);
        if suggested.is_empty() {
            warn!("No dates to suggest within {} days of {}", self.config.suggestion_window_days, date);
        }
        Ok(suggested)
    }

    fn envelope<T>(plan: &ScenePlan, resolution: &Resolution, payload: T) -> Scene<T> {
        let dims = resolution.builder.dimensions();
        Scene {
            has_coverage: true,
            resolved_date: resolution.used_date,
            used_bbox: plan.bbox,
            width: dims.width,
            height: dims.height,
            tier: resolution.tier,
            warnings: resolution.warnings.clone(),
            payload,
        }
    }

    /// Resolve and render the request's variant, returning the encoded image.
    pub async fn render(&self, request: &SceneRequest) -> Result<SceneResponse<ImagePayload>> {
        let (plan, outcome) = self.resolve(request, request.variant, request.date).await?;
        let resolution = match outcome {
            Ok(r) => r,
            Err(none) => return Ok(SceneResponse::NoCoverage(none)),
        };
        let payload = ImagePayload {
            content_type: resolution.payload.content_type.clone(),
            size_bytes: resolution.payload.len(),
            bytes: resolution.payload.bytes.clone(),
        };
        Ok(SceneResponse::Covered(Self::envelope(&plan, &resolution, payload)))
    }

    /// Radar backscatter statistics for `date`.
    pub async fn statistics_on(
        &self,
        request: &SceneRequest,
        date: NaiveDate,
    ) -> Result<SceneResponse<StatisticsPayload>> {
        let (plan, outcome) = self
            .resolve(request, RenderVariant::RadarStatistics, date)
            .await?;
        let resolution = match outcome {
            Ok(r) => r,
            Err(none) => return Ok(SceneResponse::NoCoverage(none)),
        };
        let raster = self.decode(&resolution)?;
        let layout = BandLayout::for_mode(resolution.builder.mode());
        let statistics = summarize_raster(
            &raster,
            &layout,
            self.config.aggregation,
            self.config.db_epsilon,
        )?;
        info!(
            "{}: {} of {} pixels valid",
            resolution.used_date,
            statistics.co_polarized.valid_pixels,
            statistics.co_polarized.total_pixels
        );
        Ok(SceneResponse::Covered(Self::envelope(
            &plan,
            &resolution,
            StatisticsPayload { statistics },
        )))
    }

    pub async fn statistics(&self, request: &SceneRequest) -> Result<SceneResponse<StatisticsPayload>> {
        self.statistics_on(request, request.date).await
    }

    /// Fetch the statistics raster and classify it locally with the seasonal
    /// land-cover (or water-mask) rule table.
    ///
    /// Only dual-polarization acquisitions can be classified: a single-pol
    /// `scene_id` is refused up front, and single-pol catalog candidates are
    /// skipped during resolution.
    pub async fn classify(&self, request: &SceneRequest) -> Result<SceneResponse<ClassifiedPayload>> {
        let water_mask = request.variant == RenderVariant::RadarWaterMask;
        let plan = plan(request, &self.config)?;
        let builder = self.builder(request, &plan, RenderVariant::RadarStatistics)?;
        ensure_dual(request.variant, &builder)?;
        let builder = builder.require_dual_polarization()?;

        let resolution = match self.resolve_with(&builder, request.date).await? {
            Ok(r) => r,
            Err(none) => return Ok(SceneResponse::NoCoverage(none)),
        };
        ensure_dual(request.variant, &resolution.builder)?;
        let raster = self.decode(&resolution)?;
        let layout = BandLayout::for_mode(resolution.builder.mode());
        let thresholds = thresholds_for(Some(plan.season));
        let table = if water_mask {
            water_mask_rules(&thresholds)
        } else {
            land_cover_rules(&thresholds)
        };
        let classes = classify_raster(&raster, &layout, &table)?;
        let histogram = class_histogram(&classes)
            .into_iter()
            .map(|(code, n)| (class_from_code(code, water_mask), n))
            .collect();
        Ok(SceneResponse::Covered(Self::envelope(
            &plan,
            &resolution,
            ClassifiedPayload {
                season: plan.season,
                histogram,
                classes,
            },
        )))
    }

    /// Statistics for the request date and its comparison date, fetched concurrently.
    pub async fn compare(&self, request: &SceneRequest) -> Result<Comparison> {
        let other = request.compare_date.ok_or_else(|| Error::InvalidArgument {
            arg: "compare_date",
            value: "missing".to_string(),
        })?;
        let (primary, secondary) = tokio::try_join!(
            self.statistics_on(request, request.date),
            self.statistics_on(request, other)
        )?;
        let mean = |r: &SceneResponse<StatisticsPayload>| {
            r.scene().and_then(|s| s.payload.statistics.co_polarized.mean)
        };
        let co_polarized_change_db = match (mean(&primary), mean(&secondary)) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };
        Ok(Comparison {
            primary,
            secondary,
            co_polarized_change_db,
        })
    }

    fn decode(&self, resolution: &Resolution) -> Result<RasterBuffer> {
        let descriptor = resolution.builder.descriptor();
        let dims = resolution.builder.dimensions();
        decode_payload(
            &resolution.payload,
            dims.width as usize,
            dims.height as usize,
            descriptor.output_bands,
            descriptor.sample_type,
        )
    }

    /// Distinct acquisition dates in `[from, to]` for the request area.
    pub async fn available_dates(
        &self,
        request: &SceneRequest,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let plan = plan(request, &self.config)?;
        let builder = self.builder(request, &plan, request.variant)?;
        let query = CatalogQuery::new(plan.bbox, from, to, builder.descriptor().collection)
            .max_cloud_coverage(builder.current_max_cloud_coverage())
            .limit(self.config.catalog_page_size);
        find_dates(&self.catalog, &query, self.config.max_catalog_items).await
    }
}
