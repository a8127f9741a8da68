//! Catalog search: request/response models, the service seam and the
//! paginated date search built on it.
use std::future::Future;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::geometry::BoundingBox;
use crate::core::mode::{self, AcquisitionMode};
use crate::core::render::DataCollection;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// One catalog search: bbox, inclusive date window, collection and optional
/// quality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub bbox: BoundingBox,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub collection: DataCollection,
    pub max_cloud_coverage: Option<f64>,
    pub limit: u32,
}

impl CatalogQuery {
    pub fn new(bbox: BoundingBox, from: NaiveDate, to: NaiveDate, collection: DataCollection) -> Self {
        Self {
            bbox,
            from,
            to,
            collection,
            max_cloud_coverage: None,
            limit: 100,
        }
    }

    pub fn max_cloud_coverage(mut self, percent: Option<f64>) -> Self {
        self.max_cloud_coverage = percent;
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = n;
        self
    }

    /// Request body for one page, continuing from `next` when given.
    pub fn to_body(&self, next: Option<&serde_json::Value>) -> CatalogSearchBody {
        let (filter, filter_lang) = match self.max_cloud_coverage {
            Some(cc) => (
                Some(format!("eo:cloud_cover < {cc}")),
                Some("cql2-text".to_string()),
            ),
            None => (None, None),
        };
        CatalogSearchBody {
            bbox: self.bbox.to_array().to_vec(),
            datetime: format!("{}T00:00:00Z/{}T23:59:59Z", self.from, self.to),
            collections: vec![self.collection.id().to_string()],
            limit: self.limit,
            next: next.cloned(),
            filter,
            filter_lang,
        }
    }
}

/// Body for `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSearchBody {
    pub bbox: Vec<f64>,
    pub datetime: String,
    pub collections: Vec<String>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "filter-lang", skip_serializing_if = "Option::is_none")]
    pub filter_lang: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub features: Vec<SceneDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CatalogContext>,
}

impl CatalogPage {
    /// Continuation token, if the catalog has more results.
    pub fn next_token(&self) -> Option<&serde_json::Value> {
        self.context
            .as_ref()
            .and_then(|c| c.next.as_ref())
            .filter(|v| !v.is_null())
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned: Option<u64>,
}

/// Catalog feature; only the properties the resolver needs are modeled.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneDescriptor {
    pub id: String,
    pub properties: SceneProperties,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SceneProperties {
    pub datetime: Option<String>,
    #[serde(rename = "eo:cloud_cover", default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    #[serde(rename = "sar:polarizations", default, skip_serializing_if = "Vec::is_empty")]
    pub polarizations: Vec<String>,
    #[serde(rename = "sar:instrument_mode", default, skip_serializing_if = "Option::is_none")]
    pub instrument_mode: Option<String>,
}

/// Transient candidate scene derived from a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneCandidate {
    pub id: String,
    pub acquisition_date: NaiveDate,
    pub polarization_mode: AcquisitionMode,
    /// Cloud coverage percent for optical scenes.
    pub quality_metric: Option<f64>,
}

fn parse_acquisition_date(datetime: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(datetime)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            datetime
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
}

impl SceneDescriptor {
    /// `None` when the descriptor carries no parseable acquisition time.
    pub fn to_candidate(&self) -> Option<SceneCandidate> {
        let acquisition_date = self
            .properties
            .datetime
            .as_deref()
            .and_then(parse_acquisition_date)?;
        Some(SceneCandidate {
            id: self.id.clone(),
            acquisition_date,
            polarization_mode: mode::from_metadata(
                &self.id,
                &self.properties.polarizations,
                self.properties.instrument_mode.as_deref(),
            ),
            quality_metric: self.properties.cloud_cover,
        })
    }
}

// ---------------------------------------------------------------------------
// Service seam
// ---------------------------------------------------------------------------

pub trait CatalogService: Send + Sync {
    /// Fetch one page of results, continuing from `next` when given.
    fn search_page(
        &self,
        query: &CatalogQuery,
        next: Option<&serde_json::Value>,
    ) -> impl Future<Output = Result<CatalogPage>> + Send;
}

impl<T: CatalogService> CatalogService for std::sync::Arc<T> {
    fn search_page(
        &self,
        query: &CatalogQuery,
        next: Option<&serde_json::Value>,
    ) -> impl Future<Output = Result<CatalogPage>> + Send {
        (**self).search_page(query, next)
    }
}

/// Follow continuation tokens until exhausted or `max_items` descriptors have
/// been collected.
pub async fn search_all<C: CatalogService>(
    catalog: &C,
    query: &CatalogQuery,
    max_items: usize,
) -> Result<Vec<SceneDescriptor>> {
    let mut all: Vec<SceneDescriptor> = Vec::new();
    let mut page = catalog.search_page(query, None).await?;
    let mut pages = 1;

    loop {
        let next = page.next_token().cloned();
        all.extend(page.features.drain(..));

        if all.len() >= max_items {
            debug!("Catalog cap of {} descriptors reached", max_items);
            break;
        }

        match next {
            Some(token) => {
                page = catalog.search_page(query, Some(&token)).await?;
                pages += 1;
                if page.is_empty() {
                    break;
                }
            }
            None => break,
        }
    }

    all.truncate(max_items);
    info!(
        "Catalog search {}..{} returned {} descriptors over {} page(s)",
        query.from,
        query.to,
        all.len(),
        pages
    );
    Ok(all)
}

/// Candidates within the query window, newest first.
pub async fn find_candidates<C: CatalogService>(
    catalog: &C,
    query: &CatalogQuery,
    max_items: usize,
) -> Result<Vec<SceneCandidate>> {
    let mut candidates: Vec<SceneCandidate> = search_all(catalog, query, max_items)
        .await?
        .iter()
        .filter_map(SceneDescriptor::to_candidate)
        .collect();
    candidates.sort_by(|a, b| b.acquisition_date.cmp(&a.acquisition_date));
    Ok(candidates)
}

/// Distinct acquisition dates within the query window, newest first.
pub async fn find_dates<C: CatalogService>(
    catalog: &C,
    query: &CatalogQuery,
    max_items: usize,
) -> Result<Vec<NaiveDate>> {
    let mut dates: Vec<NaiveDate> = find_candidates(catalog, query, max_items)
        .await?
        .into_iter()
        .map(|c| c.acquisition_date)
        .collect();
    dates.dedup();
    Ok(dates)
}
