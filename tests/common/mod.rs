//! In-memory catalog and imagery services for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use sarscene::core::render::RenderRequest;
use sarscene::io::catalog::{
    CatalogContext, CatalogPage, CatalogQuery, CatalogService, SceneDescriptor, SceneProperties,
};
use sarscene::io::{ImageryService, RenderedPayload};
use sarscene::{BoundingBox, Error, Result};

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn santiago() -> BoundingBox {
    BoundingBox::new(-70.6, -33.5, -70.5, -33.4).unwrap()
}

pub fn madrid() -> BoundingBox {
    BoundingBox::new(-3.75, 40.38, -3.65, 40.45).unwrap()
}

/// Catalog holding fixed scenes, served `page_size` at a time.
pub struct FakeCatalog {
    scenes: Vec<SceneDescriptor>,
    page_size: usize,
    pub calls: Mutex<usize>,
}

impl FakeCatalog {
    pub fn new(page_size: usize) -> Self {
        Self {
            scenes: Vec::new(),
            page_size,
            calls: Mutex::new(0),
        }
    }

    pub fn scene(mut self, id: &str, date: &str, cloud_cover: Option<f64>) -> Self {
        self.scenes.push(SceneDescriptor {
            id: id.to_string(),
            properties: SceneProperties {
                datetime: Some(format!("{date}T10:30:00Z")),
                cloud_cover,
                ..Default::default()
            },
        });
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl CatalogService for FakeCatalog {
    async fn search_page(
        &self,
        query: &CatalogQuery,
        next: Option<&serde_json::Value>,
    ) -> Result<CatalogPage> {
        *self.calls.lock().unwrap() += 1;
        let matching: Vec<SceneDescriptor> = self
            .scenes
            .iter()
            .filter(|s| {
                let date = d(&s.properties.datetime.as_deref().unwrap()[..10]);
                let cloud_ok = match (query.max_cloud_coverage, s.properties.cloud_cover) {
                    (Some(max), Some(cc)) => cc < max,
                    _ => true,
                };
                date >= query.from && date <= query.to && cloud_ok
            })
            .cloned()
            .collect();

        let start = next.and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let end = (start + self.page_size).min(matching.len());
        let features = matching.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next = (end < matching.len()).then(|| serde_json::json!(end));
        Ok(CatalogPage {
            features,
            context: Some(CatalogContext {
                next,
                ..Default::default()
            }),
        })
    }
}

#[derive(Clone)]
pub enum Coverage {
    /// Payload of this many bytes for every request.
    Bytes(usize),
    /// Raw FLOAT32 `[co, cross, mask]` raster sized to the request.
    Radar { co: f32, cross: f32 },
    /// Raw FLOAT32 `[co, mask]` raster, as rendered for single-pol scenes.
    SingleRadar { co: f32 },
    /// Upstream failure.
    Fails(u16, &'static str),
}

/// Imagery service answering per (date, cloud filter); anything unlisted is empty.
pub struct FakeImagery {
    coverage: HashMap<NaiveDate, Coverage>,
    /// Dates that only render under a filter at least this permissive.
    min_cloud_filter: HashMap<NaiveDate, f64>,
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl FakeImagery {
    pub fn new() -> Self {
        Self {
            coverage: HashMap::new(),
            min_cloud_filter: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn covers(mut self, date: &str, coverage: Coverage) -> Self {
        self.coverage.insert(d(date), coverage);
        self
    }

    pub fn covers_if_relaxed(mut self, date: &str, min_filter: f64, coverage: Coverage) -> Self {
        self.min_cloud_filter.insert(d(date), min_filter);
        self.covers(date, coverage)
    }

    pub fn rendered_dates(&self) -> Vec<NaiveDate> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(request_date)
            .collect()
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn request_date(request: &RenderRequest) -> NaiveDate {
    d(&request.input.data[0].data_filter.time_range.from[..10])
}

fn radar_bytes(request: &RenderRequest, pixel: &[f32]) -> Vec<u8> {
    let pixels = (request.output.width * request.output.height) as usize;
    (0..pixels)
        .flat_map(|_| pixel.iter().copied())
        .flat_map(f32::to_le_bytes)
        .collect()
}

impl ImageryService for FakeImagery {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPayload> {
        self.requests.lock().unwrap().push(request.clone());
        let date = request_date(request);
        let filter = request.input.data[0].data_filter.max_cloud_coverage;

        if let Some(min) = self.min_cloud_filter.get(&date) {
            if filter.is_some_and(|f| f < *min) {
                return Err(Error::EmptyResult { service: "process" });
            }
        }
        match self.coverage.get(&date) {
            Some(Coverage::Bytes(n)) => Ok(RenderedPayload::new(vec![7u8; *n], "image/png")),
            Some(Coverage::Radar { co, cross }) => Ok(RenderedPayload::new(
                radar_bytes(request, &[*co, *cross, 1.0]),
                "application/octet-stream",
            )),
            Some(Coverage::SingleRadar { co }) => Ok(RenderedPayload::new(
                radar_bytes(request, &[*co, 1.0]),
                "application/octet-stream",
            )),
            Some(Coverage::Fails(status, message)) => Err(Error::UpstreamService {
                service: "process",
                status: *status,
                message: message.to_string(),
            }),
            // blank tile: under the size heuristic
            None => Ok(RenderedPayload::new(vec![0u8; 512], "image/png")),
        }
    }
}
