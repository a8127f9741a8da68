use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::geometry::BoundingBox;
use crate::error::{Error, Result};
use crate::types::AggregationStrategy;

/// Dates known to render cleanly over a region, tried before widening the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedRegion {
    pub name: String,
    pub bbox: BoundingBox,
    pub dates: Vec<NaiveDate>,
}

impl CuratedRegion {
    pub fn covers(&self, bbox: &BoundingBox) -> bool {
        let (lon, lat) = bbox.center();
        self.bbox.contains_point(lon, lat)
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Built-in curated table: central Chile, where the service is operated.
pub fn default_curated_regions() -> Vec<CuratedRegion> {
    vec![CuratedRegion {
        name: "Santiago metropolitan".to_string(),
        bbox: BoundingBox {
            min_lon: -71.8,
            min_lat: -34.3,
            max_lon: -69.8,
            max_lat: -32.9,
        },
        dates: vec![ymd(2023, 1, 15), ymd(2023, 3, 2), ymd(2022, 12, 8), ymd(2022, 11, 18)],
    }]
}

/// Fallback cascade and aggregation settings, suitable for config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Hard cap on scene descriptors aggregated across catalog pages.
    pub max_catalog_items: usize,
    /// Scene descriptors requested per catalog page.
    pub catalog_page_size: u32,
    /// Half-width, in days, of the neighborhood tier.
    pub neighborhood_days: i64,
    /// Payloads at or below this size are treated as empty renders.
    pub min_payload_bytes: usize,
    /// Cloud coverage ceiling (percent) for the relaxed quality tier.
    pub relaxed_max_cloud_coverage: f64,
    pub curated_regions: Vec<CuratedRegion>,
    /// Half-width, in days, of the search for dates to suggest on no coverage.
    pub suggestion_window_days: i64,
    pub suggestion_limit: usize,
    /// Ground resolution (meters per pixel) used for sizing when none is given.
    pub default_resolution_m: f64,
    pub aggregation: AggregationStrategy,
    pub db_epsilon: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_catalog_items: 500,
            catalog_page_size: 100,
            neighborhood_days: 7,
            min_payload_bytes: 2048,
            relaxed_max_cloud_coverage: 80.0,
            curated_regions: default_curated_regions(),
            suggestion_window_days: 45,
            suggestion_limit: 5,
            default_resolution_m: 10.0,
            aggregation: AggregationStrategy::MeanOfDecibels,
            db_epsilon: crate::core::stats::DEFAULT_EPSILON,
        }
    }
}

impl ResolverConfig {
    pub fn curated_dates_for(&self, bbox: &BoundingBox) -> Vec<NaiveDate> {
        self.curated_regions
            .iter()
            .filter(|r| r.covers(bbox))
            .flat_map(|r| r.dates.iter().copied())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_catalog_items == 0 {
            return Err(Error::Config("max_catalog_items must be > 0".into()));
        }
        if self.catalog_page_size == 0 {
            return Err(Error::Config("catalog_page_size must be > 0".into()));
        }
        if self.neighborhood_days < 0 || self.suggestion_window_days < 0 {
            return Err(Error::Config("day windows must be non-negative".into()));
        }
        if !(self.default_resolution_m > 0.0) {
            return Err(Error::Config("default_resolution_m must be > 0".into()));
        }
        if !(self.db_epsilon > 0.0) {
            return Err(Error::Config("db_epsilon must be > 0".into()));
        }
        Ok(())
    }
}

/// Endpoints, credentials and deadlines for the remote services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub token_url: String,
    pub process_url: String,
    pub catalog_url: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Per-call deadline for every outbound request.
    pub request_timeout_secs: u64,
    /// Tokens are refreshed this long before they expire.
    pub token_refresh_margin_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_url: "https://services.sentinel-hub.com/oauth/token".to_string(),
            process_url: "https://services.sentinel-hub.com/api/v1/process".to_string(),
            catalog_url: "https://services.sentinel-hub.com/api/v1/catalog/1.0.0/search"
                .to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_secs: 60,
            token_refresh_margin_secs: 60,
        }
    }
}

impl ServiceConfig {
    /// Fill credentials from `CLIENT_ID` / `CLIENT_SECRET` when not already set.
    pub fn with_env_credentials(mut self) -> Result<Self> {
        if self.client_id.is_empty() {
            self.client_id = std::env::var("CLIENT_ID")
                .map_err(|_| Error::Config("CLIENT_ID not set".into()))?;
        }
        if self.client_secret.is_empty() {
            self.client_secret = std::env::var("CLIENT_SECRET")
                .map_err(|_| Error::Config("CLIENT_SECRET not set".into()))?;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }
}

/// Top-level config file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.resolver.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = ResolverConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.max_catalog_items, 500);
    }

    #[test]
    fn curated_dates_follow_region() {
        let cfg = ResolverConfig::default();
        let santiago = BoundingBox::new(-70.6, -33.5, -70.5, -33.4).unwrap();
        assert!(cfg.curated_dates_for(&santiago).contains(&ymd(2023, 1, 15)));
        let madrid = BoundingBox::new(-3.75, 40.38, -3.65, 40.45).unwrap();
        assert!(cfg.curated_dates_for(&madrid).is_empty());
    }

    #[test]
    fn load_partial_config_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"resolver": {{"max_catalog_items": 50, "neighborhood_days": 3}},
                "service": {{"client_id": "abc", "request_timeout_secs": 5}}}}"#
        )
        .unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.resolver.max_catalog_items, 50);
        assert_eq!(cfg.resolver.neighborhood_days, 3);
        assert_eq!(cfg.resolver.min_payload_bytes, 2048);
        assert_eq!(cfg.service.client_id, "abc");
        assert_eq!(cfg.service.request_timeout(), Duration::from_secs(5));
        assert!(cfg.service.process_url.ends_with("/process"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"resolver": {{"max_catalog_items": 0}}}}"#).unwrap();
        assert!(matches!(Config::load(f.path()), Err(Error::Config(_))));
    }

    #[test]
    fn secret_is_never_serialized() {
        let cfg = ServiceConfig {
            client_secret: "hunter2".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
