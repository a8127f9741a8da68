#![doc = r#"
sarscene: adaptive scene queries and SAR land-cover classification.

Given an area (polygon or bbox) and a target date, this crate sizes a render request for a
remote imagery-processing service, resolves a date that actually has coverage through a
tiered fallback search against a scene catalog, and, for radar data, turns the returned
raster into land-cover classes or backscatter statistics. It powers the `sarscene` CLI and
can be embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve as the crate
stabilizes. Breaking changes can occur.

Quick start: size a request (no network)
----------------------------------------
```rust
use sarscene::api::{plan, SceneRequest};
use sarscene::core::geometry::BoundingBox;
use sarscene::{RenderVariant, ResolverConfig};

fn main() -> sarscene::Result<()> {
    let bbox = BoundingBox::new(-70.6, -33.5, -70.5, -33.4)?;
    let date = chrono::NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
    let request = SceneRequest::for_bbox(bbox, date, RenderVariant::TrueColor);

    let plan = plan(&request, &ResolverConfig::default())?;
    println!("{}x{} px over {:.0} m²", plan.dimensions.width, plan.dimensions.height, plan.estimate.area_m2);
    Ok(())
}
```

Resolve and measure a scene
---------------------------
```rust,no_run
use std::sync::Arc;
use sarscene::api::{SceneRequest, SceneResponse, SceneService};
use sarscene::core::geometry::BoundingBox;
use sarscene::io::{HubClient, OAuthTokenProvider};
use sarscene::{Config, RenderVariant};

#[tokio::main]
async fn main() -> sarscene::Result<()> {
    let config = Config::default();
    let service_config = config.service.clone().with_env_credentials()?; // CLIENT_ID / CLIENT_SECRET
    let client = Arc::new(HubClient::new(&service_config, OAuthTokenProvider::new(&service_config)?)?);
    let service = SceneService::new(client.clone(), client, config.resolver);

    let bbox = BoundingBox::new(-70.6, -33.5, -70.5, -33.4)?;
    let date = chrono::NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
    let mut request = SceneRequest::for_bbox(bbox, date, RenderVariant::RadarStatistics);
    request.compare_date = chrono::NaiveDate::from_ymd_opt(2023, 1, 15);

    let comparison = service.compare(&request).await?;
    if let SceneResponse::Covered(scene) = &comparison.primary {
        println!("{} -> mean VV {:?} dB", scene.resolved_date, scene.payload.statistics.co_polarized.mean);
        for warning in &scene.warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}
```

Fallback cascade
----------------
Dates are tried in a fixed order and the first render larger than
`ResolverConfig::min_payload_bytes` wins: the exact date, curated regional dates, catalog
dates within `neighborhood_days` (nearest first), then a relaxed cloud-coverage filter for
optical collections. When every tier fails, the API returns a `hasCoverage: false` response
with suggested dates instead of an error.

Error handling
--------------
All public functions return `sarscene::Result<T>`; match on `sarscene::Error` to handle
specific cases.

```rust,no_run
use sarscene::Error;

fn report(result: sarscene::Result<()>) {
    match result {
        Ok(()) => {}
        Err(Error::NoCoverageFound { attempted }) => eprintln!("no coverage; tried {attempted:?}"),
        Err(Error::UpstreamService { service, status, message }) => {
            eprintln!("{service} failed with {status}: {message}")
        }
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points (`plan`, `SceneService`).
- [`core`]: geometry sizing, acquisition modes, rule tables, scripts, statistics, resolver.
- [`io`]: catalog/imagery service traits, HTTP client, token providers, raster decoding.
- [`types`]: enums shared across the crate (e.g. `Polarization`, `RenderVariant`, `Season`).
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::{Config, CuratedRegion, ResolverConfig, ServiceConfig};
pub use error::{Error, Result};
pub use types::{
    AggregationStrategy, FallbackTier, Hemisphere, InstrumentMode, OutputFormat, Polarization,
    RenderVariant, SampleType, Season,
};

// Building blocks
pub use core::classification::{ClassificationThresholds, CoverClass, RuleTable};
pub use core::geometry::{AreaEstimate, BoundingBox, PixelDimensions, Polygon};
pub use core::mode::AcquisitionMode;
pub use core::render::{RenderRequest, RenderRequestBuilder};
pub use core::resolver::{Resolution, SceneResolver};
pub use core::stats::{BandLayout, BandStatistics, RadarStatistics, RasterBuffer};

// High-level API re-exports
pub use api::{
    Comparison, NoCoverage, Scene, ScenePlan, SceneRequest, SceneResponse, SceneService, plan,
};
