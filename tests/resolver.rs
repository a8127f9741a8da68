//! Fallback cascade behavior against in-memory services.

mod common;

use common::{Coverage, FakeCatalog, FakeImagery, d, madrid, santiago};
use sarscene::core::geometry::PixelDimensions;
use sarscene::{
    Error, FallbackTier, Polarization, RenderRequestBuilder, RenderVariant, ResolverConfig,
    SceneResolver,
};

fn dims() -> PixelDimensions {
    PixelDimensions {
        width: 256,
        height: 256,
    }
}

#[tokio::test]
async fn exact_date_needs_no_fallback() {
    let catalog = FakeCatalog::new(100);
    let imagery = FakeImagery::new().covers("2023-07-01", Coverage::Bytes(50_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, santiago(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();

    assert_eq!(res.used_date, d("2023-07-01"));
    assert_eq!(res.tier, FallbackTier::Exact);
    assert!(res.warnings.is_empty());
    assert!(!res.used_fallback());
    assert_eq!(catalog.calls(), 0);
    assert_eq!(imagery.rendered_dates(), vec![d("2023-07-01")]);
}

#[tokio::test]
async fn falls_back_to_curated_date_with_warning() {
    let catalog = FakeCatalog::new(100);
    let imagery = FakeImagery::new().covers("2023-01-15", Coverage::Bytes(50_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, santiago(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();

    assert_eq!(res.used_date, d("2023-01-15"));
    assert_eq!(res.tier, FallbackTier::Curated);
    assert_eq!(res.warnings.len(), 1);
    assert!(res.warnings[0].contains("2023-07-01"));
    assert!(res.warnings[0].contains("2023-01-15"));
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn neighborhood_tries_nearest_dates_first() {
    let catalog = FakeCatalog::new(100)
        .scene("S2A_a", "2023-06-28", Some(5.0))
        .scene("S2A_b", "2023-07-03", Some(5.0))
        .scene("S2A_c", "2023-06-29", Some(5.0))
        .scene("S2A_far", "2023-07-20", Some(5.0));
    let imagery = FakeImagery::new()
        .covers("2023-06-29", Coverage::Bytes(50_000))
        .covers("2023-07-03", Coverage::Bytes(50_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::Ndvi, madrid(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();

    // 06-29 and 07-03 are both two days away; the earlier one wins.
    assert_eq!(res.used_date, d("2023-06-29"));
    assert_eq!(res.tier, FallbackTier::Neighborhood);
    assert_eq!(imagery.rendered_dates(), vec![d("2023-07-01"), d("2023-06-29")]);
    assert!(res.warnings[0].contains("nearby date"));
}

#[tokio::test]
async fn relaxed_quality_tier_rerenders_with_wider_filter() {
    let catalog = FakeCatalog::new(100).scene("S2B_cloudy", "2023-07-02", Some(55.0));
    let imagery = FakeImagery::new().covers_if_relaxed("2023-07-02", 50.0, Coverage::Bytes(50_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, madrid(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();

    assert_eq!(res.used_date, d("2023-07-02"));
    assert_eq!(res.tier, FallbackTier::RelaxedQuality);
    assert!(res.warnings[0].contains("80%"));
    let last = imagery.requests().pop().unwrap();
    assert_eq!(last.input.data[0].data_filter.max_cloud_coverage, Some(80.0));
    // requested date is retried under the relaxed filter before the neighbor
    assert_eq!(
        imagery.rendered_dates(),
        vec![d("2023-07-01"), d("2023-07-01"), d("2023-07-02")]
    );
}

#[tokio::test]
async fn exhausted_cascade_reports_every_attempted_date() {
    let catalog = FakeCatalog::new(100)
        .scene("S2A_a", "2023-06-28", Some(10.0))
        .scene("S2A_b", "2023-07-03", Some(10.0))
        .scene("S2A_c", "2023-07-05", Some(60.0));
    let imagery = FakeImagery::new();
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, madrid(), dims());
    let err = resolver.resolve(&builder, d("2023-07-01")).await.unwrap_err();

    match err {
        Error::NoCoverageFound { attempted } => assert_eq!(
            attempted,
            vec![d("2023-07-01"), d("2023-07-03"), d("2023-06-28"), d("2023-07-05")]
        ),
        other => panic!("unexpected error: {other}"),
    }
    // exact + 2 neighbors + (exact, 2 neighbors, cloudy scene) relaxed
    assert_eq!(imagery.rendered_dates().len(), 7);
}

#[tokio::test]
async fn radar_skips_relaxed_tier_and_uses_scene_mode() {
    let catalog = FakeCatalog::new(100).scene("S1A_IW_GRDH_1SDH_20230703T101010", "2023-07-03", None);
    let imagery = FakeImagery::new();
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::RadarBackscatter, madrid(), dims());
    let err = resolver.resolve(&builder, d("2023-07-01")).await.unwrap_err();
    assert!(err.is_no_coverage());

    let requests = imagery.requests();
    assert_eq!(requests.len(), 2);
    assert!(
        requests
            .iter()
            .all(|r| r.input.data[0].data_filter.max_cloud_coverage.is_none())
    );
    // neighborhood render follows the candidate's HH acquisition
    assert_eq!(requests[1].input.data[0].data_filter.polarization.as_deref(), Some("DH"));
    assert!(requests[1].evalscript.contains("\"HH\""));
}

#[tokio::test]
async fn neighborhood_resolution_keeps_candidate_mode() {
    let catalog = FakeCatalog::new(100).scene("S1B_EW_GRDM_1SSH_x", "2023-07-02", None);
    let imagery = FakeImagery::new().covers("2023-07-02", Coverage::Bytes(10_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::RadarBackscatter, madrid(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();
    assert_eq!(res.builder.mode().primary_polarization, Polarization::Hh);
    assert!(!res.builder.mode().is_dual());
}

#[tokio::test]
async fn classification_skips_single_pol_candidates() {
    let catalog = FakeCatalog::new(100)
        .scene("S1A_IW_GRDH_1SSV_near", "2023-07-02", None)
        .scene("S1A_IW_GRDH_1SDV_far", "2023-07-04", None);
    let imagery = FakeImagery::new()
        .covers("2023-07-02", Coverage::Bytes(10_000))
        .covers("2023-07-04", Coverage::Bytes(10_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::RadarLandCover, madrid(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();
    assert_eq!(res.used_date, d("2023-07-04"));
    assert!(res.builder.mode().is_dual());
    // the single-pol scene is never rendered
    assert_eq!(imagery.rendered_dates(), vec![d("2023-07-01"), d("2023-07-04")]);
}

#[tokio::test]
async fn only_single_pol_candidates_means_no_coverage_for_classification() {
    let catalog = FakeCatalog::new(100).scene("S1A_IW_GRDH_1SSV_only", "2023-07-02", None);
    let imagery = FakeImagery::new().covers("2023-07-02", Coverage::Bytes(10_000));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::RadarStatistics, madrid(), dims())
        .require_dual_polarization()
        .unwrap();
    match resolver.resolve(&builder, d("2023-07-01")).await.unwrap_err() {
        Error::NoCoverageFound { attempted } => assert_eq!(attempted, vec![d("2023-07-01")]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn small_payloads_do_not_count_as_coverage() {
    let catalog = FakeCatalog::new(100);
    let imagery = FakeImagery::new()
        .covers("2023-07-01", Coverage::Bytes(2048))
        .covers("2023-01-15", Coverage::Bytes(2049));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::Highlight, santiago(), dims());
    let res = resolver.resolve(&builder, d("2023-07-01")).await.unwrap();
    assert_eq!(res.used_date, d("2023-01-15"));
    assert_eq!(res.attempts[0].payload_bytes, 2048);
}

#[tokio::test]
async fn upstream_errors_abort_the_cascade() {
    let catalog = FakeCatalog::new(100);
    let imagery = FakeImagery::new().covers("2023-07-01", Coverage::Fails(401, "invalid token"));
    let config = ResolverConfig::default();
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, santiago(), dims());
    let err = resolver.resolve(&builder, d("2023-07-01")).await.unwrap_err();
    match err {
        Error::UpstreamService { status, message, .. } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid token");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(imagery.rendered_dates().len(), 1);
}

#[tokio::test]
async fn catalog_cap_bounds_neighborhood_search() {
    let mut catalog = FakeCatalog::new(2);
    for day in 1..=9 {
        catalog = catalog.scene(&format!("s{day}"), &format!("2023-07-0{day}"), Some(1.0));
    }
    let imagery = FakeImagery::new();
    let config = ResolverConfig {
        max_catalog_items: 3,
        ..ResolverConfig::default()
    };
    let resolver = SceneResolver::new(&catalog, &imagery, &config);

    let builder = RenderRequestBuilder::new(RenderVariant::TrueColor, madrid(), dims())
        .max_cloud_coverage(20.0);
    let _ = resolver.resolve(&builder, d("2023-07-05")).await;
    // each search stops after its second page of 2; tiers 3 and 4 search once each
    assert_eq!(catalog.calls(), 4);
}
