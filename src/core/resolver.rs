//! Tiered date resolution against the catalog and imagery services.
//!
//! Tiers run strictly in order and stop at the first render whose payload
//! exceeds the minimum-size heuristic:
//!
//! 1. the exact requested date;
//! 2. curated dates known to render cleanly over the region;
//! 3. catalog dates within ±N days of the request, nearest first (ties go to
//!    the earlier date);
//! 4. the request date and its neighborhood again under a relaxed quality
//!    filter. Skipped for collections without a quality filter.
//!
//! Empty renders move the cascade on; any other error aborts it.
use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::params::ResolverConfig;
use crate::core::render::RenderRequestBuilder;
use crate::error::{Error, Result};
use crate::io::catalog::{CatalogQuery, CatalogService, SceneCandidate, find_candidates};
use crate::io::imagery::{ImageryService, RenderedPayload};
use crate::types::FallbackTier;

/// One render attempt made while resolving.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub date: NaiveDate,
    pub tier: FallbackTier,
    pub max_cloud_coverage: Option<f64>,
    pub payload_bytes: usize,
}

/// A successfully resolved scene.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub requested_date: NaiveDate,
    pub used_date: NaiveDate,
    pub tier: FallbackTier,
    pub payload: RenderedPayload,
    /// The builder that produced the accepted render.
    pub builder: RenderRequestBuilder,
    pub attempts: Vec<Attempt>,
    pub warnings: Vec<String>,
}

impl Resolution {
    pub fn used_fallback(&self) -> bool {
        self.tier != FallbackTier::Exact
    }
}

/// Dates within `days` of `center` (excluding it), nearest first, earlier
/// date first on ties.
pub fn neighborhood_order(center: NaiveDate, dates: &[NaiveDate], days: i64) -> Vec<NaiveDate> {
    let mut near: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .filter(|d| *d != center && (*d - center).num_days().abs() <= days)
        .collect();
    near.sort_by_key(|d| ((*d - center).num_days().abs(), *d));
    near.dedup();
    near
}

fn fallback_warning(requested: NaiveDate, used: NaiveDate, tier: FallbackTier, cc: Option<f64>) -> String {
    match (tier, cc) {
        (FallbackTier::RelaxedQuality, Some(cc)) => format!(
            "no coverage on {requested}; using {used} with cloud coverage relaxed to {cc}%"
        ),
        _ => format!("no coverage on {requested}; using {tier} {used}"),
    }
}

pub struct SceneResolver<'a, C, I> {
    catalog: &'a C,
    imagery: &'a I,
    config: &'a ResolverConfig,
}

/// Per-resolution bookkeeping.
struct Cascade {
    requested: NaiveDate,
    tried: HashSet<(NaiveDate, Option<u64>)>,
    attempts: Vec<Attempt>,
}

impl Cascade {
    fn attempted_dates(&self) -> Vec<NaiveDate> {
        let mut seen = HashSet::new();
        self.attempts
            .iter()
            .map(|a| a.date)
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

impl<'a, C: CatalogService, I: ImageryService> SceneResolver<'a, C, I> {
    pub fn new(catalog: &'a C, imagery: &'a I, config: &'a ResolverConfig) -> Self {
        Self {
            catalog,
            imagery,
            config,
        }
    }

    /// Resolve `requested` into a rendered scene, falling back tier by tier.
    pub async fn resolve(
        &self,
        builder: &RenderRequestBuilder,
        requested: NaiveDate,
    ) -> Result<Resolution> {
        let mut cascade = Cascade {
            requested,
            tried: HashSet::new(),
            attempts: Vec::new(),
        };

        // 1. exact date
        if let Some(res) = self
            .try_dates(&mut cascade, builder, &[requested], FallbackTier::Exact, &[])
            .await?
        {
            return Ok(res);
        }

        // 2. curated regional dates
        let curated = self.config.curated_dates_for(builder.bbox());
        if curated.is_empty() {
            debug!("No curated dates cover {}", builder.bbox());
        } else if let Some(res) = self
            .try_dates(&mut cascade, builder, &curated, FallbackTier::Curated, &[])
            .await?
        {
            return Ok(res);
        }

        // 3. catalog neighborhood
        let candidates = self.neighborhood_candidates(builder, requested).await?;
        let dates: Vec<NaiveDate> = candidates.iter().map(|c| c.acquisition_date).collect();
        let near = neighborhood_order(requested, &dates, self.config.neighborhood_days);
        if let Some(res) = self
            .try_dates(&mut cascade, builder, &near, FallbackTier::Neighborhood, &candidates)
            .await?
        {
            return Ok(res);
        }

        // 4. relaxed quality filter
        if builder.descriptor().max_cloud_coverage.is_none() {
            debug!(
                "Skipping {} tier: {} has no quality filter",
                FallbackTier::RelaxedQuality,
                builder.descriptor().collection
            );
        } else {
            let relaxed = builder
                .clone()
                .max_cloud_coverage(self.config.relaxed_max_cloud_coverage);
            let candidates = self.neighborhood_candidates(&relaxed, requested).await?;
            let dates: Vec<NaiveDate> = candidates.iter().map(|c| c.acquisition_date).collect();
            let mut ordered = vec![requested];
            ordered.extend(neighborhood_order(requested, &dates, self.config.neighborhood_days));
            if let Some(res) = self
                .try_dates(&mut cascade, &relaxed, &ordered, FallbackTier::RelaxedQuality, &candidates)
                .await?
            {
                return Ok(res);
            }
        }

        let attempted = cascade.attempted_dates();
        warn!(
            "No coverage for {} after {} attempt(s)",
            requested,
            cascade.attempts.len()
        );
        Err(Error::NoCoverageFound { attempted })
    }

    async fn neighborhood_candidates(
        &self,
        builder: &RenderRequestBuilder,
        center: NaiveDate,
    ) -> Result<Vec<SceneCandidate>> {
        let window = Duration::days(self.config.neighborhood_days);
        let query = CatalogQuery::new(
            *builder.bbox(),
            center - window,
            center + window,
            builder.descriptor().collection,
        )
        .max_cloud_coverage(builder.current_max_cloud_coverage())
        .limit(self.config.catalog_page_size);
        find_candidates(self.catalog, &query, self.config.max_catalog_items).await
    }

    /// Render each untried date in order; `Some` on the first accepted payload.
    async fn try_dates(
        &self,
        cascade: &mut Cascade,
        builder: &RenderRequestBuilder,
        dates: &[NaiveDate],
        tier: FallbackTier,
        candidates: &[SceneCandidate],
    ) -> Result<Option<Resolution>> {
        let cc = builder.current_max_cloud_coverage();
        // f64 is not hashable; the filter is keyed on its bit pattern.
        let key = cc.map(f64::to_bits);

        for &date in dates {
            if !cascade.tried.insert((date, key)) {
                debug!("{} already attempted under the same filter", date);
                continue;
            }

            let mut attempt_builder = builder.clone().date(date);
            if let Some(c) = candidates.iter().find(|c| c.acquisition_date == date) {
                attempt_builder = match attempt_builder.acquisition_mode(c.polarization_mode) {
                    Ok(b) => b,
                    Err(e @ Error::DualPolarizationRequired { .. }) => {
                        debug!("Skipping {} ({}): {}", date, c.id, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
            }

            info!("Trying {} ({})", date, tier);
            let payload = match self.imagery.render(&attempt_builder.build()).await {
                Ok(p) => p,
                Err(Error::EmptyResult { .. }) => RenderedPayload::new(Vec::new(), ""),
                Err(e) => return Err(e),
            };
            cascade.attempts.push(Attempt {
                date,
                tier,
                max_cloud_coverage: cc,
                payload_bytes: payload.len(),
            });

            if payload.len() <= self.config.min_payload_bytes {
                debug!(
                    "{} rendered {} bytes (needs > {})",
                    date,
                    payload.len(),
                    self.config.min_payload_bytes
                );
                continue;
            }

            let requested = cascade.requested;
            let warnings = if tier == FallbackTier::Exact {
                Vec::new()
            } else {
                vec![fallback_warning(requested, date, tier, cc)]
            };
            info!("Resolved {} to {} via {}", requested, date, tier);
            return Ok(Some(Resolution {
                requested_date: requested,
                used_date: date,
                tier,
                payload,
                builder: attempt_builder,
                attempts: std::mem::take(&mut cascade.attempts),
                warnings,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn neighborhood_is_nearest_first_with_earlier_ties() {
        let dates = [
            d("2023-07-04"),
            d("2023-06-28"),
            d("2023-07-01"),
            d("2023-06-20"),
            d("2023-07-03"),
            d("2023-06-29"),
        ];
        let order = neighborhood_order(d("2023-07-01"), &dates, 7);
        assert_eq!(
            order,
            vec![d("2023-06-29"), d("2023-07-03"), d("2023-06-28"), d("2023-07-04")]
        );
    }

    #[test]
    fn warnings_name_requested_and_used_dates() {
        let w = fallback_warning(d("2023-07-01"), d("2023-01-15"), FallbackTier::Curated, None);
        assert_eq!(w, "no coverage on 2023-07-01; using curated date 2023-01-15");
        let w = fallback_warning(
            d("2023-07-01"),
            d("2023-07-02"),
            FallbackTier::RelaxedQuality,
            Some(80.0),
        );
        assert!(w.contains("2023-07-01") && w.contains("80%"));
    }
}
