//! Dual-polarization land-cover classification as an ordered rule table.
//!
//! Rules are evaluated top-down and the first match wins; the table's default
//! class applies when nothing matches. The same table drives the local
//! `classify_raster` path and the remote per-pixel script (see `core::script`),
//! so both assign identical classes.
use std::collections::BTreeMap;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::core::stats::{BandLayout, RasterBuffer, is_valid_pixel, to_decibel};
use crate::error::{Error, Result};
use crate::types::Season;

/// Encoded output value per class step, so class codes map straight to gray levels.
pub const CLASS_SCALE: u8 = 50;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverClass {
    NoData,
    Water,
    DenseVegetation,
    Forest,
    LowVegetation,
    BareSoilUrban,
    /// Anything that is not water, for the binary water mask.
    NotWater,
}

impl CoverClass {
    pub fn code(&self) -> u8 {
        match self {
            CoverClass::NoData => 0,
            CoverClass::Water => 1,
            CoverClass::DenseVegetation => 2,
            CoverClass::Forest => 3,
            CoverClass::LowVegetation => 4,
            CoverClass::BareSoilUrban | CoverClass::NotWater => 5,
        }
    }

    /// Byte value written to classified rasters (code × 50).
    pub fn encoded(&self) -> u8 {
        self.code() * CLASS_SCALE
    }

    /// Ordering by vegetation volume, used to reason about the cascade:
    /// water < bare soil/urban < low vegetation < forest < dense vegetation.
    pub fn density_rank(&self) -> u8 {
        match self {
            CoverClass::NoData => 0,
            CoverClass::Water => 1,
            CoverClass::BareSoilUrban | CoverClass::NotWater => 2,
            CoverClass::LowVegetation => 3,
            CoverClass::Forest => 4,
            CoverClass::DenseVegetation => 5,
        }
    }
}

impl std::fmt::Display for CoverClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoverClass::NoData => "no data",
            CoverClass::Water => "water",
            CoverClass::DenseVegetation => "dense vegetation",
            CoverClass::Forest => "forest",
            CoverClass::LowVegetation => "low vegetation",
            CoverClass::BareSoilUrban => "bare soil / urban",
            CoverClass::NotWater => "not water",
        };
        write!(f, "{}", s)
    }
}

/// Threshold predicate over (VV dB, VH dB). Comparisons are strict.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    VhBelow(f64),
    VhAbove(f64),
    /// VV − VH below the cutoff (co/cross-pol ratio in dB).
    RatioBelow(f64),
}

impl Condition {
    #[inline]
    pub fn holds(&self, vv_db: f64, vh_db: f64) -> bool {
        match *self {
            Condition::VhBelow(t) => vh_db < t,
            Condition::VhAbove(t) => vh_db > t,
            Condition::RatioBelow(t) => vv_db - vh_db < t,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub conditions: Vec<Condition>,
    pub class: CoverClass,
}

impl Rule {
    pub fn new(conditions: Vec<Condition>, class: CoverClass) -> Self {
        Self { conditions, class }
    }

    #[inline]
    pub fn matches(&self, vv_db: f64, vh_db: f64) -> bool {
        self.conditions.iter().all(|c| c.holds(vv_db, vh_db))
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<Rule>,
    pub default: CoverClass,
}

impl RuleTable {
    /// First matching rule wins; order is part of the table's meaning.
    pub fn classify_db(&self, vv_db: f64, vh_db: f64) -> CoverClass {
        self.rules
            .iter()
            .find(|r| r.matches(vv_db, vh_db))
            .map(|r| r.class)
            .unwrap_or(self.default)
    }

    /// Classify linear-power samples. Masked or non-positive pixels are no-data
    /// regardless of the rules.
    pub fn classify_linear(&self, vv: f64, vh: f64, mask: f64) -> CoverClass {
        if !is_valid_pixel(vv, mask) || !is_valid_pixel(vh, mask) {
            return CoverClass::NoData;
        }
        self.classify_db(to_decibel(vv, 0.0), to_decibel(vh, 0.0))
    }

    /// Every cutoff applied to VH, ascending.
    pub fn vh_cutoffs(&self) -> Vec<f64> {
        let mut cutoffs: Vec<f64> = self
            .rules
            .iter()
            .flat_map(|r| r.conditions.iter())
            .filter_map(|c| match c {
                Condition::VhBelow(t) | Condition::VhAbove(t) => Some(*t),
                Condition::RatioBelow(_) => None,
            })
            .collect();
        cutoffs.sort_by(|a, b| a.total_cmp(b));
        cutoffs.dedup();
        cutoffs
    }
}

/// Backscatter cutoffs (dB) for one seasonal profile.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub water_vh: f64,
    pub dense_vh: f64,
    pub dense_ratio: f64,
    pub forest_vh: f64,
    pub low_vegetation_vh: f64,
}

/// Annual profile, used when no season applies.
pub const BASELINE_THRESHOLDS: ClassificationThresholds = ClassificationThresholds {
    water_vh: -24.0,
    dense_vh: -13.0,
    dense_ratio: 6.5,
    forest_vh: -15.0,
    low_vegetation_vh: -19.0,
};

/// Seasonal threshold profile. Dry summers lower vegetation returns; wet
/// winters brighten soil and roughen open water.
pub fn thresholds_for(season: Option<Season>) -> ClassificationThresholds {
    match season {
        None | Some(Season::Autumn) => BASELINE_THRESHOLDS,
        Some(Season::Summer) => ClassificationThresholds {
            water_vh: -23.0,
            dense_vh: -13.5,
            dense_ratio: 7.0,
            forest_vh: -15.5,
            low_vegetation_vh: -20.0,
        },
        Some(Season::Winter) => ClassificationThresholds {
            water_vh: -25.0,
            dense_vh: -12.5,
            dense_ratio: 6.0,
            forest_vh: -14.5,
            low_vegetation_vh: -18.0,
        },
        Some(Season::Spring) => ClassificationThresholds {
            water_vh: -24.0,
            dense_vh: -12.5,
            dense_ratio: 6.5,
            forest_vh: -15.0,
            low_vegetation_vh: -19.5,
        },
    }
}

/// Five-class cascade: water, dense vegetation, forest, low vegetation,
/// then bare soil / urban as the default.
pub fn land_cover_rules(t: &ClassificationThresholds) -> RuleTable {
    RuleTable {
        rules: vec![
            Rule::new(vec![Condition::VhBelow(t.water_vh)], CoverClass::Water),
            Rule::new(
                vec![
                    Condition::VhAbove(t.dense_vh),
                    Condition::RatioBelow(t.dense_ratio),
                ],
                CoverClass::DenseVegetation,
            ),
            Rule::new(vec![Condition::VhAbove(t.forest_vh)], CoverClass::Forest),
            Rule::new(
                vec![Condition::VhAbove(t.low_vegetation_vh)],
                CoverClass::LowVegetation,
            ),
        ],
        default: CoverClass::BareSoilUrban,
    }
}

pub fn water_mask_rules(t: &ClassificationThresholds) -> RuleTable {
    RuleTable {
        rules: vec![Rule::new(
            vec![Condition::VhBelow(t.water_vh)],
            CoverClass::Water,
        )],
        default: CoverClass::NotWater,
    }
}

/// Classify a decoded statistics raster into encoded class bytes.
///
/// The layout must name a cross-polarized band; single-polarization rasters
/// cannot be classified.
pub fn classify_raster(
    raster: &RasterBuffer,
    layout: &BandLayout,
    table: &RuleTable,
) -> Result<Array2<u8>> {
    layout.check(raster)?;
    let cross_band = layout.cross.ok_or_else(|| {
        Error::MalformedRaster("classification needs a cross-polarized band".into())
    })?;
    let co = raster.band(layout.co)?;
    let cross = raster.band(cross_band)?;
    let mask = match layout.mask {
        Some(band) => raster.band(band)?,
        None => Array2::from_elem(co.dim(), 1.0_f32),
    };

    let mut out = Array2::<u8>::zeros(co.dim());
    Zip::from(&mut out)
        .and(&co)
        .and(&cross)
        .and(&mask)
        .for_each(|o, &vv, &vh, &m| {
            *o = table
                .classify_linear(vv as f64, vh as f64, m as f64)
                .encoded();
        });
    Ok(out)
}

/// Pixel count per class code in an encoded classified raster.
pub fn class_histogram(classified: &Array2<u8>) -> BTreeMap<u8, usize> {
    let mut hist = BTreeMap::new();
    for &v in classified.iter() {
        *hist.entry(v / CLASS_SCALE).or_insert(0) += 1;
    }
    hist
}
