//! Acquisition mode lookup from Sentinel-1 style scene identifiers,
//! e.g. `S1A_IW_GRDH_1SDV_20230701T101010_...`.
use serde::{Deserialize, Serialize};

use crate::types::{InstrumentMode, Polarization};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionMode {
    pub primary_polarization: Polarization,
    pub instrument_mode: InstrumentMode,
    pub band_count: u8,
}

impl AcquisitionMode {
    pub fn is_dual(&self) -> bool {
        self.band_count > 1
    }

    /// Channels carried by the acquisition, co-polarized first.
    pub fn polarizations(&self) -> Vec<Polarization> {
        if self.is_dual() {
            vec![self.primary_polarization, self.primary_polarization.cross()]
        } else {
            vec![self.primary_polarization]
        }
    }
}

/// Returned for identifiers that match nothing in the tables: dual VV+VH over
/// IW, the routine Sentinel-1 acquisition over land.
pub const DEFAULT_MODE: AcquisitionMode = AcquisitionMode {
    primary_polarization: Polarization::Vv,
    instrument_mode: InstrumentMode::Iw,
    band_count: 2,
};

// Product class codes: 1S + (S)ingle/(D)ual + transmit polarization.
const POLARIZATION_TABLE: &[(&str, Polarization, u8)] = &[
    ("1SDV", Polarization::Vv, 2),
    ("1SDH", Polarization::Hh, 2),
    ("1SSV", Polarization::Vv, 1),
    ("1SSH", Polarization::Hh, 1),
];

const MODE_TABLE: &[(&str, InstrumentMode)] = &[
    ("_IW_", InstrumentMode::Iw),
    ("_EW_", InstrumentMode::Ew),
    ("_WV_", InstrumentMode::Wv),
    ("_S1_", InstrumentMode::Sm),
    ("_S2_", InstrumentMode::Sm),
    ("_S3_", InstrumentMode::Sm),
    ("_S4_", InstrumentMode::Sm),
    ("_S5_", InstrumentMode::Sm),
    ("_S6_", InstrumentMode::Sm),
];

/// Look up polarization, instrument mode and band count for a scene id.
///
/// Each half of the lookup falls back to `DEFAULT_MODE` independently, so an
/// id with a known mode code but no product class keeps its mode.
pub fn classify(scene_id: &str) -> AcquisitionMode {
    let id = scene_id.to_ascii_uppercase();

    let (primary_polarization, band_count) = POLARIZATION_TABLE
        .iter()
        .find(|(code, _, _)| id.contains(code))
        .map(|(_, pol, bands)| (*pol, *bands))
        .unwrap_or((DEFAULT_MODE.primary_polarization, DEFAULT_MODE.band_count));

    let instrument_mode = MODE_TABLE
        .iter()
        .find(|(code, _)| id.contains(code))
        .map(|(_, mode)| *mode)
        .unwrap_or(DEFAULT_MODE.instrument_mode);

    AcquisitionMode {
        primary_polarization,
        instrument_mode,
        band_count,
    }
}

/// Build a mode from catalog metadata (`sar:polarizations`, `sar:instrument_mode`)
/// when the catalog reports it, falling back to the identifier lookup.
pub fn from_metadata(
    scene_id: &str,
    polarizations: &[String],
    instrument_mode: Option<&str>,
) -> AcquisitionMode {
    let mut mode = classify(scene_id);

    let pols: Vec<Polarization> = polarizations
        .iter()
        .filter_map(|p| match p.to_ascii_uppercase().as_str() {
            "VV" => Some(Polarization::Vv),
            "VH" => Some(Polarization::Vh),
            "HH" => Some(Polarization::Hh),
            "HV" => Some(Polarization::Hv),
            _ => None,
        })
        .collect();
    if let Some(first) = pols.first() {
        mode.primary_polarization = *first;
        mode.band_count = pols.len().min(u8::MAX as usize) as u8;
    }

    if let Some(m) = instrument_mode {
        mode.instrument_mode = match m.to_ascii_uppercase().as_str() {
            "IW" => InstrumentMode::Iw,
            "EW" => InstrumentMode::Ew,
            "WV" => InstrumentMode::Wv,
            "SM" => InstrumentMode::Sm,
            _ => mode.instrument_mode,
        };
    }

    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_vv_iw() {
        let m = classify("S1A_IW_GRDH_1SDV_20230701T101010_20230701T101035_049211_05EAF1_1A2B");
        assert_eq!(m.primary_polarization, Polarization::Vv);
        assert_eq!(m.instrument_mode, InstrumentMode::Iw);
        assert_eq!(m.band_count, 2);
        assert_eq!(m.polarizations(), vec![Polarization::Vv, Polarization::Vh]);
    }

    #[test]
    fn single_hh_ew() {
        let m = classify("S1B_EW_GRDM_1SSH_20210101T000000");
        assert_eq!(m.primary_polarization, Polarization::Hh);
        assert_eq!(m.instrument_mode, InstrumentMode::Ew);
        assert_eq!(m.band_count, 1);
        assert!(!m.is_dual());
    }

    #[test]
    fn stripmap_and_dual_hh() {
        let m = classify("s1a_s3_grdh_1sdh_20200101");
        assert_eq!(m.instrument_mode, InstrumentMode::Sm);
        assert_eq!(m.primary_polarization, Polarization::Hh);
        assert_eq!(m.polarizations(), vec![Polarization::Hh, Polarization::Hv]);
    }

    #[test]
    fn unknown_id_uses_default() {
        assert_eq!(classify("not-a-scene"), DEFAULT_MODE);
        assert_eq!(classify(""), DEFAULT_MODE);
    }

    #[test]
    fn metadata_overrides_identifier() {
        let m = from_metadata("unknown", &["VV".into()], Some("EW"));
        assert_eq!(m.primary_polarization, Polarization::Vv);
        assert_eq!(m.band_count, 1);
        assert_eq!(m.instrument_mode, InstrumentMode::Ew);

        let m = from_metadata("S1A_IW_GRDH_1SDV_x", &[], None);
        assert_eq!(m, classify("S1A_IW_GRDH_1SDV_x"));
    }
}
