//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Distinguishes caller mistakes (geometry, arguments), expected domain outcomes
//! (no coverage) and failures of the remote collaborators.
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{Polarization, RenderVariant};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("No coverage found; attempted dates: {}", format_dates(.attempted))]
    NoCoverageFound { attempted: Vec<NaiveDate> },

    #[error("{service} service returned {status}: {message}")]
    UpstreamService {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Malformed raster: {0}")]
    MalformedRaster(String),

    #[error("{variant} needs a dual-polarization acquisition, scene carries only {polarization}")]
    DualPolarizationRequired {
        variant: RenderVariant,
        polarization: Polarization,
    },

    #[error("Empty result from {service} service")]
    EmptyResult { service: &'static str },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn geometry<E: std::fmt::Display>(e: E) -> Self {
        Error::InvalidGeometry(e.to_string())
    }

    /// Whether this error is the expected "nothing to show" outcome rather than a fault.
    pub fn is_no_coverage(&self) -> bool {
        matches!(self, Error::NoCoverageFound { .. })
    }
}

fn format_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return "none".to_string();
    }
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
