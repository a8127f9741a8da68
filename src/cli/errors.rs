use std::path::PathBuf;

use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Bounding box needs 4 values, got {count}")]
    BadBbox { count: usize },

    #[error("Polygon file {path:?} holds neither a ring nor a GeoJSON Polygon")]
    BadPolygonFile { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Scene(#[from] sarscene::Error),
}
