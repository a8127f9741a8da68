//! I/O layer for the remote collaborators.
//! Provides the `catalog` and `imagery` service seams, the authenticated
//! `client` implementing both, `token` providers, and `raster` decoding of
//! rendered payloads.
pub mod catalog;
pub use catalog::{CatalogPage, CatalogQuery, CatalogService, SceneCandidate, SceneDescriptor};

pub mod imagery;
pub use imagery::{ImageryService, RenderedPayload};

pub mod client;
pub use client::HubClient;

pub mod token;
pub use token::{OAuthTokenProvider, StaticToken, TokenProvider};

pub mod raster;
pub use raster::{decode_payload, decode_tiff};
