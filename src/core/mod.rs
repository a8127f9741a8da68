//! Core building blocks: geometry sizing, acquisition-mode lookup, the
//! classification rule tables and the scripts generated from them, render
//! request construction, raster statistics and the fallback resolver.
//! These are the primitives consumed by the high-level `api` module.
pub mod classification;
pub mod geometry;
pub mod mode;
pub mod params;
pub mod render;
pub mod resolver;
pub mod script;
pub mod stats;
