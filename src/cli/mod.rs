//! Command Line Interface (CLI) layer for sarscene.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the offline sizing and lookup
//! commands and the networked render, statistics and classification flows.
//! It wires user-provided options to the library functionality exposed via
//! `sarscene::api`.
//!
//! If you are embedding sarscene into another application, prefer using
//! the high-level `sarscene::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
