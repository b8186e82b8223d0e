//! pagedecay - Content decay detection for organic search pages
//!
//! Compares each page's earlier and recent search performance, flags pages
//! whose clicks, impressions or ranking declined, and ranks them by severity.
//! A SQLite store supplies page history and keeps per-page decay flags.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod report;
pub mod storage;

pub use analyzer::{analyze, DecayResult, DecayThresholds, PageSeries};
pub use error::{DecayError, Result};
