//! qrtally - edge analytics and promotion redemption for QR-coded venues
//!
//! Counts visitor interactions per location and local day, logs QR scans,
//! and issues/consumes one-time promotion tokens, all on top of an
//! eventually consistent key-value store.
//!
//! # Features
//! - **cli**: `seed` subcommand (CSV alias listings) and colored output (default)
//!
//! # Architecture
//! - `store`: key-value backends (memory / redis)
//! - `identity`: canonical location ids and slug aliases
//! - `analytics`: counters, ratings, scan log, redeem tokens, stats queries
//! - `campaigns`: external campaign metadata and active-campaign matching
//! - `services`: tracking, redemption, maintenance, QR rendering
//! - `api`: HTTP handlers and middleware
//! - `interfaces`: CLI subcommands
//! - `config` / `system` / `runtime`: configuration, logging, server

pub mod analytics;
pub mod api;
pub mod campaigns;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod store;
pub mod system;
pub mod utils;
