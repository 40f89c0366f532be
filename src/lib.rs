//! Shotvault - vendor plate ingestion into a studio project layout
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod ingest;
pub mod metadata;
