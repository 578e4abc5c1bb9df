//! # WasteWatch Common Library
//!
//! Shared code for WasteWatch services including:
//! - Database initialization and row models
//! - Configuration loading (TOML + environment + root folder resolution)
//! - Geodesy helpers (haversine distance, bounding boxes, grid cells)
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod geo;

pub use error::{Error, Result};
pub use geo::GeoPoint;
