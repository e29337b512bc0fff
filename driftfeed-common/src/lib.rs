//! # Driftfeed Common Library
//!
//! Shared code for the driftfeed services including:
//! - Database schema and initialization
//! - Shared models (candidates, view history, interest events)
//! - Pagination cursor codec
//! - Tunable parameters
//! - Error types and timestamp utilities

pub mod cursor;
pub mod db;
pub mod error;
pub mod models;
pub mod params;
pub mod time;

pub use error::{Error, Result};
pub use models::{InterestTrigger, ViewType};
