//! greenroute-core: shared vocabulary for the region recommender.
//!
//! Validated coordinates, regions, capability tokens and carbon intensity
//! samples, the haversine distance, and the `greenroute.toml` schema.

pub mod config;
pub mod error;
pub mod geo;
pub mod types;

pub use config::GreenrouteConfig;
pub use error::{ConfigError, CoreError, CoreResult};
pub use geo::distance_km;
pub use types::*;
