//! greenroute-oracle: external collaborators of the recommendation engine.
//!
//! Defines the three seams the engine depends on and ships adapters for
//! them:
//!
//! - **`catalog`**: `RegionCatalog` (memoized, validated snapshot),
//!   `BuiltinCatalog`, `FileCatalog`
//! - **`capability`**: `CapabilityTable`, a table-driven availability oracle
//! - **`intensity`**: `StaticIntensityTable`, `CachedIntensityOracle`
//! - **`electricitymaps`**: HTTP intensity oracle
//!
//! # Architecture
//!
//! ```text
//! RegionCatalog ──► dyn CatalogSource      (once per handle)
//! engine ─────────► dyn AvailabilityOracle (per region × capability)
//! engine ─────────► dyn IntensityOracle    (per region)
//!                     └── CachedIntensityOracle ──► ElectricityMapsOracle
//! ```

pub mod capability;
pub mod catalog;
pub mod electricitymaps;
pub mod error;
pub mod intensity;
pub mod traits;

pub use capability::CapabilityTable;
pub use catalog::{BuiltinCatalog, FileCatalog, RegionCatalog, RegionList};
pub use electricitymaps::ElectricityMapsOracle;
pub use error::{CatalogError, OracleError, OracleResult};
pub use intensity::{CachedIntensityOracle, StaticIntensityTable};
pub use traits::{AvailabilityOracle, CatalogSource, IntensityOracle, RegionRecord};
