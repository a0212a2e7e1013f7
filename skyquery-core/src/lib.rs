//! Core data types and backing stores for the skyquery engine.
//!
//! This crate holds everything that runs *inside* a query: the aeronautical
//! record types, text and spatial query parameters, and the synchronous
//! store adapters the engine's worker thread drives. Nothing here spawns
//! threads; stores block the caller and expose an [`Interrupter`] instead.
//!
//! Coordinates are WGS84 `geo::Coord` values with `x` as longitude and `y`
//! as latitude, both in degrees.

mod bitmap;
mod domain;
mod interrupt;
mod query;
mod records;
pub mod store;
mod terrain;
mod weather;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bitmap::{BitmapMap, BitmapMapCatalog, BitmapMapStore};
pub use domain::Domain;
pub use interrupt::{InterruptFlag, Interrupter};
pub use query::{MatchMode, TextQuery};
pub use records::{
    Airport, AirportKind, Airspace, AirspaceClass, Airway, AirwayFix, MapElement, MapElementKind,
    Navaid, NavaidKind, Record, Runway, Waypoint, WaypointUsage,
};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
pub use store::{MemoryStore, RecordStore, SnapshotError, SnapshotWriteError, StoreError};
pub use terrain::{
    ElevationProfile, ElevationRange, ElevationRaster, GridError, GridTerrain, ProfilePoint,
    TerrainStore, TerrainTiles,
};
pub use weather::{WeatherCatalog, WeatherLayer, WeatherQuery, WeatherSample, WeatherStore};
