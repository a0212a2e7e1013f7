//! Facade crate for the skyquery flight-planning query engine.
//!
//! This crate re-exports the record types and store traits from
//! `skyquery-core` together with the asynchronous [`Engine`] from
//! `skyquery-engine`. The SQLite store is available behind the
//! `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use skyquery_core::{
    Airport, AirportKind, Airspace, AirspaceClass, Airway, AirwayFix, BitmapMap,
    BitmapMapCatalog, BitmapMapStore, Domain, ElevationProfile, ElevationRange, ElevationRaster,
    GridTerrain, InterruptFlag, Interrupter, MapElement, MapElementKind, MatchMode, MemoryStore,
    Navaid, NavaidKind, ProfilePoint, Record, RecordStore, Runway, StoreError, TerrainStore,
    TerrainTiles, TextQuery, Waypoint, WaypointUsage, WeatherCatalog, WeatherLayer, WeatherQuery,
    WeatherSample, WeatherStore,
};

#[cfg(feature = "store-sqlite")]
pub use skyquery_core::SqliteStore;

pub use skyquery_engine::{
    Backend, Connection, Engine, EngineBuilder, EngineConfig, EngineError, QueryError,
    QueryResult, QueryState, ShutdownPolicy, aggregate,
};
