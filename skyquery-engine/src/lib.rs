//! Asynchronous query engine over the skyquery stores.
//!
//! An [`Engine`] owns one background worker thread. Every query method
//! returns a [`QueryResult`] immediately and the work runs on the worker in
//! submission order. Results can be waited on, polled, cancelled, or given
//! completion callbacks with [`QueryResult::connect`].
//!
//! ```rust
//! use skyquery_core::test_support::sample_terrain;
//! use skyquery_engine::Engine;
//! use geo::Coord;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::builder().with_terrain(sample_terrain()).build()?;
//! let elevation = engine.elevation_point(Coord { x: 8.25, y: 47.25 });
//! assert_eq!(*elevation.wait()?, 650);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
mod config;
mod engine;
mod error;
mod result;
mod worker;

pub use config::{Backend, EngineConfig, ParseNameError, ShutdownPolicy};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, QueryError};
pub use result::{Connection, QueryResult, QueryState};
