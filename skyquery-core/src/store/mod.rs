//! Backing-store adapters for record domains.
//!
//! The [`RecordStore`] trait is the synchronous interface the query engine
//! drives from its worker thread. Operations may block on disk or network
//! I/O; the engine never calls a store from more than one thread at a time.
//!
//! Coordinates use WGS84 with axis order (longitude, latitude) in degrees.
//! Regions are axis-aligned `Rect` values; containment includes boundary
//! points. Regions that cross the antimeridian MUST be split by the caller.

use std::borrow::Borrow;

use geo::{Coord, Distance, Haversine, Point, Rect};

use crate::{Interrupter, Record, TextQuery};

mod error;
mod memory;
mod snapshot;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::{SnapshotError, SnapshotWriteError, read_snapshot, write_snapshot};
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;

/// Synchronous access to one record domain.
///
/// Text lookups order matches by the compared field, then by identifier,
/// before applying the query's skip/limit window. Region lookups return
/// records whose envelope intersects the region, ordered by identifier.
/// Nearest lookups rank by great-circle distance from the point to each
/// record's anchor.
///
/// # Examples
///
/// ```rust
/// use geo::Coord;
/// use skyquery_core::{Airport, MemoryStore, RecordStore, TextQuery};
///
/// # fn main() -> Result<(), skyquery_core::StoreError> {
/// let mut store = MemoryStore::new();
/// let saved = store.save(Airport::new("LSZH", "Zurich", Coord { x: 8.55, y: 47.46 }))?;
/// assert_eq!(saved.id, Some(1));
///
/// let found = store.find_by_key(&TextQuery::exact("lszh"))?;
/// assert_eq!(found, vec![saved]);
/// # Ok(())
/// # }
/// ```
pub trait RecordStore<R: Record>: Send {
    /// Records whose key satisfies `query`.
    fn find_by_key(&self, query: &TextQuery) -> Result<Vec<R>, StoreError>;

    /// Records whose name satisfies `query`.
    fn find_by_name(&self, query: &TextQuery) -> Result<Vec<R>, StoreError>;

    /// Records whose key or name satisfies `query`, ordered by key.
    fn find_by_text(&self, query: &TextQuery) -> Result<Vec<R>, StoreError>;

    /// Records intersecting `region`, at most `limit` of them.
    fn find_by_region(&self, region: &Rect<f64>, limit: Option<usize>)
    -> Result<Vec<R>, StoreError>;

    /// Records closest to `point`, optionally restricted to `within`.
    fn find_nearest(
        &self,
        point: Coord<f64>,
        within: Option<&Rect<f64>>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError>;

    /// Persist `record`, assigning an identifier when it has none, and
    /// return the stored form.
    fn save(&mut self, record: R) -> Result<R, StoreError>;

    /// Handle that interrupts the operation currently running on this store.
    fn interrupter(&self) -> Interrupter;
}

/// Order records by distance from `origin`, ties broken by identifier.
pub(crate) fn nearest_first<R, B>(
    origin: Coord<f64>,
    records: impl IntoIterator<Item = B>,
    limit: Option<usize>,
) -> Vec<B>
where
    R: Record,
    B: Borrow<R>,
{
    let origin = Point::from(origin);
    let mut ranked: Vec<(f64, B)> = records
        .into_iter()
        .map(|record| {
            let anchor = Point::from(record.borrow().anchor());
            (Haversine.distance(origin, anchor), record)
        })
        .collect();
    ranked.sort_by(|(da, a), (db, b)| {
        da.total_cmp(db)
            .then_with(|| a.borrow().id().cmp(&b.borrow().id()))
    });
    ranked
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(_, record)| record)
        .collect()
}
