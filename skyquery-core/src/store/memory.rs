//! In-memory record store backed by an R\*-tree.

use std::{collections::BTreeMap, fmt, path::Path};

use geo::{Coord, Rect};
use rstar::{
    AABB, RTree,
    primitives::{GeomWithData, Rectangle},
};

use crate::{
    Interrupter, InterruptFlag, Record, StoreError, TextQuery,
    store::{RecordStore, nearest_first, snapshot::read_snapshot},
};

type Entry = GeomWithData<Rectangle<[f64; 2]>, u64>;

fn entry_for(id: u64, envelope: Rect<f64>) -> Entry {
    let min = envelope.min();
    let max = envelope.max();
    GeomWithData::new(Rectangle::from_corners([min.x, min.y], [max.x, max.y]), id)
}

fn aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Record store holding every record in memory.
///
/// Serves as the adapter for legacy snapshots (opened read-only) and as a
/// scratch store for tooling. Region lookups use an R\*-tree over record
/// envelopes; text lookups scan.
pub struct MemoryStore<R> {
    records: BTreeMap<u64, R>,
    index: RTree<Entry>,
    next_id: u64,
    read_only: bool,
    interrupt: InterruptFlag,
}

impl<R: Record> fmt::Debug for MemoryStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("domain", &R::DOMAIN)
            .field("entries", &self.records.len())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            index: RTree::new(),
            next_id: 1,
            read_only: false,
            interrupt: InterruptFlag::new(),
        }
    }
}

impl<R: Record> MemoryStore<R> {
    /// Create an empty, writable store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writable store from records.
    ///
    /// Records without an identifier are assigned one in iteration order.
    pub fn with_records<I>(records: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = R>,
    {
        let mut store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Open a legacy snapshot as a read-only store.
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let entries: Vec<R> = read_snapshot(path.as_ref(), R::DOMAIN)?;
        let mut store = Self::with_records(entries)?;
        store.read_only = true;
        Ok(store)
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return `true` when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in identifier order.
    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    fn insert(&mut self, mut record: R) -> Result<R, StoreError> {
        let id = match record.id() {
            Some(id) => id,
            None => self.next_id,
        };
        let following = id.checked_add(1).ok_or(StoreError::IdOutOfRange { id })?;
        self.next_id = self.next_id.max(following);
        record.set_id(id);

        if let Some(previous) = self.records.get(&id) {
            let stale = entry_for(id, previous.envelope());
            self.index.remove(&stale);
        }
        self.index.insert(entry_for(id, record.envelope()));
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn scan_text<F>(&self, query: &TextQuery, field: F) -> Result<Vec<R>, StoreError>
    where
        F: Fn(&R) -> &str,
    {
        self.interrupt.reset();
        let mut matches = Vec::new();
        for record in self.records.values() {
            self.interrupt.check()?;
            if query.matches(field(record)) {
                matches.push(record);
            }
        }
        matches.sort_by(|a, b| field(*a).cmp(field(*b)).then_with(|| a.id().cmp(&b.id())));
        Ok(query.window(matches).cloned().collect())
    }

    fn ids_in(&self, region: &Rect<f64>) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .index
            .locate_in_envelope_intersecting(&aabb(region))
            .map(|entry| entry.data)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    fn find_by_key(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.scan_text(query, R::key)
    }

    fn find_by_name(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.scan_text(query, R::name)
    }

    fn find_by_text(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.interrupt.reset();
        let mut matches = Vec::new();
        for record in self.records.values() {
            self.interrupt.check()?;
            if query.matches(record.key()) || query.matches(record.name()) {
                matches.push(record);
            }
        }
        matches.sort_by(|a, b| a.key().cmp(b.key()).then_with(|| a.id().cmp(&b.id())));
        Ok(query.window(matches).cloned().collect())
    }

    fn find_by_region(
        &self,
        region: &Rect<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        self.interrupt.reset();
        let ids = self.ids_in(region);
        let mut found = Vec::with_capacity(ids.len());
        for id in ids.into_iter().take(limit.unwrap_or(usize::MAX)) {
            self.interrupt.check()?;
            if let Some(record) = self.records.get(&id) {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    fn find_nearest(
        &self,
        point: Coord<f64>,
        within: Option<&Rect<f64>>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        self.interrupt.reset();
        let candidates: Vec<&R> = match within {
            Some(region) => self
                .ids_in(region)
                .iter()
                .filter_map(|id| self.records.get(id))
                .collect(),
            None => self.records.values().collect(),
        };
        self.interrupt.check()?;
        Ok(nearest_first::<R, _>(point, candidates, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    fn save(&mut self, record: R) -> Result<R, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly { domain: R::DOMAIN });
        }
        self.insert(record)
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupt.interrupter()
    }
}
