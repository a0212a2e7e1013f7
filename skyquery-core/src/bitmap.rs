//! Catalogue of georeferenced chart images.

use std::path::{Path, PathBuf};

use geo::{Contains, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    Domain, Interrupter, InterruptFlag, StoreError, TextQuery,
    store::{SnapshotWriteError, read_snapshot, write_snapshot},
};

/// A chart image and the area it depicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapMap {
    /// Chart title.
    pub name: String,
    /// Scale denominator, e.g. `500_000` for a 1:500 000 chart.
    pub scale: u32,
    /// Area depicted by the image.
    pub bbox: Rect<f64>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Location of the image file.
    pub path: PathBuf,
}

/// Lookup of chart images.
pub trait BitmapMapStore: Send {
    /// Charts whose name satisfies `query`, ordered by name.
    fn find_by_name(&self, query: &TextQuery) -> Result<Vec<BitmapMap>, StoreError>;

    /// Charts depicting all of `region`, most detailed scale first.
    fn find_covering(&self, region: &Rect<f64>) -> Result<Vec<BitmapMap>, StoreError>;

    /// Handle that interrupts the operation currently running.
    fn interrupter(&self) -> Interrupter;
}

/// In-memory chart catalogue.
#[derive(Debug, Clone, Default)]
pub struct BitmapMapCatalog {
    maps: Vec<BitmapMap>,
    interrupt: InterruptFlag,
}

impl BitmapMapCatalog {
    /// Create a catalogue from `maps`.
    pub fn new(mut maps: Vec<BitmapMap>) -> Self {
        sort_maps(&mut maps);
        Self {
            maps,
            interrupt: InterruptFlag::new(),
        }
    }

    /// Load a catalogue snapshot.
    ///
    /// Relative image paths are resolved against the snapshot's directory.
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut maps: Vec<BitmapMap> = read_snapshot(path, Domain::BitmapMap)?;
        if let Some(base) = path.parent() {
            for map in &mut maps {
                if map.path.is_relative() {
                    map.path = base.join(&map.path);
                }
            }
        }
        Ok(Self::new(maps))
    }

    /// Write the catalogue as a snapshot.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<(), SnapshotWriteError> {
        write_snapshot(path.as_ref(), Domain::BitmapMap, &self.maps)
    }

    /// Drop charts whose image file does not exist and return how many
    /// were removed.
    pub fn check_files(&mut self) -> usize {
        let before = self.maps.len();
        self.maps.retain(|map| {
            let present = map.path.is_file();
            if !present {
                log::warn!("dropping chart {}: {} is missing", map.name, map.path.display());
            }
            present
        });
        before - self.maps.len()
    }

    /// Charts in catalogue order.
    pub fn maps(&self) -> &[BitmapMap] {
        &self.maps
    }

    /// Number of charts held.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Return `true` when the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Most detailed first, then by name.
fn sort_maps(maps: &mut [BitmapMap]) {
    maps.sort_by(|a, b| a.scale.cmp(&b.scale).then_with(|| a.name.cmp(&b.name)));
}

impl BitmapMapStore for BitmapMapCatalog {
    fn find_by_name(&self, query: &TextQuery) -> Result<Vec<BitmapMap>, StoreError> {
        self.interrupt.reset();
        let mut found = Vec::new();
        for map in &self.maps {
            self.interrupt.check()?;
            if query.matches(&map.name) {
                found.push(map);
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.scale.cmp(&b.scale)));
        Ok(query.window(found).cloned().collect())
    }

    fn find_covering(&self, region: &Rect<f64>) -> Result<Vec<BitmapMap>, StoreError> {
        self.interrupt.reset();
        let mut found = Vec::new();
        for map in &self.maps {
            self.interrupt.check()?;
            if map.bbox.contains(region) {
                found.push(map.clone());
            }
        }
        Ok(found)
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupt.interrupter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatchMode;
    use geo::Coord;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn chart(name: &str, scale: u32, min: (f64, f64), max: (f64, f64)) -> BitmapMap {
        BitmapMap {
            name: name.into(),
            scale,
            bbox: Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 }),
            width: 4_000,
            height: 3_000,
            path: PathBuf::from(format!("{name}.png")),
        }
    }

    #[fixture]
    fn catalog() -> BitmapMapCatalog {
        BitmapMapCatalog::new(vec![
            chart("ICAO Switzerland", 500_000, (5.5, 45.5), (11.0, 48.0)),
            chart("Zurich VFR", 250_000, (8.0, 47.0), (9.5, 48.0)),
            chart("Alps Overview", 1_000_000, (5.0, 44.0), (16.0, 49.0)),
        ])
    }

    fn names(maps: &[BitmapMap]) -> Vec<&str> {
        maps.iter().map(|map| map.name.as_str()).collect()
    }

    #[rstest]
    fn covering_orders_by_scale(catalog: BitmapMapCatalog) {
        let region = Rect::new(Coord { x: 8.4, y: 47.3 }, Coord { x: 8.7, y: 47.6 });
        let found = catalog.find_covering(&region).expect("query");
        assert_eq!(
            names(&found),
            vec!["Zurich VFR", "ICAO Switzerland", "Alps Overview"]
        );
    }

    #[rstest]
    fn covering_excludes_partial_overlap(catalog: BitmapMapCatalog) {
        let region = Rect::new(Coord { x: 10.0, y: 47.0 }, Coord { x: 12.0, y: 48.0 });
        let found = catalog.find_covering(&region).expect("query");
        assert_eq!(names(&found), vec!["Alps Overview"]);
    }

    #[rstest]
    fn name_lookup_is_sorted_by_name(catalog: BitmapMapCatalog) {
        let query = TextQuery::new("i").with_mode(MatchMode::Contains);
        let found = catalog.find_by_name(&query).expect("query");
        assert_eq!(
            names(&found),
            vec!["Alps Overview", "ICAO Switzerland", "Zurich VFR"]
        );
    }

    #[rstest]
    fn check_files_drops_missing_images(catalog: BitmapMapCatalog) {
        let dir = TempDir::new().expect("create temp dir");
        let present = dir.path().join("Zurich VFR.png");
        std::fs::write(&present, b"png").expect("write image");
        let mut maps = catalog.maps().to_vec();
        for map in &mut maps {
            map.path = dir.path().join(&map.path);
        }
        let mut catalog = BitmapMapCatalog::new(maps);
        assert_eq!(catalog.check_files(), 2);
        assert_eq!(names(catalog.maps()), vec!["Zurich VFR"]);
    }

    #[rstest]
    fn snapshot_resolves_relative_paths(catalog: BitmapMapCatalog) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("bitmapmaps.snap");
        catalog.write_snapshot(&path).expect("write snapshot");
        let loaded = BitmapMapCatalog::open_snapshot(&path).expect("open snapshot");
        assert_eq!(loaded.len(), 3);
        assert!(loaded.maps().iter().all(|map| map.path.starts_with(dir.path())));
    }
}
