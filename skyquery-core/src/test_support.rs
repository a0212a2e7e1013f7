//! Fixtures shared by unit, behaviour and downstream tests.
//!
//! The sample data describes a small patch of northern Switzerland so tests
//! can reason about real-looking identifiers and distances.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use geo::{Coord, Geometry, LineString, MultiPolygon, Rect, polygon};

use crate::{
    Airport, Airspace, AirspaceClass, Airway, AirwayFix, BitmapMap, BitmapMapCatalog, Domain,
    GridTerrain, Interrupter, InterruptFlag, MapElement, MapElementKind, Navaid, NavaidKind,
    Record, RecordStore, StoreError, TerrainTiles, TextQuery, WeatherCatalog, WeatherLayer,
    Waypoint, WaypointUsage, store::write_snapshot,
};

fn at(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

/// Four Swiss and German aerodromes, unsaved.
pub fn sample_airports() -> Vec<Airport> {
    vec![
        Airport {
            elevation_ft: 1_416,
            ..Airport::new("LSZH", "Zurich", at(8.5492, 47.4647))
        },
        Airport {
            elevation_ft: 1_411,
            ..Airport::new("LSGG", "Geneva", at(6.1092, 46.2381))
        },
        Airport {
            elevation_ft: 1_674,
            ..Airport::new("LSZB", "Bern Belp", at(7.4992, 46.9141))
        },
        Airport {
            elevation_ft: 1_487,
            ..Airport::new("EDDM", "Munich", at(11.7861, 48.3538))
        },
    ]
}

/// Three navaids around Zurich, unsaved.
pub fn sample_navaids() -> Vec<Navaid> {
    let navaid = |ident: &str, name: &str, location, frequency_khz| Navaid {
        id: None,
        ident: ident.into(),
        name: name.into(),
        location,
        kind: NavaidKind::VorDme,
        frequency_khz,
        elevation_ft: 1_500,
    };
    vec![
        navaid("KLO", "Kloten", at(8.5450, 47.4578), 114_850),
        navaid("TRA", "Trasadingen", at(8.4356, 47.6894), 114_300),
        navaid("ZUE", "Zurich East", at(8.7567, 47.5922), 110_050),
    ]
}

/// Enroute waypoints, unsaved.
pub fn sample_waypoints() -> Vec<Waypoint> {
    let waypoint = |name: &str, location| Waypoint {
        id: None,
        name: name.into(),
        location,
        usage: WaypointUsage::Enroute,
    };
    vec![
        waypoint("AMIKI", at(8.1200, 47.5600)),
        waypoint("GIPOL", at(8.3300, 47.2500)),
        waypoint("RILAX", at(8.9000, 47.3900)),
    ]
}

/// A control zone and a restricted area, unsaved.
pub fn sample_airspaces() -> Vec<Airspace> {
    let square = |min: Coord<f64>, max: Coord<f64>| {
        MultiPolygon::new(vec![polygon![
            (x: min.x, y: min.y),
            (x: max.x, y: min.y),
            (x: max.x, y: max.y),
            (x: min.x, y: max.y),
        ]])
    };
    vec![
        Airspace {
            id: None,
            ident: String::from("LSZH-CTR"),
            name: String::from("Zurich CTR"),
            class: AirspaceClass::Ctr,
            lower_ft: 0,
            upper_ft: 4_000,
            boundary: square(at(8.40, 47.35), at(8.70, 47.60)),
        },
        Airspace {
            id: None,
            ident: String::from("LSR21"),
            name: String::from("Sion Restricted"),
            class: AirspaceClass::Restricted,
            lower_ft: 0,
            upper_ft: 13_000,
            boundary: square(at(7.20, 46.10), at(7.50, 46.30)),
        },
    ]
}

/// Airway segments, one of which clips the corner of the Zurich area.
pub fn sample_airways() -> Vec<Airway> {
    let segment = |name: &str, begin: (&str, Coord<f64>), end: (&str, Coord<f64>)| Airway {
        id: None,
        name: name.into(),
        begin: AirwayFix {
            ident: begin.0.into(),
            location: begin.1,
        },
        end: AirwayFix {
            ident: end.0.into(),
            location: end.1,
        },
        base_fl: 95,
        top_fl: 660,
    };
    vec![
        segment("UN850", ("TRA", at(8.4356, 47.6894)), ("ZUE", at(8.7567, 47.5922))),
        segment("UL612", ("KLO", at(8.5450, 47.4578)), ("RILAX", at(8.9000, 47.3900))),
        segment("UZ669", ("AMIKI", at(8.1200, 47.5600)), ("GIPOL", at(8.3300, 47.2500))),
    ]
}

/// A town and a river, unsaved.
pub fn sample_map_elements() -> Vec<MapElement> {
    vec![
        MapElement {
            id: None,
            name: String::from("Winterthur"),
            kind: MapElementKind::Town,
            geometry: Geometry::Point(at(8.7241, 47.5001).into()),
        },
        MapElement {
            id: None,
            name: String::from("Rhine"),
            kind: MapElementKind::River,
            geometry: Geometry::LineString(LineString::from(vec![
                at(8.2000, 47.5900),
                at(8.4500, 47.5800),
                at(8.6300, 47.6900),
            ])),
        },
    ]
}

/// Terrain rising eastwards by 100 m per 0.1° of longitude.
///
/// Covers 8.0–9.0°E, 47.0–48.0°N at 0.01° spacing; the elevation at a
/// sample is `400 + 1000 * (lon - 8.0)` metres, rounded. The square
/// 8.50–8.52°E, 47.50–47.52°N is a data void.
pub fn sample_terrain() -> GridTerrain {
    let result = GridTerrain::from_fn(at(8.0, 47.0), 0.01, 101, 101, |sample| {
        let void = (8.495..8.525).contains(&sample.x) && (47.495..47.525).contains(&sample.y);
        (!void).then(|| (400.0 + (sample.x - 8.0) * 1_000.0).round() as i16)
    });
    match result {
        Ok(grid) => grid,
        Err(err) => panic!("sample terrain has a consistent shape: {err}"),
    }
}

/// Two temperature layers an hour apart over the sample area.
pub fn sample_weather() -> WeatherCatalog {
    let bbox = Rect::new(at(8.0, 47.0), at(9.0, 48.0));
    let layer = |valid_at, base: f32| {
        WeatherLayer::new("TMP", "2 m", valid_at, bbox, 2, 2, vec![Some(base); 4])
            .unwrap_or_else(|err| panic!("sample weather layer is consistent: {err}"))
    };
    WeatherCatalog::new(vec![layer(0, 15.0), layer(3_600, 17.0)])
}

/// Two charts over the sample area with relative image paths.
pub fn sample_bitmap_maps() -> BitmapMapCatalog {
    let chart = |name: &str, scale, bbox| BitmapMap {
        name: String::from(name),
        scale,
        bbox,
        width: 2_000,
        height: 2_000,
        path: format!("{}.png", name.to_lowercase().replace(' ', "-")).into(),
    };
    BitmapMapCatalog::new(vec![
        chart("Zurich VFR", 250_000, Rect::new(at(8.0, 47.0), at(9.0, 48.0))),
        chart("Switzerland", 500_000, Rect::new(at(5.5, 45.5), at(11.0, 48.0))),
    ])
}

/// Populate `dir` with one SQLite database per record domain.
#[cfg(feature = "store-sqlite")]
pub fn write_sqlite_fixtures(dir: &Path) -> Result<(), StoreError> {
    save_all(&mut crate::SqliteStore::open(dir.join("airports.db"))?, sample_airports())?;
    save_all(&mut crate::SqliteStore::open(dir.join("navaids.db"))?, sample_navaids())?;
    save_all(&mut crate::SqliteStore::open(dir.join("waypoints.db"))?, sample_waypoints())?;
    save_all(&mut crate::SqliteStore::open(dir.join("airspaces.db"))?, sample_airspaces())?;
    save_all(&mut crate::SqliteStore::open(dir.join("airways.db"))?, sample_airways())?;
    save_all(
        &mut crate::SqliteStore::open(dir.join("mapelements.db"))?,
        sample_map_elements(),
    )?;
    write_auxiliary_fixtures(dir)
}

/// Populate `dir` with one legacy snapshot per record domain.
pub fn write_snapshot_fixtures(dir: &Path) -> Result<(), StoreError> {
    write_records(dir, sample_airports())?;
    write_records(dir, sample_navaids())?;
    write_records(dir, sample_waypoints())?;
    write_records(dir, sample_airspaces())?;
    write_records(dir, sample_airways())?;
    write_records(dir, sample_map_elements())?;
    write_auxiliary_fixtures(dir)
}

/// Write terrain, weather and chart snapshots into `dir`.
pub fn write_auxiliary_fixtures(dir: &Path) -> Result<(), StoreError> {
    let snapshot_error = |err: crate::SnapshotWriteError| StoreError::Io {
        path: dir.to_path_buf(),
        source: std::io::Error::other(err),
    };
    TerrainTiles::new(vec![sample_terrain()])
        .write_snapshot(dir.join("terrain.snap"))
        .map_err(snapshot_error)?;
    sample_weather()
        .write_snapshot(dir.join("weather.snap"))
        .map_err(snapshot_error)?;
    sample_bitmap_maps()
        .write_snapshot(dir.join("bitmapmaps.snap"))
        .map_err(snapshot_error)
}

#[cfg(feature = "store-sqlite")]
fn save_all<R: Record>(
    store: &mut impl RecordStore<R>,
    records: Vec<R>,
) -> Result<(), StoreError> {
    for record in records {
        store.save(record)?;
    }
    Ok(())
}

fn write_records<R: Record>(dir: &Path, records: Vec<R>) -> Result<(), StoreError> {
    let mut records = records;
    for (record, id) in records.iter_mut().zip(1..) {
        record.set_id(id);
    }
    let path = dir.join(format!("{}.snap", R::DOMAIN.as_str()));
    write_snapshot(&path, R::DOMAIN, &records).map_err(|err| StoreError::Io {
        path: path.clone(),
        source: std::io::Error::other(err),
    })
}

/// Record store whose operations block until interrupted.
///
/// Every call returns [`StoreError::Interrupted`] once the interrupter
/// fires, which lets tests observe cancellation of an executing query.
#[derive(Debug, Clone, Default)]
pub struct BlockingStore {
    interrupt: InterruptFlag,
    started: Arc<AtomicBool>,
}

impl BlockingStore {
    /// Create a store that has not yet been called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `true` once any operation has begun blocking.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn block(&self) -> StoreError {
        self.started.store(true, Ordering::SeqCst);
        while !self.interrupt.is_raised() {
            thread::sleep(Duration::from_millis(1));
        }
        StoreError::Interrupted
    }
}

impl<R: Record> RecordStore<R> for BlockingStore {
    fn find_by_key(&self, _query: &TextQuery) -> Result<Vec<R>, StoreError> {
        Err(self.block())
    }

    fn find_by_name(&self, _query: &TextQuery) -> Result<Vec<R>, StoreError> {
        Err(self.block())
    }

    fn find_by_text(&self, _query: &TextQuery) -> Result<Vec<R>, StoreError> {
        Err(self.block())
    }

    fn find_by_region(
        &self,
        _region: &Rect<f64>,
        _limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        Err(self.block())
    }

    fn find_nearest(
        &self,
        _point: Coord<f64>,
        _within: Option<&Rect<f64>>,
        _limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        Err(self.block())
    }

    fn save(&mut self, _record: R) -> Result<R, StoreError> {
        Err(self.block())
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupt.interrupter()
    }
}

/// Domains covered by the record fixtures, in write order.
pub const RECORD_DOMAINS: [Domain; 6] = [
    Domain::Airport,
    Domain::Navaid,
    Domain::Waypoint,
    Domain::Airspace,
    Domain::Airway,
    Domain::MapElement,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, TerrainStore};
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case(at(8.0, 47.0), Some(400))]
    #[case(at(8.3, 47.2), Some(700))]
    #[case(at(8.51, 47.51), None)]
    #[case(at(9.0, 48.0), Some(1_400))]
    fn sample_terrain_follows_its_formula(
        #[case] point: Coord<f64>,
        #[case] expected: Option<i16>,
    ) {
        assert_eq!(sample_terrain().sample(point).expect("sample"), expected);
    }

    #[rstest]
    fn snapshot_fixtures_open_as_stores() {
        let dir = TempDir::new().expect("create temp dir");
        write_snapshot_fixtures(dir.path()).expect("write fixtures");
        let airports =
            MemoryStore::<Airport>::open_snapshot(dir.path().join("airports.snap")).expect("open");
        assert_eq!(airports.len(), 4);
        for domain in RECORD_DOMAINS {
            assert!(dir.path().join(format!("{domain}.snap")).is_file());
        }
    }

    #[rstest]
    fn blocking_store_returns_when_interrupted() {
        let store = BlockingStore::new();
        let interrupter = RecordStore::<Airport>::interrupter(&store);
        let handle = {
            let store = store.clone();
            thread::spawn(move || {
                RecordStore::<Airport>::find_by_key(&store, &TextQuery::new("x"))
            })
        };
        while !store.has_started() {
            thread::sleep(Duration::from_millis(1));
        }
        interrupter.interrupt();
        let result = handle.join().expect("join blocking thread");
        assert!(matches!(result, Err(StoreError::Interrupted)));
    }
}
