//! The query façade: one method per domain operation, all routed through a
//! single worker thread.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use geo::{Coord, Intersects, MultiPolygon, Rect};
use parking_lot::Mutex;
use paste::paste;
#[cfg(feature = "store-sqlite")]
use skyquery_core::SqliteStore;
use skyquery_core::{
    Airport, Airspace, Airway, BitmapMap, BitmapMapCatalog, BitmapMapStore, Domain,
    ElevationProfile, ElevationRange, ElevationRaster, InterruptFlag, Interrupter, MapElement,
    MemoryStore, Navaid, Record, RecordStore, StoreError, TerrainStore, TerrainTiles, TextQuery,
    WeatherCatalog, WeatherLayer, WeatherQuery, WeatherSample, WeatherStore, Waypoint,
};

use crate::{
    Backend, EngineConfig, EngineError, QueryError, QueryResult, ShutdownPolicy, aggregate,
    worker::Worker,
};

/// A store shared with the worker, plus the interrupter captured when it
/// was installed.
struct Slot<S: ?Sized> {
    store: Arc<Mutex<Box<S>>>,
    interrupter: Interrupter,
}

type RecordSlot<R> = Slot<dyn RecordStore<R>>;

impl<S: ?Sized> Slot<S> {
    fn new(store: Box<S>, interrupter: Interrupter) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            interrupter,
        }
    }
}

fn record_slot<R, S>(store: S) -> RecordSlot<R>
where
    R: Record,
    S: RecordStore<R> + 'static,
{
    let interrupter = store.interrupter();
    let store: Box<dyn RecordStore<R>> = Box::new(store);
    Slot::new(store, interrupter)
}

fn terrain_slot<S: TerrainStore + 'static>(store: S) -> Slot<dyn TerrainStore> {
    let interrupter = store.interrupter();
    let store: Box<dyn TerrainStore> = Box::new(store);
    Slot::new(store, interrupter)
}

fn weather_slot<S: WeatherStore + 'static>(store: S) -> Slot<dyn WeatherStore> {
    let interrupter = store.interrupter();
    let store: Box<dyn WeatherStore> = Box::new(store);
    Slot::new(store, interrupter)
}

fn bitmap_map_slot<S: BitmapMapStore + 'static>(store: S) -> Slot<dyn BitmapMapStore> {
    let interrupter = store.interrupter();
    let store: Box<dyn BitmapMapStore> = Box::new(store);
    Slot::new(store, interrupter)
}

/// One optional store per domain. `None` marks an unavailable domain.
#[derive(Default)]
struct Stores {
    airports: Option<RecordSlot<Airport>>,
    navaids: Option<RecordSlot<Navaid>>,
    waypoints: Option<RecordSlot<Waypoint>>,
    airspaces: Option<RecordSlot<Airspace>>,
    airways: Option<RecordSlot<Airway>>,
    map_elements: Option<RecordSlot<MapElement>>,
    terrain: Option<Slot<dyn TerrainStore>>,
    weather: Option<Slot<dyn WeatherStore>>,
    bitmap_maps: Option<Slot<dyn BitmapMapStore>>,
}

impl Stores {
    const fn is_available(&self, domain: Domain) -> bool {
        match domain {
            Domain::Airport => self.airports.is_some(),
            Domain::Navaid => self.navaids.is_some(),
            Domain::Waypoint => self.waypoints.is_some(),
            Domain::Airspace => self.airspaces.is_some(),
            Domain::Airway => self.airways.is_some(),
            Domain::MapElement => self.map_elements.is_some(),
            Domain::Terrain => self.terrain.is_some(),
            Domain::Weather => self.weather.is_some(),
            Domain::BitmapMap => self.bitmap_maps.is_some(),
        }
    }
}

struct EngineInner {
    worker: Worker,
    stores: Stores,
}

/// Handle to a query engine.
///
/// Clones share one worker thread and one set of stores. Every query method
/// returns at once with a [`QueryResult`]; the work runs on the worker in
/// submission order. Dropping the last handle shuts the worker down with the
/// configured [`ShutdownPolicy`].
///
/// # Examples
///
/// ```rust
/// use skyquery_core::{Airport, MemoryStore, TextQuery};
/// use skyquery_engine::Engine;
/// use geo::Coord;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let airports = MemoryStore::with_records([Airport::new(
///     "LSZH",
///     "Zurich",
///     Coord { x: 8.5492, y: 47.4647 },
/// )])?;
/// let engine = Engine::builder().with_airports(airports).build()?;
///
/// let found = engine.airport_find_by_key(TextQuery::exact("lszh")).wait()?;
/// assert_eq!(found[0].name, "Zurich");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let available: Vec<Domain> = Domain::ALL
            .into_iter()
            .filter(|domain| self.is_available(*domain))
            .collect();
        f.debug_struct("Engine")
            .field("available", &available)
            .field("shutdown_policy", &self.shutdown_policy())
            .finish_non_exhaustive()
    }
}

macro_rules! record_queries {
    ($($prefix:ident: $record:ty => $field:ident),* $(,)?) => {
        paste! {
            $(
                #[doc = concat!("Find ", stringify!($field), " by key.")]
                pub fn [<$prefix _find_by_key>](&self, query: TextQuery) -> QueryResult<Vec<$record>> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store.find_by_key(&query).map_err(QueryError::from)
                    })
                }

                #[doc = concat!("Find ", stringify!($field), " by name.")]
                pub fn [<$prefix _find_by_name>](&self, query: TextQuery) -> QueryResult<Vec<$record>> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store.find_by_name(&query).map_err(QueryError::from)
                    })
                }

                #[doc = concat!("Find ", stringify!($field), " whose key or name matches.")]
                pub fn [<$prefix _find_by_text>](&self, query: TextQuery) -> QueryResult<Vec<$record>> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store.find_by_text(&query).map_err(QueryError::from)
                    })
                }

                #[doc = concat!("Find ", stringify!($field), " intersecting `region`.")]
                pub fn [<$prefix _find_by_region>](
                    &self,
                    region: Rect<f64>,
                    limit: Option<usize>,
                ) -> QueryResult<Vec<$record>> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store.find_by_region(&region, limit).map_err(QueryError::from)
                    })
                }

                #[doc = concat!("Find the ", stringify!($field), " nearest to `point`.")]
                pub fn [<$prefix _find_nearest>](
                    &self,
                    point: Coord<f64>,
                    within: Option<Rect<f64>>,
                    limit: Option<usize>,
                ) -> QueryResult<Vec<$record>> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store
                            .find_nearest(point, within.as_ref(), limit)
                            .map_err(QueryError::from)
                    })
                }

                #[doc = concat!("Persist a record in the ", stringify!($field), " store.")]
                pub fn [<$prefix _save>](&self, record: $record) -> QueryResult<$record> {
                    self.run(self.inner.stores.$field.as_ref(), <$record as Record>::DOMAIN, move |store| {
                        store.save(record).map_err(QueryError::from)
                    })
                }
            )*
        }
    };
}

impl Engine {
    /// Start building an engine from explicit stores.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Open every enabled data set under `config.data_dir`.
    ///
    /// Record domains are read from `<domain>.db` or `<domain>.snap`
    /// according to [`EngineConfig::backend`]. A data set that is missing or
    /// fails to open is logged and its domain left unavailable; only a
    /// failure to start the worker is returned as an error.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let dir = config.data_dir.as_path();
        log::debug!(
            "opening {} data sets from {}",
            config.backend,
            dir.display()
        );
        let mut builder = Self::builder().shutdown_policy(config.shutdown_policy);
        builder.stores.airports = open_records(dir, config.backend);
        builder.stores.navaids = open_records(dir, config.backend);
        builder.stores.waypoints = open_records(dir, config.backend);
        builder.stores.airspaces = open_records(dir, config.backend);
        builder.stores.airways = open_records(dir, config.backend);
        builder.stores.map_elements = open_records(dir, config.backend);
        if config.load_terrain {
            let path = data_path(dir, Domain::Terrain, "snap");
            builder.stores.terrain =
                available(Domain::Terrain, TerrainTiles::open_snapshot(path)).map(terrain_slot);
        }
        if config.load_weather {
            let path = data_path(dir, Domain::Weather, "snap");
            builder.stores.weather =
                available(Domain::Weather, WeatherCatalog::open_snapshot(path)).map(weather_slot);
        }
        if config.load_bitmap_maps {
            let path = data_path(dir, Domain::BitmapMap, "snap");
            builder.stores.bitmap_maps =
                available(Domain::BitmapMap, BitmapMapCatalog::open_snapshot(path)).map(
                    |mut catalog| {
                        let missing = catalog.check_files();
                        if missing > 0 {
                            log::warn!("{missing} chart images are missing");
                        }
                        bitmap_map_slot(catalog)
                    },
                );
        }
        builder.build()
    }

    /// Return `true` when a store is installed for `domain`.
    pub fn is_available(&self, domain: Domain) -> bool {
        self.inner.stores.is_available(domain)
    }

    /// Policy applied when the last handle is dropped.
    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.inner.worker.policy()
    }

    /// Stop the worker now, handling queued queries according to `policy`.
    ///
    /// Queries submitted afterwards fail with [`QueryError::Shutdown`].
    /// Blocks until the worker exits unless called from a query callback.
    pub fn shutdown(&self, policy: ShutdownPolicy) {
        self.inner.worker.shutdown(policy);
    }

    /// Queue a caller-defined query on the worker.
    ///
    /// `cancel` runs if the query is cancelled while `action` executes.
    pub fn submit<T, A, C>(&self, action: A, cancel: C) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        A: FnOnce() -> Result<T, QueryError> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let result = QueryResult::new(action, cancel);
        self.inner.worker.enqueue(Box::new(result.clone()));
        result
    }

    fn run<S, T, F>(&self, slot: Option<&Slot<S>>, domain: Domain, action: F) -> QueryResult<T>
    where
        S: ?Sized + Send + 'static,
        T: Send + Sync + 'static,
        F: FnOnce(&mut S) -> Result<T, QueryError> + Send + 'static,
    {
        let Some(slot) = slot else {
            return QueryResult::failed(QueryError::Unavailable { domain });
        };
        let store = Arc::clone(&slot.store);
        let interrupter = slot.interrupter.clone();
        self.submit(
            move || action(&mut **store.lock()),
            move || interrupter.interrupt(),
        )
    }

    /// Run a terrain aggregate with its own interrupt flag next to the
    /// store's interrupter.
    fn terrain<T, F>(&self, action: F) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&dyn TerrainStore, &InterruptFlag) -> Result<T, QueryError> + Send + 'static,
    {
        let Some(slot) = self.inner.stores.terrain.as_ref() else {
            return QueryResult::failed(QueryError::Unavailable {
                domain: Domain::Terrain,
            });
        };
        let flag = InterruptFlag::new();
        let interrupter = slot.interrupter.clone().and(flag.interrupter());
        let store = Arc::clone(&slot.store);
        self.submit(
            move || action(&**store.lock(), &flag),
            move || interrupter.interrupt(),
        )
    }

    record_queries!(
        airport: Airport => airports,
        navaid: Navaid => navaids,
        waypoint: Waypoint => waypoints,
        airspace: Airspace => airspaces,
        airway: Airway => airways,
        mapelement: MapElement => map_elements,
    );

    /// Airway segments whose line crosses `region`, at most `limit`.
    ///
    /// Unlike [`Engine::airway_find_by_region`], a segment whose envelope
    /// overlaps the region but whose line passes beside it is excluded.
    pub fn airway_find_area(
        &self,
        region: Rect<f64>,
        limit: Option<usize>,
    ) -> QueryResult<Vec<Airway>> {
        self.run(
            self.inner.stores.airways.as_ref(),
            Domain::Airway,
            move |store| {
                let candidates = store.find_by_region(&region, None)?;
                Ok(candidates
                    .into_iter()
                    .filter(|airway| airway.line().intersects(&region))
                    .take(limit.unwrap_or(usize::MAX))
                    .collect())
            },
        )
    }

    /// Terrain elevation at `at`, in metres.
    pub fn elevation_point(&self, at: Coord<f64>) -> QueryResult<i16> {
        self.terrain(move |store, _| aggregate::point(store, at))
    }

    /// Lowest and highest elevation inside `rect`.
    pub fn elevation_minmax_rect(&self, rect: Rect<f64>) -> QueryResult<ElevationRange> {
        self.terrain(move |store, flag| aggregate::minmax_rect(store, &rect, flag))
    }

    /// Lowest and highest elevation inside `area`.
    pub fn elevation_minmax_polygon(&self, area: MultiPolygon<f64>) -> QueryResult<ElevationRange> {
        self.terrain(move |store, flag| aggregate::minmax_polygon(store, &area, flag))
    }

    /// Elevation profile from `from` to `to` with a corridor of
    /// `corridor_nmi` either side of the track.
    pub fn elevation_profile(
        &self,
        from: Coord<f64>,
        to: Coord<f64>,
        corridor_nmi: f64,
    ) -> QueryResult<ElevationProfile> {
        self.terrain(move |store, flag| aggregate::profile(store, from, to, corridor_nmi, flag))
    }

    /// Elevation profile along every leg of `route`.
    pub fn elevation_route_profile(
        &self,
        route: Vec<Coord<f64>>,
        corridor_nmi: f64,
    ) -> QueryResult<ElevationProfile> {
        self.terrain(move |store, flag| aggregate::route_profile(store, &route, corridor_nmi, flag))
    }

    /// Elevation raster of `width` × `height` samples over `bbox`.
    pub fn elevation_map(
        &self,
        bbox: Rect<f64>,
        width: usize,
        height: usize,
    ) -> QueryResult<ElevationRaster> {
        self.terrain(move |store, flag| aggregate::raster(store, &bbox, width, height, flag))
    }

    /// Weather layers accepted by `query`.
    pub fn weather_layers(&self, query: WeatherQuery) -> QueryResult<Vec<WeatherLayer>> {
        self.run(
            self.inner.stores.weather.as_ref(),
            Domain::Weather,
            move |store| store.find_layers(&query).map_err(QueryError::from),
        )
    }

    /// Value of `parameter` at `at`, from the layer valid closest to `time`.
    pub fn weather_sample(
        &self,
        parameter: impl Into<String>,
        at: Coord<f64>,
        time: i64,
    ) -> QueryResult<WeatherSample> {
        let parameter = parameter.into();
        self.run(
            self.inner.stores.weather.as_ref(),
            Domain::Weather,
            move |store| store.sample(&parameter, at, time)?.ok_or(QueryError::NoData),
        )
    }

    /// Charts whose name matches `query`.
    pub fn bitmap_map_find_by_name(&self, query: TextQuery) -> QueryResult<Vec<BitmapMap>> {
        self.run(
            self.inner.stores.bitmap_maps.as_ref(),
            Domain::BitmapMap,
            move |store| store.find_by_name(&query).map_err(QueryError::from),
        )
    }

    /// Charts depicting all of `region`, most detailed first.
    pub fn bitmap_map_find_covering(&self, region: Rect<f64>) -> QueryResult<Vec<BitmapMap>> {
        self.run(
            self.inner.stores.bitmap_maps.as_ref(),
            Domain::BitmapMap,
            move |store| store.find_covering(&region).map_err(QueryError::from),
        )
    }
}

fn data_path(dir: &Path, domain: Domain, extension: &str) -> PathBuf {
    dir.join(format!("{domain}.{extension}"))
}

fn available<S>(domain: Domain, opened: Result<S, StoreError>) -> Option<S> {
    match opened {
        Ok(store) => Some(store),
        Err(err) => {
            log::warn!("{domain} data unavailable: {err}");
            None
        }
    }
}

fn open_records<R: Record>(dir: &Path, backend: Backend) -> Option<RecordSlot<R>> {
    match backend {
        Backend::Memory => Some(record_slot(MemoryStore::<R>::new())),
        Backend::Snapshot => {
            let path = data_path(dir, R::DOMAIN, "snap");
            available(R::DOMAIN, MemoryStore::<R>::open_snapshot(path)).map(record_slot)
        }
        #[cfg(feature = "store-sqlite")]
        Backend::Sqlite => {
            let path = data_path(dir, R::DOMAIN, "db");
            if !path.is_file() {
                log::warn!("{} data unavailable: {} not found", R::DOMAIN, path.display());
                return None;
            }
            available(R::DOMAIN, SqliteStore::<R>::open(path)).map(record_slot)
        }
        #[cfg(not(feature = "store-sqlite"))]
        Backend::Sqlite => {
            log::warn!("{} data unavailable: built without SQLite support", R::DOMAIN);
            None
        }
    }
}

macro_rules! builder_stores {
    ($($field:ident: $record:ty),* $(,)?) => {
        paste! {
            $(
                #[doc = concat!("Serve ", stringify!($field), " from `store`.")]
                #[must_use]
                pub fn [<with_ $field>]<S>(mut self, store: S) -> Self
                where
                    S: RecordStore<$record> + 'static,
                {
                    self.stores.$field = Some(record_slot(store));
                    self
                }
            )*
        }
    };
}

/// Programmatic construction of an [`Engine`].
///
/// Domains without a store stay unavailable.
#[derive(Default)]
pub struct EngineBuilder {
    stores: Stores,
    policy: ShutdownPolicy,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    builder_stores!(
        airports: Airport,
        navaids: Navaid,
        waypoints: Waypoint,
        airspaces: Airspace,
        airways: Airway,
        map_elements: MapElement,
    );

    /// Serve terrain queries from `store`.
    #[must_use]
    pub fn with_terrain<S: TerrainStore + 'static>(mut self, store: S) -> Self {
        self.stores.terrain = Some(terrain_slot(store));
        self
    }

    /// Serve weather queries from `store`.
    #[must_use]
    pub fn with_weather<S: WeatherStore + 'static>(mut self, store: S) -> Self {
        self.stores.weather = Some(weather_slot(store));
        self
    }

    /// Serve chart queries from `store`.
    #[must_use]
    pub fn with_bitmap_maps<S: BitmapMapStore + 'static>(mut self, store: S) -> Self {
        self.stores.bitmap_maps = Some(bitmap_map_slot(store));
        self
    }

    /// Policy applied when the last engine handle is dropped.
    #[must_use]
    pub const fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start the worker thread.
    pub fn build(self) -> Result<Engine, EngineError> {
        let worker = Worker::spawn(self.policy)?;
        for domain in Domain::ALL {
            if !self.stores.is_available(domain) {
                log::debug!("{domain} queries will fail as unavailable");
            }
        }
        Ok(Engine {
            inner: Arc::new(EngineInner {
                worker,
                stores: self.stores,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use skyquery_core::test_support::{
        BlockingStore, sample_airports, sample_airways, sample_bitmap_maps, sample_navaids,
        sample_terrain, sample_weather, write_snapshot_fixtures,
    };
    use std::{thread, time::Duration};
    use tempfile::TempDir;

    fn rect(min: (f64, f64), max: (f64, f64)) -> Rect<f64> {
        Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 })
    }

    fn keys<R: Record>(records: &[R]) -> Vec<String> {
        records.iter().map(|record| record.key().to_owned()).collect()
    }

    #[fixture]
    fn engine() -> Engine {
        Engine::builder()
            .with_airports(MemoryStore::with_records(sample_airports()).expect("airports"))
            .with_navaids(MemoryStore::with_records(sample_navaids()).expect("navaids"))
            .with_airways(MemoryStore::with_records(sample_airways()).expect("airways"))
            .with_terrain(sample_terrain())
            .with_weather(sample_weather())
            .with_bitmap_maps(sample_bitmap_maps())
            .build()
            .expect("build engine")
    }

    #[rstest]
    fn missing_domain_fails_without_queueing(engine: Engine) {
        let result = engine.waypoint_find_by_key(TextQuery::exact("AMIKI"));
        assert!(result.is_done());
        assert!(matches!(
            result.error(),
            Some(QueryError::Unavailable {
                domain: Domain::Waypoint
            })
        ));
        assert!(!engine.is_available(Domain::Waypoint));
        assert!(engine.is_available(Domain::Airport));
    }

    #[rstest]
    fn record_queries_reach_their_store(engine: Engine) {
        let found = engine
            .airport_find_by_key(TextQuery::exact("lszh"))
            .wait()
            .expect("lookup");
        assert_eq!(keys(&found), vec!["LSZH"]);

        let nearest = engine
            .navaid_find_nearest(Coord { x: 8.55, y: 47.46 }, None, Some(1))
            .wait()
            .expect("nearest");
        assert_eq!(keys(&nearest), vec!["KLO"]);
    }

    #[rstest]
    fn save_echoes_assigned_identifier(engine: Engine) {
        let saved = engine
            .airport_save(Airport::new("LFSB", "Basel-Mulhouse", Coord { x: 7.5290, y: 47.5896 }))
            .wait()
            .expect("save");
        assert_eq!(saved.id, Some(5));
        let found = engine
            .airport_find_by_key(TextQuery::exact("LFSB"))
            .wait()
            .expect("lookup");
        assert_eq!(found.as_slice(), std::slice::from_ref(saved.as_ref()));
    }

    #[rstest]
    fn airway_area_excludes_segments_passing_beside(engine: Engine) {
        let region = rect((8.45, 47.59), (8.50, 47.62));
        let by_region = engine
            .airway_find_by_region(region, None)
            .wait()
            .expect("region");
        assert_eq!(keys(&by_region), vec!["UN850"]);
        let crossing = engine.airway_find_area(region, None).wait().expect("area");
        assert!(crossing.is_empty());

        let crossed = rect((8.60, 47.35), (8.70, 47.45));
        let crossing = engine.airway_find_area(crossed, None).wait().expect("area");
        assert_eq!(keys(&crossing), vec!["UL612"]);
    }

    #[rstest]
    fn terrain_queries_run_aggregates(engine: Engine) {
        let elevation = engine
            .elevation_point(Coord { x: 8.3, y: 47.3 })
            .wait()
            .expect("elevation");
        assert_eq!(*elevation, 700);
        let raster = engine.elevation_map(rect((8.0, 47.0), (8.2, 47.2)), 0, 3);
        assert!(matches!(
            raster.wait(),
            Err(QueryError::OutOfRange { .. })
        ));
    }

    #[rstest]
    fn weather_sample_outside_grid_is_no_data(engine: Engine) {
        let sample = engine
            .weather_sample("TMP", Coord { x: 8.5, y: 47.5 }, 3_000)
            .wait()
            .expect("sample");
        assert_eq!(sample.valid_at, 3_600);
        let outside = engine.weather_sample("TMP", Coord { x: 20.0, y: 10.0 }, 0);
        assert!(matches!(outside.wait(), Err(QueryError::NoData)));
    }

    #[rstest]
    fn charts_cover_regions(engine: Engine) {
        let charts = engine
            .bitmap_map_find_covering(rect((8.4, 47.3), (8.6, 47.5)))
            .wait()
            .expect("charts");
        let names: Vec<_> = charts.iter().map(|chart| chart.name.as_str()).collect();
        assert_eq!(names, vec!["Zurich VFR", "Switzerland"]);
    }

    #[rstest]
    fn cancelling_interrupts_the_running_store() {
        let blocking = BlockingStore::new();
        let engine = Engine::builder()
            .with_airports(blocking.clone())
            .with_navaids(MemoryStore::with_records(sample_navaids()).expect("navaids"))
            .build()
            .expect("build engine");
        let stuck = engine.airport_find_by_name(TextQuery::new("Zurich"));
        let next = engine.navaid_find_by_key(TextQuery::exact("TRA"));
        while !blocking.has_started() {
            thread::sleep(Duration::from_millis(1));
        }
        stuck.cancel();
        assert!(matches!(stuck.error(), Some(QueryError::Cancelled)));
        let found = next
            .wait_timeout(Duration::from_secs(5))
            .expect("worker freed")
            .expect("lookup");
        assert_eq!(keys(&found), vec!["TRA"]);
    }

    #[rstest]
    fn late_interrupt_never_reaches_the_next_query() {
        let engine = Engine::builder().build().expect("build engine");
        let store_flag = InterruptFlag::new();
        let stop = InterruptFlag::new();
        let started = InterruptFlag::new();
        let first = engine.submit(
            {
                let (stop, started) = (stop.clone(), started.clone());
                move || {
                    started.raise();
                    while !stop.is_raised() {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Ok(1_u32)
                }
            },
            {
                let store_flag = store_flag.clone();
                move || {
                    stop.raise();
                    thread::sleep(Duration::from_millis(50));
                    store_flag.raise();
                }
            },
        );
        let second = engine.submit(
            move || {
                store_flag.reset();
                thread::sleep(Duration::from_millis(100));
                if store_flag.is_raised() {
                    Err(QueryError::Cancelled)
                } else {
                    Ok(2_u32)
                }
            },
            || {},
        );
        while !started.is_raised() {
            thread::sleep(Duration::from_millis(1));
        }

        first.cancel();
        assert!(matches!(first.error(), Some(QueryError::Cancelled)));
        assert_eq!(*second.wait().expect("second query is untouched"), 2);
    }

    #[rstest]
    fn open_degrades_missing_data_sets() {
        let dir = TempDir::new().expect("temp dir");
        write_snapshot_fixtures(dir.path()).expect("fixtures");
        std::fs::remove_file(dir.path().join("navaids.snap")).expect("remove navaids");
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            backend: Backend::Snapshot,
            load_weather: true,
            ..EngineConfig::default()
        };
        let engine = Engine::open(&config).expect("open engine");
        assert!(engine.is_available(Domain::Airport));
        assert!(!engine.is_available(Domain::Navaid));
        assert!(engine.is_available(Domain::Terrain));
        assert!(engine.is_available(Domain::Weather));
        assert!(!engine.is_available(Domain::BitmapMap));

        let saved = engine.airport_save(Airport::new("LFSB", "Basel", Coord { x: 7.53, y: 47.59 }));
        assert!(matches!(saved.wait(), Err(QueryError::Store(_))));
    }

    #[cfg(feature = "store-sqlite")]
    #[rstest]
    fn sqlite_backend_requires_existing_databases() {
        let dir = TempDir::new().expect("temp dir");
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            load_terrain: false,
            ..EngineConfig::default()
        };
        let engine = Engine::open(&config).expect("open engine");
        assert!(Domain::ALL.iter().all(|domain| !engine.is_available(*domain)));
        assert!(!dir.path().join("airports.db").exists());
    }
}
