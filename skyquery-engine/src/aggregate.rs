//! Elevation aggregates computed from a [`TerrainStore`].
//!
//! Each function samples the store on a grid no finer than the store's
//! resolution and checks the supplied [`InterruptFlag`] between rows or
//! profile stations. A result with no present sample at all is reported as
//! [`QueryError::NoData`] rather than an empty success.

use geo::{
    Bearing, BoundingRect, Coord, Destination, Distance, Haversine, InterpolatePoint, Intersects,
    MultiPolygon, Point, Rect,
};
use skyquery_core::{
    ElevationProfile, ElevationRange, ElevationRaster, InterruptFlag, ProfilePoint, TerrainStore,
};

use crate::QueryError;

/// Largest raster edge, in samples.
pub const MAX_RASTER_EDGE: usize = 2048;

/// Widest accepted profile corridor half-width, in nautical miles.
pub const MAX_CORRIDOR_NMI: f64 = 10.0;

/// Longest accepted profile leg, in nautical miles.
pub const MAX_LEG_NMI: f64 = 1000.0;

/// Corridor half-width used when the caller does not supply one.
pub const DEFAULT_CORRIDOR_NMI: f64 = 5.0;

const METRES_PER_NMI: f64 = 1852.0;
const NMI_PER_DEGREE: f64 = 60.0;

/// Cap on samples visited by an area min/max.
const MAX_AREA_SAMPLES: usize = MAX_RASTER_EDGE * MAX_RASTER_EDGE;

/// Cap on stations along one profile leg.
const MAX_LEG_STATIONS: usize = 4096;

/// Elevation at a single point.
pub fn point(store: &dyn TerrainStore, at: Coord<f64>) -> Result<i16, QueryError> {
    store.sample(at)?.ok_or(QueryError::NoData)
}

/// Lowest and highest elevation inside `rect`, edges included.
pub fn minmax_rect(
    store: &dyn TerrainStore,
    rect: &Rect<f64>,
    interrupt: &InterruptFlag,
) -> Result<ElevationRange, QueryError> {
    area_range(store, rect, interrupt, |_| true)
}

/// Lowest and highest elevation inside `area`, boundary included.
pub fn minmax_polygon(
    store: &dyn TerrainStore,
    area: &MultiPolygon<f64>,
    interrupt: &InterruptFlag,
) -> Result<ElevationRange, QueryError> {
    let bounds = area.bounding_rect().ok_or(QueryError::NoData)?;
    area_range(store, &bounds, interrupt, |at| area.intersects(&at))
}

fn area_range<F>(
    store: &dyn TerrainStore,
    bounds: &Rect<f64>,
    interrupt: &InterruptFlag,
    inside: F,
) -> Result<ElevationRange, QueryError>
where
    F: Fn(Coord<f64>) -> bool,
{
    let grid = AreaGrid::over(bounds, store.resolution());
    let mut range: Option<ElevationRange> = None;
    for row in 0..grid.rows {
        check(interrupt)?;
        for column in 0..grid.columns {
            let at = grid.position(column, row);
            if !inside(at) {
                continue;
            }
            if let Some(elevation) = store.sample(at)? {
                range
                    .get_or_insert(ElevationRange::at(elevation))
                    .include(elevation);
            }
        }
    }
    range.ok_or(QueryError::NoData)
}

/// Sample positions covering a rectangle at roughly the store resolution.
struct AreaGrid {
    origin: Coord<f64>,
    step_x: f64,
    step_y: f64,
    columns: usize,
    rows: usize,
}

impl AreaGrid {
    fn over(bounds: &Rect<f64>, resolution: f64) -> Self {
        let resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution
        } else {
            bounds.width().max(bounds.height()).max(f64::MIN_POSITIVE)
        };
        let mut columns = intervals(bounds.width(), resolution) + 1;
        let mut rows = intervals(bounds.height(), resolution) + 1;
        while columns.saturating_mul(rows) > MAX_AREA_SAMPLES {
            columns = columns.div_ceil(2);
            rows = rows.div_ceil(2);
        }
        Self {
            origin: bounds.min(),
            step_x: spacing(bounds.width(), columns),
            step_y: spacing(bounds.height(), rows),
            columns,
            rows,
        }
    }

    fn position(&self, column: usize, row: usize) -> Coord<f64> {
        Coord {
            x: self.origin.x + column as f64 * self.step_x,
            y: self.origin.y + row as f64 * self.step_y,
        }
    }
}

/// Number of whole steps of `step` needed to span `length`.
fn intervals(length: f64, step: f64) -> usize {
    let count = (length / step).ceil();
    if count.is_finite() && count > 0.0 {
        count.min(usize::MAX as f64) as usize
    } else {
        0
    }
}

fn spacing(length: f64, samples: usize) -> f64 {
    if samples > 1 {
        length / (samples - 1) as f64
    } else {
        0.0
    }
}

/// Elevation along the great circle from `from` to `to`.
///
/// Each station reports the track elevation and the range across a
/// corridor extending `corridor_nmi` to either side of the track.
pub fn profile(
    store: &dyn TerrainStore,
    from: Coord<f64>,
    to: Coord<f64>,
    corridor_nmi: f64,
    interrupt: &InterruptFlag,
) -> Result<ElevationProfile, QueryError> {
    let stations = leg_stations(store, from, to, corridor_nmi, 0, interrupt)?;
    with_data(ElevationProfile { points: stations })
}

/// Elevation along consecutive legs of `route`.
///
/// Distances accumulate across legs and each station records the index of
/// its leg. The joint between two legs appears once.
pub fn route_profile(
    store: &dyn TerrainStore,
    route: &[Coord<f64>],
    corridor_nmi: f64,
    interrupt: &InterruptFlag,
) -> Result<ElevationProfile, QueryError> {
    if route.len() < 2 {
        return Err(QueryError::out_of_range(
            "a route profile needs at least two points",
        ));
    }
    let mut points: Vec<ProfilePoint> = Vec::new();
    for (leg, pair) in route.windows(2).enumerate() {
        let [from, to] = pair else { continue };
        let offset = points.last().map_or(0.0, |point| point.distance_nmi);
        let stations = leg_stations(store, *from, *to, corridor_nmi, leg, interrupt)?;
        let skip = usize::from(leg > 0);
        points.extend(stations.into_iter().skip(skip).map(|mut station| {
            station.distance_nmi += offset;
            station
        }));
    }
    with_data(ElevationProfile { points })
}

fn with_data(profile: ElevationProfile) -> Result<ElevationProfile, QueryError> {
    if profile.points.iter().any(|point| point.range.is_some()) {
        Ok(profile)
    } else {
        Err(QueryError::NoData)
    }
}

fn leg_stations(
    store: &dyn TerrainStore,
    from: Coord<f64>,
    to: Coord<f64>,
    corridor_nmi: f64,
    leg: usize,
    interrupt: &InterruptFlag,
) -> Result<Vec<ProfilePoint>, QueryError> {
    if !(0.0..=MAX_CORRIDOR_NMI).contains(&corridor_nmi) {
        return Err(QueryError::out_of_range(format!(
            "corridor of {corridor_nmi} NM is outside 0 to {MAX_CORRIDOR_NMI} NM"
        )));
    }
    let (start, end) = (Point::from(from), Point::from(to));
    let length_nmi = Haversine.distance(start, end) / METRES_PER_NMI;
    if !length_nmi.is_finite() || length_nmi > MAX_LEG_NMI {
        return Err(QueryError::out_of_range(format!(
            "leg of {length_nmi:.1} NM exceeds {MAX_LEG_NMI} NM"
        )));
    }

    let mut step_nmi = store.resolution() * NMI_PER_DEGREE;
    if !(step_nmi.is_finite() && step_nmi > 0.0) {
        step_nmi = length_nmi.max(1.0);
    }
    let count = (intervals(length_nmi, step_nmi) + 1).min(MAX_LEG_STATIONS);
    let offsets = corridor_offsets(corridor_nmi, step_nmi);
    let course = Haversine.bearing(start, end);

    let mut stations = Vec::with_capacity(count);
    for index in 0..count {
        check(interrupt)?;
        let ratio = if count > 1 {
            index as f64 / (count - 1) as f64
        } else {
            0.0
        };
        let centre = Haversine.point_at_ratio_between(start, end, ratio);
        let elevation = store.sample(centre.0)?;
        let mut samples = Vec::with_capacity(offsets.len() + 1);
        samples.push(elevation);
        for offset in &offsets {
            let bearing = if *offset < 0.0 { course - 90.0 } else { course + 90.0 };
            let lateral = Haversine.destination(centre, bearing, offset.abs() * METRES_PER_NMI);
            samples.push(store.sample(lateral.0)?);
        }
        stations.push(ProfilePoint {
            distance_nmi: length_nmi * ratio,
            elevation,
            range: ElevationRange::from_samples(samples),
            leg,
        });
    }
    Ok(stations)
}

/// Signed lateral offsets, excluding the track itself.
fn corridor_offsets(corridor_nmi: f64, step_nmi: f64) -> Vec<f64> {
    let steps = intervals(corridor_nmi, step_nmi).min(MAX_LEG_STATIONS);
    (1..=steps)
        .flat_map(|k| {
            let offset = (k as f64 * step_nmi).min(corridor_nmi);
            [-offset, offset]
        })
        .collect()
}

/// A `width` × `height` raster over `bbox`, northern row first.
pub fn raster(
    store: &dyn TerrainStore,
    bbox: &Rect<f64>,
    width: usize,
    height: usize,
    interrupt: &InterruptFlag,
) -> Result<ElevationRaster, QueryError> {
    if width == 0 || height == 0 || width > MAX_RASTER_EDGE || height > MAX_RASTER_EDGE {
        return Err(QueryError::out_of_range(format!(
            "raster of {width}x{height} samples is outside 1x1 to {MAX_RASTER_EDGE}x{MAX_RASTER_EDGE}"
        )));
    }
    let step_x = spacing(bbox.width(), width);
    let step_y = spacing(bbox.height(), height);
    let mut samples = Vec::with_capacity(width * height);
    for row in 0..height {
        check(interrupt)?;
        let lat = bbox.max().y - row as f64 * step_y;
        for column in 0..width {
            let lon = bbox.min().x + column as f64 * step_x;
            samples.push(store.sample(Coord { x: lon, y: lat })?);
        }
    }
    let raster = ElevationRaster {
        bbox: *bbox,
        width,
        height,
        samples,
    };
    if raster.samples.iter().all(Option::is_none) {
        return Err(QueryError::NoData);
    }
    Ok(raster)
}

fn check(interrupt: &InterruptFlag) -> Result<(), QueryError> {
    interrupt.check().map_err(QueryError::from)
}
