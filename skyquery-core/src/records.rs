//! Aeronautical record types.
//!
//! Every record carries an optional persisted identifier. `None` marks a
//! record that has not been saved yet; stores assign an identifier on
//! [`RecordStore::save`](crate::RecordStore::save) and echo the record back.

use geo::{BoundingRect, Centroid, Coord, Geometry, InteriorPoint, MultiPolygon, Rect};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Domain;

/// Common view over the records held by a [`RecordStore`](crate::RecordStore).
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Domain the record belongs to.
    const DOMAIN: Domain;

    /// Persisted identifier, if the record has been saved.
    fn id(&self) -> Option<u64>;

    /// Assign the persisted identifier.
    fn set_id(&mut self, id: u64);

    /// Primary lookup key (ICAO code, ident or name).
    fn key(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Axis-aligned extent in WGS84 (`x = longitude`, `y = latitude`).
    fn envelope(&self) -> Rect<f64>;

    /// Reference position used for nearest-neighbour ranking.
    fn anchor(&self) -> Coord<f64>;
}

fn point_envelope(at: Coord<f64>) -> Rect<f64> {
    Rect::new(at, at)
}

fn zero() -> Coord<f64> {
    Coord { x: 0.0, y: 0.0 }
}

/// Use category of an aerodrome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AirportKind {
    /// Civil aerodrome.
    #[default]
    Civil,
    /// Military aerodrome.
    Military,
    /// Joint civil and military use.
    Joint,
    /// Helicopter landing site.
    Heliport,
}

/// A runway with both thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runway {
    /// Designator of the higher-numbered end, e.g. `27L`.
    pub ident_he: String,
    /// Designator of the lower-numbered end, e.g. `09R`.
    pub ident_le: String,
    /// Take-off run available in metres.
    pub length_m: u32,
    /// Surface code such as `ASP` or `GRS`.
    pub surface: String,
}

/// An aerodrome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Four-letter ICAO location indicator.
    pub icao: String,
    /// Aerodrome name.
    pub name: String,
    /// Aerodrome reference point.
    pub location: Coord<f64>,
    /// Field elevation in feet.
    pub elevation_ft: i32,
    /// Use category.
    pub kind: AirportKind,
    /// Runways, possibly empty.
    pub runways: Vec<Runway>,
}

impl Airport {
    /// Create an unsaved civil airport without runways.
    pub fn new(icao: impl Into<String>, name: impl Into<String>, location: Coord<f64>) -> Self {
        Self {
            id: None,
            icao: icao.into(),
            name: name.into(),
            location,
            elevation_ft: 0,
            kind: AirportKind::Civil,
            runways: Vec::new(),
        }
    }
}

impl Record for Airport {
    const DOMAIN: Domain = Domain::Airport;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.icao
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        point_envelope(self.location)
    }

    fn anchor(&self) -> Coord<f64> {
        self.location
    }
}

/// Kind of radio navigation aid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavaidKind {
    /// VHF omnidirectional range.
    Vor,
    /// VOR with co-located DME.
    VorDme,
    /// Distance measuring equipment.
    Dme,
    /// Non-directional beacon.
    Ndb,
    /// Military TACAN.
    Tacan,
    /// VOR with co-located TACAN.
    Vortac,
}

/// A radio navigation aid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navaid {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Morse ident, e.g. `TRA`.
    pub ident: String,
    /// Station name.
    pub name: String,
    /// Antenna position.
    pub location: Coord<f64>,
    /// Equipment kind.
    pub kind: NavaidKind,
    /// Frequency in kHz.
    pub frequency_khz: u32,
    /// Station elevation in feet.
    pub elevation_ft: i32,
}

impl Record for Navaid {
    const DOMAIN: Domain = Domain::Navaid;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.ident
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        point_envelope(self.location)
    }

    fn anchor(&self) -> Coord<f64> {
        self.location
    }
}

/// Route structure a waypoint belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaypointUsage {
    /// Enroute fix.
    #[default]
    Enroute,
    /// Terminal-area fix.
    Terminal,
    /// Visual reporting point.
    Visual,
}

/// A named fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Five-letter name code.
    pub name: String,
    /// Fix position.
    pub location: Coord<f64>,
    /// Route structure.
    pub usage: WaypointUsage,
}

impl Record for Waypoint {
    const DOMAIN: Domain = Domain::Waypoint;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        point_envelope(self.location)
    }

    fn anchor(&self) -> Coord<f64> {
        self.location
    }
}

/// Airspace classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AirspaceClass {
    /// ICAO class A.
    A,
    /// ICAO class B.
    B,
    /// ICAO class C.
    C,
    /// ICAO class D.
    D,
    /// ICAO class E.
    E,
    /// ICAO class F.
    F,
    /// ICAO class G.
    G,
    /// Control zone.
    Ctr,
    /// Terminal manoeuvring area.
    Tma,
    /// Restricted area.
    Restricted,
    /// Danger area.
    Danger,
    /// Prohibited area.
    Prohibited,
}

/// A three-dimensional airspace volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airspace {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Designator, e.g. `LSR21`.
    pub ident: String,
    /// Published name.
    pub name: String,
    /// Classification.
    pub class: AirspaceClass,
    /// Lower limit in feet.
    pub lower_ft: i32,
    /// Upper limit in feet.
    pub upper_ft: i32,
    /// Lateral boundary.
    pub boundary: MultiPolygon<f64>,
}

impl Record for Airspace {
    const DOMAIN: Domain = Domain::Airspace;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.ident
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        self.boundary
            .bounding_rect()
            .unwrap_or_else(|| point_envelope(zero()))
    }

    fn anchor(&self) -> Coord<f64> {
        self.boundary
            .interior_point()
            .map_or_else(zero, |point| point.0)
    }
}

/// One end of an airway segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirwayFix {
    /// Fix ident.
    pub ident: String,
    /// Fix position.
    pub location: Coord<f64>,
}

/// A single airway segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airway {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Airway designator, e.g. `UL612`.
    pub name: String,
    /// Segment start.
    pub begin: AirwayFix,
    /// Segment end.
    pub end: AirwayFix,
    /// Lowest usable flight level.
    pub base_fl: u16,
    /// Highest usable flight level.
    pub top_fl: u16,
}

impl Airway {
    /// The segment as a geodesic-agnostic straight line.
    pub fn line(&self) -> geo::Line<f64> {
        geo::Line::new(self.begin.location, self.end.location)
    }
}

impl Record for Airway {
    const DOMAIN: Domain = Domain::Airway;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        Rect::new(self.begin.location, self.end.location)
    }

    fn anchor(&self) -> Coord<f64> {
        self.line().centroid().0
    }
}

/// Kind of topographic map feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapElementKind {
    /// Settlement outline or marker.
    Town,
    /// River centre line.
    River,
    /// Lake shoreline.
    Lake,
    /// Forest outline.
    Forest,
    /// Road centre line.
    Road,
    /// Railway centre line.
    Railway,
    /// National border.
    Border,
}

/// A topographic map feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapElement {
    /// Persisted identifier.
    pub id: Option<u64>,
    /// Feature name; may be empty for unnamed features.
    pub name: String,
    /// Feature kind.
    pub kind: MapElementKind,
    /// Feature geometry.
    pub geometry: Geometry<f64>,
}

impl Record for MapElement {
    const DOMAIN: Domain = Domain::MapElement;

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn envelope(&self) -> Rect<f64> {
        self.geometry
            .bounding_rect()
            .unwrap_or_else(|| point_envelope(zero()))
    }

    fn anchor(&self) -> Coord<f64> {
        self.geometry
            .interior_point()
            .map_or_else(zero, |point| point.0)
    }
}
