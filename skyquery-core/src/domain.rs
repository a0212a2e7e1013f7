//! Data domains served by the query engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A family of data with its own backing store.
///
/// The first six variants hold [`Record`](crate::Record) types and share the
/// [`RecordStore`](crate::RecordStore) interface. The remaining domains expose
/// specialised stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// Aerodromes and heliports keyed by ICAO code.
    Airport,
    /// Radio navigation aids keyed by ident.
    Navaid,
    /// Named enroute and terminal fixes.
    Waypoint,
    /// Controlled and restricted airspace volumes.
    Airspace,
    /// Airway segments between two fixes.
    Airway,
    /// Topographic map features such as towns and rivers.
    MapElement,
    /// Gridded terrain elevation.
    Terrain,
    /// Gridded forecast parameters.
    Weather,
    /// Georeferenced chart images.
    BitmapMap,
}

impl Domain {
    /// Every domain, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Airport,
        Self::Navaid,
        Self::Waypoint,
        Self::Airspace,
        Self::Airway,
        Self::MapElement,
        Self::Terrain,
        Self::Weather,
        Self::BitmapMap,
    ];

    /// Stable lower-case identifier used for table names and file stems.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Airport => "airports",
            Self::Navaid => "navaids",
            Self::Waypoint => "waypoints",
            Self::Airspace => "airspaces",
            Self::Airway => "airways",
            Self::MapElement => "mapelements",
            Self::Terrain => "terrain",
            Self::Weather => "weather",
            Self::BitmapMap => "bitmapmaps",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
