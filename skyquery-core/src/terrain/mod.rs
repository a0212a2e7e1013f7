//! Terrain elevation sources and the payloads computed from them.
//!
//! Elevations are whole metres above mean sea level. A missing sample
//! (ocean voids, tile gaps) is `None` rather than a sentinel value.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::{Interrupter, StoreError};

mod grid;

pub use grid::{GridError, GridTerrain, TerrainTiles};

/// Point sampling of a terrain model.
pub trait TerrainStore: Send {
    /// Approximate spacing between samples, in degrees.
    fn resolution(&self) -> f64;

    /// Elevation at `at`, or `None` where the model has no data.
    fn sample(&self, at: Coord<f64>) -> Result<Option<i16>, StoreError>;

    /// Handle that interrupts the sampling currently in progress.
    fn interrupter(&self) -> Interrupter;
}

/// Lowest and highest elevation found in an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationRange {
    /// Lowest sample.
    pub min: i16,
    /// Highest sample.
    pub max: i16,
}

impl ElevationRange {
    /// Range covering a single elevation.
    pub const fn at(elevation: i16) -> Self {
        Self {
            min: elevation,
            max: elevation,
        }
    }

    /// Widen the range to include `elevation`.
    pub fn include(&mut self, elevation: i16) {
        self.min = self.min.min(elevation);
        self.max = self.max.max(elevation);
    }

    /// Fold optional samples into a range; `None` when every sample is missing.
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<i16>>,
    {
        samples.into_iter().flatten().fold(None, |range, elevation| {
            let mut range = range.unwrap_or(Self::at(elevation));
            range.include(elevation);
            Some(range)
        })
    }
}

/// One station along an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Distance from the start of the profile in nautical miles.
    pub distance_nmi: f64,
    /// Elevation on the track itself.
    pub elevation: Option<i16>,
    /// Range across the lateral corridor, track included.
    pub range: Option<ElevationRange>,
    /// Index of the route leg this station belongs to.
    pub leg: usize,
}

/// Stations ordered by increasing distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    /// Profile stations.
    pub points: Vec<ProfilePoint>,
}

impl ElevationProfile {
    /// Total length in nautical miles.
    pub fn length_nmi(&self) -> f64 {
        self.points.last().map_or(0.0, |point| point.distance_nmi)
    }

    /// Highest elevation found anywhere in the corridor.
    pub fn highest(&self) -> Option<i16> {
        self.points
            .iter()
            .filter_map(|point| point.range.map(|range| range.max))
            .max()
    }
}

/// Grid of samples over a bounding box.
///
/// Row 0 is the northern edge; columns run west to east.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationRaster {
    /// Area covered by the raster.
    pub bbox: Rect<f64>,
    /// Samples per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Row-major samples.
    pub samples: Vec<Option<i16>>,
}

impl ElevationRaster {
    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<i16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get(y * self.width + x).copied().flatten()
    }

    /// Range over all present samples.
    pub fn range(&self) -> Option<ElevationRange> {
        ElevationRange::from_samples(self.samples.iter().copied())
    }
}
