//! Regular latitude/longitude elevation grids.

use std::path::Path;

use geo::{Coord, Intersects, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Domain, Interrupter, StoreError,
    store::{SnapshotWriteError, read_snapshot, write_snapshot},
};

use super::TerrainStore;

/// Errors returned when a grid's shape does not match its samples.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    /// The spacing between samples must be a positive, finite number of degrees.
    #[error("grid step must be positive and finite, got {step}")]
    InvalidStep {
        /// Offending step.
        step: f64,
    },
    /// A grid needs at least one row and one column.
    #[error("grid must have at least one row and one column")]
    Empty,
    /// The sample vector length differs from `columns * rows`.
    #[error("grid of {columns}x{rows} needs {expected} samples, got {found}")]
    SampleCount {
        /// Number of columns.
        columns: usize,
        /// Number of rows.
        rows: usize,
        /// `columns * rows`.
        expected: usize,
        /// Length of the supplied vector.
        found: usize,
    },
}

/// Elevation grid anchored at its south-west sample.
///
/// Samples are stored row-major starting with the southernmost row. Each
/// sample holds metres above mean sea level, or `None` where the source had
/// no data. Lookups snap to the nearest sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTerrain {
    origin: Coord<f64>,
    step: f64,
    columns: usize,
    rows: usize,
    samples: Vec<Option<i16>>,
}

impl GridTerrain {
    /// Validate and construct a grid.
    pub fn new(
        origin: Coord<f64>,
        step: f64,
        columns: usize,
        rows: usize,
        samples: Vec<Option<i16>>,
    ) -> Result<Self, GridError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(GridError::InvalidStep { step });
        }
        if columns == 0 || rows == 0 {
            return Err(GridError::Empty);
        }
        let expected = columns.saturating_mul(rows);
        if samples.len() != expected {
            return Err(GridError::SampleCount {
                columns,
                rows,
                expected,
                found: samples.len(),
            });
        }
        Ok(Self {
            origin,
            step,
            columns,
            rows,
            samples,
        })
    }

    /// Build a grid by evaluating `elevation` at every sample position.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use geo::Coord;
    /// use skyquery_core::{GridTerrain, TerrainStore};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let grid = GridTerrain::from_fn(Coord { x: 0.0, y: 0.0 }, 0.5, 3, 3, |at| {
    ///     Some((at.x * 100.0) as i16)
    /// })?;
    /// assert_eq!(grid.sample(Coord { x: 1.0, y: 0.5 })?, Some(100));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_fn<F>(
        origin: Coord<f64>,
        step: f64,
        columns: usize,
        rows: usize,
        mut elevation: F,
    ) -> Result<Self, GridError>
    where
        F: FnMut(Coord<f64>) -> Option<i16>,
    {
        let mut samples = Vec::with_capacity(columns.saturating_mul(rows));
        for row in 0..rows {
            for column in 0..columns {
                samples.push(elevation(Coord {
                    x: origin.x + column as f64 * step,
                    y: origin.y + row as f64 * step,
                }));
            }
        }
        Self::new(origin, step, columns, rows, samples)
    }

    /// Area spanned by the sample positions.
    pub fn bounds(&self) -> Rect<f64> {
        let far = Coord {
            x: self.origin.x + (self.columns - 1) as f64 * self.step,
            y: self.origin.y + (self.rows - 1) as f64 * self.step,
        };
        Rect::new(self.origin, far)
    }

    /// Spacing between neighbouring samples in degrees.
    pub const fn step(&self) -> f64 {
        self.step
    }

    fn cell(&self, at: Coord<f64>) -> Option<usize> {
        let column = ((at.x - self.origin.x) / self.step).round();
        let row = ((at.y - self.origin.y) / self.step).round();
        if !(column >= 0.0 && row >= 0.0) {
            return None;
        }
        let (column, row) = (column as usize, row as usize);
        (column < self.columns && row < self.rows).then(|| row * self.columns + column)
    }

    fn elevation_at(&self, at: Coord<f64>) -> Option<i16> {
        self.cell(at)
            .and_then(|index| self.samples.get(index).copied().flatten())
    }
}

impl TerrainStore for GridTerrain {
    fn resolution(&self) -> f64 {
        self.step
    }

    fn sample(&self, at: Coord<f64>) -> Result<Option<i16>, StoreError> {
        Ok(self.elevation_at(at))
    }

    /// Sampling never blocks, so there is nothing to interrupt.
    fn interrupter(&self) -> Interrupter {
        Interrupter::noop()
    }
}

/// Terrain assembled from several grids.
///
/// A lookup is answered by the first tile whose bounds contain the point and
/// which holds data there, so finer tiles listed first override coarser
/// fallbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainTiles {
    tiles: Vec<GridTerrain>,
}

impl TerrainTiles {
    /// Combine `tiles` in priority order.
    pub fn new(tiles: Vec<GridTerrain>) -> Self {
        Self { tiles }
    }

    /// Load tiles from a terrain snapshot.
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let tiles = read_snapshot(path.as_ref(), Domain::Terrain)?;
        Ok(Self { tiles })
    }

    /// Write the tiles as a terrain snapshot.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<(), SnapshotWriteError> {
        write_snapshot(path.as_ref(), Domain::Terrain, &self.tiles)
    }

    /// Tiles in priority order.
    pub fn tiles(&self) -> &[GridTerrain] {
        &self.tiles
    }
}

impl TerrainStore for TerrainTiles {
    fn resolution(&self) -> f64 {
        self.tiles
            .iter()
            .map(GridTerrain::step)
            .reduce(f64::min)
            .unwrap_or(f64::INFINITY)
    }

    fn sample(&self, at: Coord<f64>) -> Result<Option<i16>, StoreError> {
        Ok(self
            .tiles
            .iter()
            .filter(|tile| tile.bounds().intersects(&at))
            .find_map(|tile| tile.elevation_at(at)))
    }

    fn interrupter(&self) -> Interrupter {
        Interrupter::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn slope() -> GridTerrain {
        GridTerrain::from_fn(Coord { x: 7.0, y: 46.0 }, 0.5, 5, 3, |at| {
            Some(((at.x - 7.0) * 1_000.0 + (at.y - 46.0) * 100.0) as i16)
        })
        .expect("build grid")
    }

    #[rstest]
    #[case(Coord { x: 7.0, y: 46.0 }, Some(0))]
    #[case(Coord { x: 9.0, y: 47.0 }, Some(2_100))]
    #[case(Coord { x: 7.74, y: 46.26 }, Some(550))]
    #[case(Coord { x: 9.3, y: 46.0 }, None)]
    #[case(Coord { x: 6.7, y: 46.0 }, None)]
    fn samples_snap_to_nearest_cell(
        slope: GridTerrain,
        #[case] at: Coord<f64>,
        #[case] expected: Option<i16>,
    ) {
        assert_eq!(slope.sample(at).expect("sample"), expected);
    }

    #[rstest]
    fn bounds_span_sample_positions(slope: GridTerrain) {
        let bounds = slope.bounds();
        assert_eq!(bounds.min(), Coord { x: 7.0, y: 46.0 });
        assert_eq!(bounds.max(), Coord { x: 9.0, y: 47.0 });
    }

    #[rstest]
    #[case(0.0, 1, 1, 1, GridError::InvalidStep { step: 0.0 })]
    #[case(0.1, 0, 1, 0, GridError::Empty)]
    #[case(0.1, 2, 2, 3, GridError::SampleCount { columns: 2, rows: 2, expected: 4, found: 3 })]
    fn rejects_inconsistent_shapes(
        #[case] step: f64,
        #[case] columns: usize,
        #[case] rows: usize,
        #[case] count: usize,
        #[case] expected: GridError,
    ) {
        let err = GridTerrain::new(Coord { x: 0.0, y: 0.0 }, step, columns, rows, vec![None; count])
            .expect_err("invalid grid");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn tiles_fall_back_to_later_grids(slope: GridTerrain) {
        let holes = GridTerrain::from_fn(Coord { x: 7.0, y: 46.0 }, 0.5, 2, 2, |_| None)
            .expect("build grid");
        let tiles = TerrainTiles::new(vec![holes, slope]);
        assert_eq!(
            tiles.sample(Coord { x: 7.5, y: 46.5 }).expect("sample"),
            Some(550)
        );
        assert!((tiles.resolution() - 0.5).abs() < f64::EPSILON);
    }

    #[rstest]
    fn snapshot_preserves_tiles(slope: GridTerrain) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("terrain.snap");
        let tiles = TerrainTiles::new(vec![slope]);
        tiles.write_snapshot(&path).expect("write snapshot");
        let loaded = TerrainTiles::open_snapshot(&path).expect("open snapshot");
        assert_eq!(loaded, tiles);
    }
}
