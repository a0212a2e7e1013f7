//! Gridded weather layers.
//!
//! A layer is one forecast parameter (wind component, temperature, cloud
//! cover) on a regular grid covering a bounding box, valid at one instant.
//! Instants are Unix timestamps in seconds.

use std::path::Path;

use geo::{Coord, Intersects, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    Domain, GridError, Interrupter, InterruptFlag, StoreError,
    store::{SnapshotWriteError, read_snapshot, write_snapshot},
};

/// A single parameter on a regular grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherLayer {
    /// Parameter name, e.g. `"TMP"` or `"UGRD"`.
    pub parameter: String,
    /// Vertical level the values apply to, e.g. `"850 hPa"`.
    pub level: String,
    /// Validity instant.
    pub valid_at: i64,
    bbox: Rect<f64>,
    columns: usize,
    rows: usize,
    values: Vec<Option<f32>>,
}

impl WeatherLayer {
    /// Validate and construct a layer.
    ///
    /// `values` are row-major starting at the southern edge of `bbox`; the
    /// first and last rows and columns lie on its edges.
    pub fn new(
        parameter: impl Into<String>,
        level: impl Into<String>,
        valid_at: i64,
        bbox: Rect<f64>,
        columns: usize,
        rows: usize,
        values: Vec<Option<f32>>,
    ) -> Result<Self, GridError> {
        if columns == 0 || rows == 0 {
            return Err(GridError::Empty);
        }
        let expected = columns.saturating_mul(rows);
        if values.len() != expected {
            return Err(GridError::SampleCount {
                columns,
                rows,
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            parameter: parameter.into(),
            level: level.into(),
            valid_at,
            bbox,
            columns,
            rows,
            values,
        })
    }

    /// Area covered by the grid.
    pub const fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    fn value(&self, column: usize, row: usize) -> Option<f32> {
        self.values.get(row * self.columns + column).copied().flatten()
    }

    /// Bilinear interpolation at `at`; `None` outside the grid or next to a
    /// missing value.
    pub fn interpolate(&self, at: Coord<f64>) -> Option<f32> {
        if !self.bbox.intersects(&at) {
            return None;
        }
        let (column, fx) = fractional_index(at.x, self.bbox.min().x, self.bbox.max().x, self.columns);
        let (row, fy) = fractional_index(at.y, self.bbox.min().y, self.bbox.max().y, self.rows);
        let east = (column + 1).min(self.columns - 1);
        let north = (row + 1).min(self.rows - 1);

        let sw = f64::from(self.value(column, row)?);
        let se = f64::from(self.value(east, row)?);
        let nw = f64::from(self.value(column, north)?);
        let ne = f64::from(self.value(east, north)?);
        let south = sw + (se - sw) * fx;
        let northern = nw + (ne - nw) * fx;
        Some((south + (northern - south) * fy) as f32)
    }
}

/// Integer cell and fractional offset of `value` along one axis.
fn fractional_index(value: f64, min: f64, max: f64, count: usize) -> (usize, f64) {
    let span = max - min;
    if count < 2 || span <= 0.0 {
        return (0, 0.0);
    }
    let position = ((value - min) / span * (count - 1) as f64).clamp(0.0, (count - 1) as f64);
    let cell = (position.floor() as usize).min(count - 2);
    (cell, position - cell as f64)
}

/// Filter applied by [`WeatherStore::find_layers`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherQuery {
    /// Only layers of this parameter.
    pub parameter: Option<String>,
    /// Only layers whose grid intersects this area.
    pub region: Option<Rect<f64>>,
    /// Only layers valid at or after this instant.
    pub valid_from: Option<i64>,
    /// Only layers valid at or before this instant.
    pub valid_until: Option<i64>,
}

impl WeatherQuery {
    /// Return `true` when `layer` passes every filter.
    pub fn accepts(&self, layer: &WeatherLayer) -> bool {
        self.parameter
            .as_deref()
            .is_none_or(|parameter| parameter == layer.parameter)
            && self
                .region
                .is_none_or(|region| region.intersects(&layer.bbox))
            && self.valid_from.is_none_or(|from| layer.valid_at >= from)
            && self.valid_until.is_none_or(|until| layer.valid_at <= until)
    }
}

/// Interpolated value of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    /// Parameter name.
    pub parameter: String,
    /// Level of the layer that answered.
    pub level: String,
    /// Validity instant of the layer that answered.
    pub valid_at: i64,
    /// Interpolated value.
    pub value: f32,
}

/// Access to gridded weather data.
pub trait WeatherStore: Send {
    /// Layers accepted by `query`, ordered by parameter, then validity.
    fn find_layers(&self, query: &WeatherQuery) -> Result<Vec<WeatherLayer>, StoreError>;

    /// Value of `parameter` at `at` from the layer valid closest to `time`.
    ///
    /// Layers without data at `at` are skipped. Ties in validity go to the
    /// earlier layer.
    fn sample(
        &self,
        parameter: &str,
        at: Coord<f64>,
        time: i64,
    ) -> Result<Option<WeatherSample>, StoreError>;

    /// Handle that interrupts the operation currently running.
    fn interrupter(&self) -> Interrupter;
}

/// In-memory collection of weather layers.
#[derive(Debug, Clone, Default)]
pub struct WeatherCatalog {
    layers: Vec<WeatherLayer>,
    interrupt: InterruptFlag,
}

impl WeatherCatalog {
    /// Create a catalogue from `layers`.
    pub fn new(layers: Vec<WeatherLayer>) -> Self {
        let mut catalog = Self {
            layers,
            interrupt: InterruptFlag::new(),
        };
        catalog.sort();
        catalog
    }

    /// Load layers from a weather snapshot.
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::new(read_snapshot(path.as_ref(), Domain::Weather)?))
    }

    /// Write the catalogue as a weather snapshot.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<(), SnapshotWriteError> {
        write_snapshot(path.as_ref(), Domain::Weather, &self.layers)
    }

    /// Add a layer.
    pub fn insert(&mut self, layer: WeatherLayer) {
        self.layers.push(layer);
        self.sort();
    }

    /// Drop layers valid before `cutoff` and return how many were removed.
    pub fn expire(&mut self, cutoff: i64) -> usize {
        let before = self.layers.len();
        self.layers.retain(|layer| layer.valid_at >= cutoff);
        before - self.layers.len()
    }

    /// Number of layers held.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Return `true` when no layers are held.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn sort(&mut self) {
        self.layers.sort_by(|a, b| {
            a.parameter
                .cmp(&b.parameter)
                .then_with(|| a.valid_at.cmp(&b.valid_at))
                .then_with(|| a.level.cmp(&b.level))
        });
    }
}

impl WeatherStore for WeatherCatalog {
    fn find_layers(&self, query: &WeatherQuery) -> Result<Vec<WeatherLayer>, StoreError> {
        self.interrupt.reset();
        let mut found = Vec::new();
        for layer in &self.layers {
            self.interrupt.check()?;
            if query.accepts(layer) {
                found.push(layer.clone());
            }
        }
        Ok(found)
    }

    fn sample(
        &self,
        parameter: &str,
        at: Coord<f64>,
        time: i64,
    ) -> Result<Option<WeatherSample>, StoreError> {
        self.interrupt.reset();
        let mut best: Option<(u64, &WeatherLayer, f32)> = None;
        for layer in self.layers.iter().filter(|layer| layer.parameter == parameter) {
            self.interrupt.check()?;
            let Some(value) = layer.interpolate(at) else {
                continue;
            };
            let gap = layer.valid_at.abs_diff(time);
            if best.is_none_or(|(best_gap, _, _)| gap < best_gap) {
                best = Some((gap, layer, value));
            }
        }
        Ok(best.map(|(_, layer, value)| WeatherSample {
            parameter: layer.parameter.clone(),
            level: layer.level.clone(),
            valid_at: layer.valid_at,
            value,
        }))
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupt.interrupter()
    }
}
