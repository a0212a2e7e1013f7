//! The `find`, `nearest` and `elevation` subcommands.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use geo::Coord;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use skyquery_core::{MatchMode, TextQuery};
use skyquery_engine::{Backend, Engine, EngineConfig, QueryResult, ShutdownPolicy};

use crate::{
    ARG_BACKEND, ARG_CORRIDOR, ARG_DATA_DIR, ARG_DOMAIN, ARG_LAT, ARG_LON, ARG_MODE,
    ARG_PATTERN, ARG_TO_LAT, ARG_TO_LON, CliError, ENV_ELEVATION_LAT, ENV_ELEVATION_LON,
    ENV_FIND_PATTERN, ENV_NEAREST_LAT, ENV_NEAREST_LON,
};

const DEFAULT_NEAREST_LIMIT: usize = 5;

/// Record domain a command searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum RecordKind {
    /// Aerodromes, keyed by ICAO code.
    #[default]
    Airport,
    /// Radio navigation aids.
    Navaid,
    /// Named fixes.
    Waypoint,
    /// Airspace volumes.
    Airspace,
    /// Airway segments.
    Airway,
    /// Towns, rivers and other map features.
    MapElement,
}

/// How `find` compares the pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Mode {
    /// Whole key or name, ignoring case.
    Exact,
    /// Whole key or name, case-sensitive.
    ExactCase,
    /// Key or name starts with the pattern.
    Prefix,
    /// Key or name contains the pattern.
    #[default]
    Contains,
}

impl From<Mode> for MatchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Exact => Self::Exact,
            Mode::ExactCase => Self::ExactCaseSensitive,
            Mode::Prefix => Self::StartsWith,
            Mode::Contains => Self::Contains,
        }
    }
}

/// Where the engine reads its data sets from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataSource {
    pub(crate) data_dir: Utf8PathBuf,
    pub(crate) backend: Backend,
}

impl DataSource {
    fn resolve(data_dir: Option<Utf8PathBuf>, backend: Option<Backend>) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            backend: backend.unwrap_or_default(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), CliError> {
        if self.data_dir.is_dir() {
            Ok(())
        } else {
            Err(CliError::MissingDataDirectory {
                path: self.data_dir.clone(),
            })
        }
    }

    fn open(&self, load_terrain: bool) -> Result<Engine, CliError> {
        self.validate()?;
        let config = EngineConfig {
            data_dir: self.data_dir.clone().into_std_path_buf(),
            backend: self.backend,
            load_terrain,
            load_weather: false,
            load_bitmap_maps: false,
            shutdown_policy: ShutdownPolicy::Abort,
        };
        Ok(Engine::open(&config)?)
    }
}

/// CLI arguments for the `find` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "find",
    long_about = "Search one record domain for keys or names matching a \
                 pattern. Matches are printed as a JSON array ordered by key.",
    about = "Search a record domain by key or name"
)]
#[ortho_config(prefix = "SKYQUERY")]
pub(crate) struct FindArgs {
    /// Text to look for.
    #[arg(value_name = ARG_PATTERN)]
    #[serde(default)]
    pub(crate) pattern: Option<String>,
    /// Record domain to search.
    #[arg(long = ARG_DOMAIN, value_enum)]
    #[serde(default)]
    pub(crate) domain: Option<RecordKind>,
    /// Comparison mode.
    #[arg(long = ARG_MODE, value_enum)]
    #[serde(default)]
    pub(crate) mode: Option<Mode>,
    /// Maximum number of matches to print.
    #[arg(long, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// Number of leading matches to skip.
    #[arg(long, value_name = "count")]
    #[serde(default)]
    pub(crate) skip: Option<usize>,
    /// Directory holding the data sets.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Store kind for record domains: sqlite, snapshot or memory.
    #[arg(long = ARG_BACKEND, value_name = "kind")]
    #[serde(default)]
    pub(crate) backend: Option<Backend>,
}

/// Resolved `find` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FindConfig {
    pub(crate) domain: RecordKind,
    pub(crate) query: TextQuery,
    pub(crate) source: DataSource,
}

impl TryFrom<FindArgs> for FindConfig {
    type Error = CliError;

    fn try_from(args: FindArgs) -> Result<Self, Self::Error> {
        let pattern = args.pattern.ok_or(CliError::MissingArgument {
            field: ARG_PATTERN,
            env: ENV_FIND_PATTERN,
        })?;
        let mut query = TextQuery::new(pattern).with_mode(args.mode.unwrap_or_default().into());
        if let Some(limit) = args.limit {
            query = query.with_limit(limit);
        }
        if let Some(skip) = args.skip {
            query = query.with_skip(skip);
        }
        Ok(Self {
            domain: args.domain.unwrap_or_default(),
            query,
            source: DataSource::resolve(args.data_dir, args.backend),
        })
    }
}

/// CLI arguments for the `nearest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "nearest",
    about = "List the records closest to a position"
)]
#[ortho_config(prefix = "SKYQUERY")]
pub(crate) struct NearestArgs {
    /// Longitude in degrees east.
    #[arg(long = ARG_LON, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    /// Latitude in degrees north.
    #[arg(long = ARG_LAT, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Record domain to search.
    #[arg(long = ARG_DOMAIN, value_enum)]
    #[serde(default)]
    pub(crate) domain: Option<RecordKind>,
    /// Number of records to print.
    #[arg(long, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// Directory holding the data sets.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Store kind for record domains: sqlite, snapshot or memory.
    #[arg(long = ARG_BACKEND, value_name = "kind")]
    #[serde(default)]
    pub(crate) backend: Option<Backend>,
}

/// Resolved `nearest` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NearestConfig {
    pub(crate) domain: RecordKind,
    pub(crate) point: Coord<f64>,
    pub(crate) limit: usize,
    pub(crate) source: DataSource,
}

impl TryFrom<NearestArgs> for NearestConfig {
    type Error = CliError;

    fn try_from(args: NearestArgs) -> Result<Self, Self::Error> {
        let point = coordinate(
            (args.lon, ENV_NEAREST_LON),
            (args.lat, ENV_NEAREST_LAT),
        )?;
        Ok(Self {
            domain: args.domain.unwrap_or_default(),
            point,
            limit: args.limit.unwrap_or(DEFAULT_NEAREST_LIMIT),
            source: DataSource::resolve(args.data_dir, args.backend),
        })
    }
}

/// CLI arguments for the `elevation` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "elevation",
    long_about = "Report the terrain elevation at a point. With --to-lon and \
                 --to-lat, print the elevation profile of the leg instead.",
    about = "Report terrain elevation at a point or along a leg"
)]
#[ortho_config(prefix = "SKYQUERY")]
pub(crate) struct ElevationArgs {
    /// Longitude in degrees east.
    #[arg(long = ARG_LON, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    /// Latitude in degrees north.
    #[arg(long = ARG_LAT, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude of the profile's end point.
    #[arg(long = ARG_TO_LON, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) to_lon: Option<f64>,
    /// Latitude of the profile's end point.
    #[arg(long = ARG_TO_LAT, allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) to_lat: Option<f64>,
    /// Corridor half-width in nautical miles.
    #[arg(long = ARG_CORRIDOR, value_name = "nmi")]
    #[serde(default)]
    pub(crate) corridor: Option<f64>,
    /// Directory holding `terrain.snap`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
}

/// Resolved `elevation` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ElevationConfig {
    pub(crate) from: Coord<f64>,
    pub(crate) to: Option<Coord<f64>>,
    pub(crate) corridor_nmi: f64,
    pub(crate) data_dir: Utf8PathBuf,
}

impl TryFrom<ElevationArgs> for ElevationConfig {
    type Error = CliError;

    fn try_from(args: ElevationArgs) -> Result<Self, Self::Error> {
        let from = coordinate(
            (args.lon, ENV_ELEVATION_LON),
            (args.lat, ENV_ELEVATION_LAT),
        )?;
        let to = match (args.to_lon, args.to_lat) {
            (None, None) => None,
            (Some(lon), Some(lat)) => Some(checked(lon, lat)?),
            _ => return Err(CliError::IncompleteProfile),
        };
        Ok(Self {
            from,
            to,
            corridor_nmi: args
                .corridor
                .unwrap_or(skyquery_engine::aggregate::DEFAULT_CORRIDOR_NMI),
            data_dir: args.data_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
        })
    }
}

fn coordinate(
    lon: (Option<f64>, &'static str),
    lat: (Option<f64>, &'static str),
) -> Result<Coord<f64>, CliError> {
    let x = lon.0.ok_or(CliError::MissingArgument {
        field: ARG_LON,
        env: lon.1,
    })?;
    let y = lat.0.ok_or(CliError::MissingArgument {
        field: ARG_LAT,
        env: lat.1,
    })?;
    checked(x, y)
}

fn checked(lon: f64, lat: f64) -> Result<Coord<f64>, CliError> {
    if !(-180.0..=180.0).contains(&lon) {
        return Err(CliError::InvalidCoordinate {
            field: ARG_LON,
            value: lon,
        });
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CliError::InvalidCoordinate {
            field: ARG_LAT,
            value: lat,
        });
    }
    Ok(Coord { x: lon, y: lat })
}

pub(crate) fn run_find_with(args: FindArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = FindConfig::try_from(merged)?;
    let output = execute_find(&config)?;
    write_output(writer, &output)
}

pub(crate) fn execute_find(config: &FindConfig) -> Result<serde_json::Value, CliError> {
    let engine = config.source.open(false)?;
    let query = config.query.clone();
    let operation = "find";
    match config.domain {
        RecordKind::Airport => collect(operation, &engine.airport_find_by_text(query)),
        RecordKind::Navaid => collect(operation, &engine.navaid_find_by_text(query)),
        RecordKind::Waypoint => collect(operation, &engine.waypoint_find_by_text(query)),
        RecordKind::Airspace => collect(operation, &engine.airspace_find_by_text(query)),
        RecordKind::Airway => collect(operation, &engine.airway_find_by_text(query)),
        RecordKind::MapElement => collect(operation, &engine.mapelement_find_by_text(query)),
    }
}

pub(crate) fn run_nearest_with(args: NearestArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = NearestConfig::try_from(merged)?;
    let output = execute_nearest(&config)?;
    write_output(writer, &output)
}

pub(crate) fn execute_nearest(config: &NearestConfig) -> Result<serde_json::Value, CliError> {
    let engine = config.source.open(false)?;
    let (point, limit) = (config.point, Some(config.limit));
    let operation = "nearest";
    match config.domain {
        RecordKind::Airport => collect(operation, &engine.airport_find_nearest(point, None, limit)),
        RecordKind::Navaid => collect(operation, &engine.navaid_find_nearest(point, None, limit)),
        RecordKind::Waypoint => {
            collect(operation, &engine.waypoint_find_nearest(point, None, limit))
        }
        RecordKind::Airspace => {
            collect(operation, &engine.airspace_find_nearest(point, None, limit))
        }
        RecordKind::Airway => collect(operation, &engine.airway_find_nearest(point, None, limit)),
        RecordKind::MapElement => {
            collect(operation, &engine.mapelement_find_nearest(point, None, limit))
        }
    }
}

pub(crate) fn run_elevation_with(
    args: ElevationArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ElevationConfig::try_from(merged)?;
    let output = execute_elevation(&config)?;
    write_output(writer, &output)
}

pub(crate) fn execute_elevation(config: &ElevationConfig) -> Result<serde_json::Value, CliError> {
    let source = DataSource {
        data_dir: config.data_dir.clone(),
        backend: Backend::Memory,
    };
    let engine = source.open(true)?;
    match config.to {
        Some(to) => collect(
            "elevation profile",
            &engine.elevation_profile(config.from, to, config.corridor_nmi),
        ),
        None => {
            let elevation = engine
                .elevation_point(config.from)
                .wait()
                .map_err(|source| CliError::Query {
                    operation: "elevation",
                    source,
                })?;
            Ok(serde_json::json!({
                "lon": config.from.x,
                "lat": config.from.y,
                "elevation_m": *elevation,
            }))
        }
    }
}

fn collect<T>(
    operation: &'static str,
    result: &QueryResult<T>,
) -> Result<serde_json::Value, CliError>
where
    T: Serialize + Send + Sync + 'static,
{
    let value = result
        .wait()
        .map_err(|source| CliError::Query { operation, source })?;
    serde_json::to_value(value.as_ref()).map_err(CliError::SerialiseOutput)
}

fn write_output(writer: &mut dyn Write, output: &serde_json::Value) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(output).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
