//! Focused unit tests covering command configuration and execution.

use super::helpers::{DataDir, json};
use super::*;
use crate::commands::{
    DataSource, ElevationArgs, ElevationConfig, FindArgs, FindConfig, Mode, NearestArgs,
    NearestConfig, RecordKind, execute_elevation, execute_find, execute_nearest, run_find_with,
};
use camino::Utf8PathBuf;
use geo::Coord;
use rstest::rstest;
use skyquery_core::{Domain, MatchMode};
use skyquery_engine::{Backend, QueryError};

fn snapshot_source(dir: &DataDir) -> DataSource {
    DataSource {
        data_dir: dir.path().clone(),
        backend: Backend::Snapshot,
    }
}

#[rstest]
fn find_without_pattern_errors() {
    let err = FindConfig::try_from(FindArgs::default()).expect_err("missing pattern should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_PATTERN);
            assert_eq!(env, ENV_FIND_PATTERN);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn find_config_applies_defaults() {
    let args = FindArgs {
        pattern: Some(String::from("zurich")),
        limit: Some(3),
        ..FindArgs::default()
    };
    let config = FindConfig::try_from(args).expect("config should build");
    assert_eq!(config.domain, RecordKind::Airport);
    assert_eq!(config.query.mode, MatchMode::Contains);
    assert_eq!(config.query.limit, Some(3));
    assert_eq!(config.source.data_dir, Utf8PathBuf::from("."));
    assert_eq!(config.source.backend, Backend::Sqlite);
}

#[rstest]
#[case(None, Some(47.0), ARG_LON, ENV_NEAREST_LON)]
#[case(Some(8.0), None, ARG_LAT, ENV_NEAREST_LAT)]
fn nearest_requires_both_coordinates(
    #[case] lon: Option<f64>,
    #[case] lat: Option<f64>,
    #[case] expected_field: &'static str,
    #[case] expected_env: &'static str,
) {
    let args = NearestArgs {
        lon,
        lat,
        ..NearestArgs::default()
    };
    match NearestConfig::try_from(args).expect_err("missing coordinate should error") {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, expected_field);
            assert_eq!(env, expected_env);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(181.0, 47.0, ARG_LON)]
#[case(8.0, -90.5, ARG_LAT)]
#[case(f64::NAN, 47.0, ARG_LON)]
fn coordinates_are_range_checked(#[case] lon: f64, #[case] lat: f64, #[case] expected: &str) {
    let args = ElevationArgs {
        lon: Some(lon),
        lat: Some(lat),
        ..ElevationArgs::default()
    };
    match ElevationConfig::try_from(args).expect_err("invalid coordinate should error") {
        CliError::InvalidCoordinate { field, .. } => assert_eq!(field, expected),
        other => panic!("expected InvalidCoordinate, found {other:?}"),
    }
}

#[rstest]
fn profile_needs_both_end_coordinates() {
    let args = ElevationArgs {
        lon: Some(8.1),
        lat: Some(47.3),
        to_lon: Some(8.9),
        ..ElevationArgs::default()
    };
    let err = ElevationConfig::try_from(args).expect_err("half a profile should error");
    assert!(matches!(err, CliError::IncompleteProfile));
}

#[rstest]
fn missing_data_directory_is_reported() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let missing = Utf8PathBuf::from_path_buf(dir.path().join("absent")).expect("utf-8 path");
    let source = DataSource {
        data_dir: missing.clone(),
        backend: Backend::Snapshot,
    };
    match source.validate().expect_err("missing directory should error") {
        CliError::MissingDataDirectory { path } => assert_eq!(path, missing),
        other => panic!("expected MissingDataDirectory, found {other:?}"),
    }
}

#[rstest]
fn find_searches_the_selected_domain() {
    let dir = DataDir::with_snapshots();
    let config = FindConfig {
        domain: RecordKind::Airport,
        query: skyquery_core::TextQuery::new("LS").with_mode(Mode::Prefix.into()),
        source: snapshot_source(&dir),
    };
    let output = execute_find(&config).expect("find should succeed");
    let keys: Vec<_> = output
        .as_array()
        .expect("array output")
        .iter()
        .map(|airport| airport["icao"].as_str().expect("icao"))
        .collect();
    assert_eq!(keys, vec!["LSGG", "LSZB", "LSZH"]);
}

#[rstest]
fn nearest_lists_closest_navaid() {
    let dir = DataDir::with_snapshots();
    let config = NearestConfig {
        domain: RecordKind::Navaid,
        point: Coord { x: 8.55, y: 47.46 },
        limit: 1,
        source: snapshot_source(&dir),
    };
    let output = execute_nearest(&config).expect("nearest should succeed");
    assert_eq!(output[0]["ident"], "KLO");
}

#[rstest]
fn elevation_reports_point_and_profile() {
    let dir = DataDir::with_snapshots();
    let point = ElevationConfig {
        from: Coord { x: 8.3, y: 47.3 },
        to: None,
        corridor_nmi: 0.0,
        data_dir: dir.path().clone(),
    };
    let output = execute_elevation(&point).expect("point elevation");
    assert_eq!(output["elevation_m"], 700);

    let leg = ElevationConfig {
        to: Some(Coord { x: 8.9, y: 47.3 }),
        ..point
    };
    let output = execute_elevation(&leg).expect("profile");
    let points = output["points"].as_array().expect("profile points");
    assert_eq!(points.first().expect("first point")["elevation"], 700);
    assert_eq!(points.last().expect("last point")["elevation"], 1_300);
}

#[rstest]
fn elevation_without_terrain_is_unavailable() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let config = ElevationConfig {
        from: Coord { x: 8.3, y: 47.3 },
        to: None,
        corridor_nmi: 0.0,
        data_dir: Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path"),
    };
    match execute_elevation(&config).expect_err("terrain is missing") {
        CliError::Query {
            source: QueryError::Unavailable { domain },
            ..
        } => assert_eq!(domain, Domain::Terrain),
        other => panic!("expected an unavailable query, found {other:?}"),
    }
}

#[rstest]
fn find_writes_pretty_json() {
    let dir = DataDir::with_snapshots();
    let args = FindArgs {
        pattern: Some(String::from("lszh")),
        mode: Some(Mode::Exact),
        data_dir: Some(dir.path().clone()),
        backend: Some(Backend::Snapshot),
        ..FindArgs::default()
    };
    let mut output = Vec::new();
    run_find_with(args, &mut output).expect("find should succeed");
    assert!(output.ends_with(b"\n"));
    assert_eq!(json(&output)[0]["name"], "Zurich");
}

#[rstest]
fn negative_coordinates_parse() {
    let cli = Cli::try_parse_from(["skyquery", "nearest", "--lon", "-3.5", "--lat", "40.4"])
        .expect("negative longitude should parse");
    match cli.command {
        Command::Nearest(args) => {
            assert_eq!(args.lon, Some(-3.5));
            assert_eq!(args.lat, Some(40.4));
        }
        other => panic!("expected nearest, found {other:?}"),
    }
}
