//! SQLite-backed record store.
//!
//! Each domain lives in its own table. Searchable columns (key, name and the
//! envelope) are stored alongside a JSON body holding the full record.

use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use geo::{Coord, Rect};
use rusqlite::{Connection, OpenFlags, Params, params};

use crate::{Interrupter, MatchMode, Record, StoreError, TextQuery};

use super::{RecordStore, nearest_first};

/// Record store persisted in an SQLite database.
pub struct SqliteStore<R> {
    connection: Connection,
    path: Option<PathBuf>,
    read_only: bool,
    record: PhantomData<fn() -> R>,
}

impl<R: Record> fmt::Debug for SqliteStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("domain", &R::DOMAIN)
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl<R: Record> SqliteStore<R> {
    /// Open or create a writable database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(connection, Some(path.to_path_buf()), false)
    }

    /// Open an existing database without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| StoreError::OpenDatabase {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection, Some(path.to_path_buf()), true)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        Self::with_connection(connection, None, false)
    }

    fn with_connection(
        connection: Connection,
        path: Option<PathBuf>,
        read_only: bool,
    ) -> Result<Self, StoreError> {
        if !read_only {
            let table = R::DOMAIN.as_str();
            connection.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    key TEXT NOT NULL,
                    name TEXT NOT NULL,
                    min_lon REAL NOT NULL,
                    min_lat REAL NOT NULL,
                    max_lon REAL NOT NULL,
                    max_lat REAL NOT NULL,
                    body TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS {table}_key ON {table} (key);
                CREATE INDEX IF NOT EXISTS {table}_name ON {table} (name);"
            ))?;
        }
        log::debug!(
            "opened {} store at {}",
            R::DOMAIN,
            path.as_deref()
                .map_or_else(|| String::from(":memory:"), |p| p.display().to_string())
        );
        Ok(Self {
            connection,
            path,
            read_only,
            record: PhantomData,
        })
    }

    fn query_records<P: Params>(&self, sql: &str, params: P) -> Result<Vec<R>, StoreError> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(StoreError::from_sqlite)?;
        let mut rows = statement.query(params).map_err(StoreError::from_sqlite)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::from_sqlite)? {
            let id: i64 = row.get(0)?;
            let body: String = row.get(1)?;
            records.push(decode_record(id, &body)?);
        }
        Ok(records)
    }

    fn query_text(&self, columns: &[&str], order: &str, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        let table = R::DOMAIN.as_str();
        let (operator, pattern) = text_operator(query);
        let filter = columns
            .iter()
            .map(|column| format!("{column} {operator}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT id, body FROM {table} WHERE {filter} ORDER BY {order}, id LIMIT ?2 OFFSET ?3"
        );
        self.query_records(
            &sql,
            params![pattern, sql_limit(query.limit), sql_count(query.skip)],
        )
    }

    fn region_records(&self, region: &Rect<f64>, limit: Option<usize>) -> Result<Vec<R>, StoreError> {
        let table = R::DOMAIN.as_str();
        let sql = format!(
            "SELECT id, body FROM {table}
             WHERE max_lon >= ?1 AND min_lon <= ?2 AND max_lat >= ?3 AND min_lat <= ?4
             ORDER BY id LIMIT ?5"
        );
        self.query_records(
            &sql,
            params![
                region.min().x,
                region.max().x,
                region.min().y,
                region.max().y,
                sql_limit(limit)
            ],
        )
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        let table = R::DOMAIN.as_str();
        let max: i64 = self.connection.query_row(
            &format!("SELECT COALESCE(MAX(id), 0) FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        let max = u64::try_from(max).unwrap_or(0);
        max.checked_add(1)
            .ok_or(StoreError::IdOutOfRange { id: max })
    }
}

fn decode_record<R: Record>(id: i64, body: &str) -> Result<R, StoreError> {
    let id = u64::try_from(id).map_err(|_| StoreError::IdOutOfRange { id: 0 })?;
    let mut record: R = serde_json::from_str(body).map_err(|source| StoreError::InvalidRecord {
        domain: R::DOMAIN,
        id,
        source,
    })?;
    record.set_id(id);
    Ok(record)
}

/// SQL comparison for `?1` and the bound pattern.
fn text_operator(query: &TextQuery) -> (&'static str, String) {
    match query.mode {
        MatchMode::Exact => ("= ?1 COLLATE NOCASE", query.pattern.clone()),
        MatchMode::ExactCaseSensitive => ("= ?1", query.pattern.clone()),
        MatchMode::StartsWith => (
            "LIKE ?1 ESCAPE '\\'",
            format!("{}%", escape_like(&query.pattern)),
        ),
        MatchMode::Contains => (
            "LIKE ?1 ESCAPE '\\'",
            format!("%{}%", escape_like(&query.pattern)),
        ),
    }
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// SQLite treats a negative `LIMIT` as unbounded.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, sql_count)
}

fn sql_count(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl<R: Record> RecordStore<R> for SqliteStore<R> {
    fn find_by_key(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.query_text(&["key"], "key", query)
    }

    fn find_by_name(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.query_text(&["name"], "name", query)
    }

    fn find_by_text(&self, query: &TextQuery) -> Result<Vec<R>, StoreError> {
        self.query_text(&["key", "name"], "key", query)
    }

    fn find_by_region(
        &self,
        region: &Rect<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        self.region_records(region, limit)
    }

    fn find_nearest(
        &self,
        point: Coord<f64>,
        within: Option<&Rect<f64>>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        let candidates = match within {
            Some(region) => self.region_records(region, None)?,
            None => {
                let table = R::DOMAIN.as_str();
                self.query_records(&format!("SELECT id, body FROM {table} ORDER BY id"), [])?
            }
        };
        Ok(nearest_first::<R, _>(point, candidates, limit))
    }

    fn save(&mut self, mut record: R) -> Result<R, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly { domain: R::DOMAIN });
        }
        let id = match record.id() {
            Some(id) => id,
            None => self.next_id()?,
        };
        let row_id = i64::try_from(id).map_err(|_| StoreError::IdOutOfRange { id })?;
        record.set_id(id);
        let body = serde_json::to_string(&record).map_err(|source| StoreError::EncodeRecord {
            domain: R::DOMAIN,
            source,
        })?;
        let envelope = record.envelope();
        let table = R::DOMAIN.as_str();
        let transaction = self.connection.transaction()?;
        transaction.execute(
            &format!(
                "INSERT OR REPLACE INTO {table}
                 (id, key, name, min_lon, min_lat, max_lon, max_lat, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                row_id,
                record.key(),
                record.name(),
                envelope.min().x,
                envelope.min().y,
                envelope.max().x,
                envelope.max().y,
                body
            ],
        )?;
        transaction.commit()?;
        Ok(record)
    }

    fn interrupter(&self) -> Interrupter {
        let handle = self.connection.get_interrupt_handle();
        Interrupter::new(move || handle.interrupt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Navaid, NavaidKind};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn navaid(ident: &str, name: &str, x: f64, y: f64) -> Navaid {
        Navaid {
            id: None,
            ident: ident.into(),
            name: name.into(),
            location: Coord { x, y },
            kind: NavaidKind::VorDme,
            frequency_khz: 114_000,
            elevation_ft: 1_000,
        }
    }

    #[fixture]
    fn store() -> SqliteStore<Navaid> {
        let mut store = SqliteStore::in_memory().expect("open in-memory store");
        for navaid in [
            navaid("TRA", "Trasadingen", 8.43, 47.69),
            navaid("KLO", "Kloten", 8.55, 47.46),
            navaid("ZUE", "Zurich East", 8.76, 47.59),
            navaid("W_X", "Under_Score", 1.0, 1.0),
        ] {
            store.save(navaid).expect("save navaid");
        }
        store
    }

    fn idents(found: &[Navaid]) -> Vec<&str> {
        found.iter().map(|n| n.ident.as_str()).collect()
    }

    #[rstest]
    fn save_assigns_increasing_ids(store: SqliteStore<Navaid>) {
        let all = store
            .find_by_key(&TextQuery::new(""))
            .expect("query all");
        let mut ids: Vec<_> = all.iter().filter_map(|n| n.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[rstest]
    #[case(MatchMode::Exact, "tra", vec!["TRA"])]
    #[case(MatchMode::ExactCaseSensitive, "tra", vec![])]
    #[case(MatchMode::StartsWith, "k", vec!["KLO"])]
    #[case(MatchMode::Contains, "R", vec!["TRA"])]
    fn key_lookup_modes(
        store: SqliteStore<Navaid>,
        #[case] mode: MatchMode,
        #[case] pattern: &str,
        #[case] expected: Vec<&str>,
    ) {
        let found = store
            .find_by_key(&TextQuery::new(pattern).with_mode(mode))
            .expect("query");
        assert_eq!(idents(&found), expected);
    }

    #[rstest]
    fn like_wildcards_are_literal(store: SqliteStore<Navaid>) {
        let found = store.find_by_key(&TextQuery::new("_")).expect("query");
        assert_eq!(idents(&found), vec!["W_X"]);
    }

    #[rstest]
    fn text_lookup_matches_names(store: SqliteStore<Navaid>) {
        let found = store
            .find_by_text(&TextQuery::new("zurich"))
            .expect("query");
        assert_eq!(idents(&found), vec!["ZUE"]);
    }

    #[rstest]
    fn region_lookup_orders_by_id(store: SqliteStore<Navaid>) {
        let region = Rect::new(Coord { x: 8.0, y: 47.0 }, Coord { x: 9.0, y: 48.0 });
        let found = store.find_by_region(&region, Some(2)).expect("query");
        assert_eq!(idents(&found), vec!["TRA", "KLO"]);
    }

    #[rstest]
    fn nearest_lookup_ranks_by_distance(store: SqliteStore<Navaid>) {
        let found = store
            .find_nearest(Coord { x: 8.56, y: 47.45 }, None, Some(1))
            .expect("query");
        assert_eq!(idents(&found), vec!["KLO"]);
    }

    #[rstest]
    fn save_with_id_replaces_row(mut store: SqliteStore<Navaid>) {
        let mut klo = store
            .find_by_key(&TextQuery::exact("KLO"))
            .expect("query")
            .remove(0);
        klo.name = String::from("Kloten VOR");
        let saved = store.save(klo).expect("save");
        let reloaded = store
            .find_by_name(&TextQuery::exact("Kloten VOR"))
            .expect("query");
        assert_eq!(reloaded, vec![saved]);
    }

    #[rstest]
    fn read_only_store_refuses_saves() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("navaids.db");
        SqliteStore::<Navaid>::open(&path).expect("create database");

        let mut store = SqliteStore::<Navaid>::open_read_only(&path).expect("open read-only");
        let err = store
            .save(navaid("TRA", "Trasadingen", 8.43, 47.69))
            .expect_err("read-only");
        assert!(matches!(err, StoreError::ReadOnly { .. }));
    }

    #[rstest]
    fn corrupt_body_is_reported() {
        let store = SqliteStore::<Navaid>::in_memory().expect("open store");
        store
            .connection
            .execute(
                "INSERT INTO navaids (id, key, name, min_lon, min_lat, max_lon, max_lat, body)
                 VALUES (9, 'BAD', 'Bad', 0, 0, 0, 0, 'not-json')",
                [],
            )
            .expect("insert row");
        let err = store
            .find_by_key(&TextQuery::exact("BAD"))
            .expect_err("invalid body");
        assert!(matches!(err, StoreError::InvalidRecord { id: 9, .. }));
    }
}
