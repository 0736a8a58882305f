//! SQLite implementation of the engine port.
//!
//! Every session owns one `rusqlite::Connection`. Statements run on the
//! blocking thread pool so engine work never stalls the async runtime.
//! Note that each session opened on `":memory:"` is its own private
//! database; use `setup_statements` to seed it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Number, Value};
use tracing::debug;

use crate::domain::Record;
use crate::error::{PoolError, Result};
use crate::infrastructure::config::pool::EngineTuning;
use crate::port::outbound::engine::{Engine, EngineSession, OpenedSession};

const MEMORY_DATABASE: &str = ":memory:";
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Opens tuned SQLite sessions on one database.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    name: String,
    database: String,
    read_only: bool,
    tuning: EngineTuning,
}

impl SqliteEngine {
    /// Engine for `database` (a file path or `":memory:"`), labelled `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            read_only: false,
            tuning: EngineTuning::default(),
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: EngineTuning) -> Self {
        self.tuning = tuning;
        self
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        if self.database == MEMORY_DATABASE {
            Connection::open_in_memory()
        } else if self.read_only {
            Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        } else {
            Connection::open(&self.database)
        }
    }

    /// Statements applied to every new session, tuning first.
    fn setup_sequence(&self) -> Vec<String> {
        let budget_bytes = self.tuning.memory_limit_mb.saturating_mul(1024 * 1024);
        // Page cache gets a quarter of the budget, in KiB (negative = KiB).
        let cache_kib = self.tuning.memory_limit_mb.saturating_mul(1024) / 4;

        let mut statements = vec![
            format!("PRAGMA soft_heap_limit = {budget_bytes}"),
            format!("PRAGMA cache_size = -{cache_kib}"),
            format!("PRAGMA threads = {}", self.tuning.threads),
            format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"),
        ];
        if self.read_only {
            statements.push("PRAGMA query_only = ON".to_string());
        }
        statements.extend(self.tuning.setup_statements.iter().cloned());
        statements
    }

    fn open_blocking(&self) -> Result<OpenedSession> {
        let conn = self
            .connect()
            .map_err(|e| PoolError::Connect(format!("{}: {e}", self.database)))?;

        let mut warnings = Vec::new();
        for statement in self.setup_sequence() {
            if let Err(e) = conn.execute_batch(&statement) {
                warnings.push(format!("{statement}: {e}"));
            }
        }
        debug!(
            engine = %self.name,
            database = %self.database,
            warnings = warnings.len(),
            "Opened SQLite session"
        );

        Ok(OpenedSession {
            session: Box::new(SqliteSession {
                conn: Arc::new(Mutex::new(Some(conn))),
            }),
            warnings,
        })
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<OpenedSession> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.open_blocking()).await?
    }
}

/// One SQLite connection. `None` once closed.
struct SqliteSession {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteSession {
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let guard = conn.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| PoolError::Query("session is closed".into()))?;
            f(conn).map_err(|e| PoolError::Query(e.to_string()).into())
        })
        .await?
    }
}

#[async_trait]
impl EngineSession for SqliteSession {
    async fn execute(&self, sql: &str, params: &BTreeMap<String, Value>) -> Result<Vec<Record>> {
        let sql = sql.to_string();
        let params = params.clone();
        self.with_connection(move |conn| run_query(conn, &sql, &params))
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let Some(conn) = conn.lock().take() else {
                return Ok(());
            };
            conn.close()
                .map_err(|(_, e)| PoolError::Query(format!("close failed: {e}")).into())
        })
        .await?
    }
}

fn run_query(
    conn: &Connection,
    sql: &str,
    params: &BTreeMap<String, Value>,
) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;

    let names: Vec<Option<String>> = (1..=stmt.parameter_count())
        .map(|index| stmt.parameter_name(index).map(str::to_string))
        .collect();
    for (offset, name) in names.into_iter().enumerate() {
        let index = offset + 1;
        // Named parameters drop their sigil; positional ones use "1", "2", ...
        let key = match &name {
            Some(name) => name.trim_start_matches(&[':', '@', '$'][..]).to_string(),
            None => index.to_string(),
        };
        let value = params
            .get(&key)
            .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.unwrap_or(key.clone())))?;
        stmt.raw_bind_parameter(index, to_sql(value))?;
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (index, column) in columns.iter().enumerate() {
            record.insert(column.clone(), to_json(row.get_ref(index)?));
        }
        records.push(record);
    }
    Ok(records)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn seeded(statements: &[&str]) -> SqliteEngine {
        let tuning = EngineTuning {
            memory_limit_mb: 64,
            threads: 1,
            setup_statements: statements.iter().map(|s| (*s).to_string()).collect(),
        };
        SqliteEngine::new("census_db", MEMORY_DATABASE).with_tuning(tuning)
    }

    fn counties() -> SqliteEngine {
        seeded(&[
            "CREATE TABLE county_population (county TEXT, state TEXT, population INTEGER, median_income REAL)",
            "INSERT INTO county_population VALUES ('Travis', 'TX', 1290188, 85043.5), ('Harris', 'TX', 4731145, 63022.0)",
        ])
    }

    #[tokio::test]
    async fn runs_query_with_named_parameters() {
        let opened = counties().open().await.unwrap();
        assert!(opened.warnings.is_empty(), "{:?}", opened.warnings);

        let mut params = BTreeMap::new();
        params.insert("state".to_string(), json!("TX"));
        params.insert("min".to_string(), json!(2_000_000));
        let rows = opened
            .session
            .execute(
                "SELECT county, population, median_income FROM county_population \
                 WHERE state = :state AND population > @min",
                &params,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["county"], json!("Harris"));
        assert_eq!(rows[0]["population"], json!(4_731_145));
        assert_eq!(rows[0]["median_income"], json!(63022.0));
    }

    #[tokio::test]
    async fn positional_parameters_bind_by_index() {
        let opened = counties().open().await.unwrap();
        let mut params = BTreeMap::new();
        params.insert("1".to_string(), json!("Travis"));
        let rows = opened
            .session
            .execute("SELECT state FROM county_population WHERE county = ?", &params)
            .await
            .unwrap();
        assert_eq!(rows[0]["state"], json!("TX"));
    }

    #[tokio::test]
    async fn missing_parameter_is_a_query_error() {
        let opened = counties().open().await.unwrap();
        let err = opened
            .session
            .execute("SELECT * FROM county_population WHERE state = :state", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Pool(PoolError::Query(_))), "{err:?}");
    }

    #[tokio::test]
    async fn failed_setup_statement_becomes_warning() {
        let opened = seeded(&["CREATE TABLE t (x INTEGER)", "CREATE TABLE t (x INTEGER)"])
            .open()
            .await
            .unwrap();
        assert_eq!(opened.warnings.len(), 1);
        assert!(opened.warnings[0].contains("CREATE TABLE t"));
        opened.session.ping().await.unwrap();
    }

    #[tokio::test]
    async fn engine_errors_surface_as_query_errors() {
        let opened = counties().open().await.unwrap();
        let err = opened
            .session
            .execute("SELEC nonsense", &BTreeMap::new())
            .await
            .unwrap_err();
        match err {
            Error::Pool(PoolError::Query(msg)) => assert!(msg.contains("syntax error"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_session_rejects_work() {
        let opened = counties().open().await.unwrap();
        opened.session.close().await.unwrap();
        opened.session.close().await.unwrap();
        assert!(opened.session.ping().await.is_err());
    }

    #[tokio::test]
    async fn read_only_file_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
                .unwrap();
        }

        let engine = SqliteEngine::new("census_db", path.to_string_lossy()).read_only(true);
        let opened = engine.open().await.unwrap();
        let rows = opened.session.execute("SELECT x FROM t", &BTreeMap::new()).await.unwrap();
        assert_eq!(rows[0]["x"], json!(1));

        let err = opened
            .session
            .execute("INSERT INTO t VALUES (2)", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Pool(PoolError::Query(_))));
    }

    #[tokio::test]
    async fn missing_read_only_file_fails_to_open() {
        let engine = SqliteEngine::new("census_db", "/nonexistent/census.db").read_only(true);
        let err = engine.open().await.err().unwrap();
        assert!(matches!(err, Error::Pool(PoolError::Connect(_))), "{err:?}");
    }

    #[test]
    fn json_conversion_covers_sqlite_types() {
        assert_eq!(to_json(ValueRef::Null), Value::Null);
        assert_eq!(to_json(ValueRef::Integer(7)), json!(7));
        assert_eq!(to_json(ValueRef::Text(b"Travis")), json!("Travis"));
        assert_eq!(to_json(ValueRef::Blob(&[0xde, 0xad])), json!("dead"));
        assert_eq!(to_json(ValueRef::Real(f64::NAN)), Value::Null);
        assert!(matches!(to_sql(&json!(true)), SqlValue::Integer(1)));
        assert!(matches!(to_sql(&json!(1.5)), SqlValue::Real(_)));
    }
}
