//! Per-session SQL practice databases
//!
//! Each visitor gets an in-memory SQLite database seeded with a small
//! e-commerce dataset (customers, orders, shipments). Submitted scripts are
//! prepared and stepped one statement at a time; only statements that return
//! rows contribute a result set. Foreign keys are not enforced, attached
//! databases are disabled and every run is interrupted once its time budget is
//! spent.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use lru::LruCache;
use rusqlite::limits::Limit;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, ErrorCode};
use serde::{Serialize, Serializer};

use crate::config::SandboxConfig;
use crate::core::metrics::{self, LIVE_SANDBOXES};
use crate::core::{DataSphereError, Result};
use crate::utils::measure;

const SEED_SQL: &str = "
CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT, city TEXT, country TEXT, phone TEXT);
CREATE TABLE orders (order_id INTEGER PRIMARY KEY, customer_id INTEGER, item TEXT, amount_mad INTEGER, status TEXT, FOREIGN KEY(customer_id) REFERENCES customers(customer_id));
CREATE TABLE shipments (shipping_id INTEGER PRIMARY KEY, order_id INTEGER, carrier TEXT, tracking_code TEXT, status TEXT, FOREIGN KEY(order_id) REFERENCES orders(order_id));

INSERT INTO customers VALUES
(1, 'Karim', 'Bennani', 'Casablanca', 'Maroc', '0661-123456'), (2, 'Sara', 'Idrissi', 'Rabat', 'Maroc', '0662-987654'),
(3, 'Omar', 'Alaoui', 'Marrakech', 'Maroc', '0670-554433'), (4, 'Fatima', 'Zohra', 'Fès', 'Maroc', '0655-223344'),
(5, 'Youssef', 'Tazi', 'Tanger', 'Maroc', '0663-112299'), (6, 'Amina', 'Chraibi', 'Casablanca', 'Maroc', '0612-334455');

INSERT INTO orders VALUES
(1, 1, 'MacBook Pro M2', 18000, 'payée'), (2, 1, 'Souris MX', 900, 'payée'),
(3, 2, 'Écran Dell', 3500, 'payée'), (4, 3, 'Sony WH-1000XM5', 2800, 'payée'),
(5, 4, 'Clavier Keychron', 1200, 'en_attente'), (6, 5, 'iPhone 14', 11000, 'payée');

INSERT INTO shipments VALUES
(1, 1, 'Amana', 'MA-882192', 'Livrée'), (2, 2, 'Amana', 'MA-882193', 'Livrée'),
(3, 3, 'Aramex', 'AR-992100', 'Livrée'), (4, 4, 'Chronopost', 'CH-112233', 'En transit');
";

/// Query shown in the editor on first visit
pub const INITIAL_QUERY: &str = "-- Bienvenue sur l'éditeur SQL DataSphere.
-- Sélectionnez les commandes livrées à Casablanca :

SELECT o.order_id, c.last_name, s.carrier, s.tracking_code
FROM orders o
JOIN customers c ON o.customer_id = c.customer_id
JOIN shipments s ON o.order_id = s.order_id
WHERE c.city = 'Casablanca' AND s.status = 'Livrée';";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Example {
    pub label: &'static str,
    pub query: &'static str,
}

pub const EXAMPLES: [Example; 6] = [
    Example {
        label: "1. SELECT Basique",
        query: "SELECT first_name, last_name, city, phone \nFROM customers \nWHERE city = 'Rabat';",
    },
    Example {
        label: "2. Filtrage (WHERE)",
        query: "SELECT * \nFROM orders \nWHERE amount_mad > 5000 AND status = 'payée';",
    },
    Example {
        label: "3. Jointure (JOIN)",
        query: "SELECT c.last_name, o.item, o.amount_mad \nFROM customers c \nJOIN orders o ON c.customer_id = o.customer_id \nORDER BY o.amount_mad DESC;",
    },
    Example {
        label: "4. Agrégation (GROUP BY)",
        query: "SELECT city, COUNT(*) as client_count \nFROM customers \nGROUP BY city;",
    },
    Example {
        label: "5. Filtre Groupe (HAVING)",
        query: "SELECT city, COUNT(*) as total \nFROM customers \nGROUP BY city \nHAVING total > 1;",
    },
    Example {
        label: "6. Top 3 Dépenses",
        query: "SELECT item, amount_mad \nFROM orders \nORDER BY amount_mad DESC \nLIMIT 3;",
    },
];

pub const MSG_NO_RESULT: &str = "Aucun résultat.";
pub const MSG_SUCCESS: &str = "Requête exécutée avec succès.";
pub const MSG_RESET: &str = "Base de données réinitialisée.";

/// Statements refused before they are stepped
const BLOCKED_KEYWORDS: [&str; 1] = ["VACUUM"];

/// One cell of a result set
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(t) => write!(f, "{}", t),
            CellValue::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Real(r) => serializer.serialize_f64(*r),
            CellValue::Text(t) => serializer.serialize_str(t),
            CellValue::Blob(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub values: Vec<Vec<CellValue>>,
    /// Rows past the configured limit were dropped
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Outcome of one run, as shown in the results pane
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    pub results: Vec<ResultSet>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub schema_changed: bool,
    pub elapsed_ms: f64,
}

impl ExecOutcome {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// First keyword of a statement, skipping leading comments
fn leading_keyword(statement: &str) -> String {
    let mut rest = statement.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

enum StatementError {
    Engine(String),
    Rejected(String),
    Timeout,
}

impl From<rusqlite::Error> for StatementError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted => {
                StatementError::Timeout
            }
            _ => StatementError::Engine(err.to_string()),
        }
    }
}

/// In-memory practice database for one visitor
pub struct SqlSandbox {
    conn: Connection,
    max_rows: usize,
    timeout: Duration,
}

impl fmt::Debug for SqlSandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSandbox")
            .field("max_rows", &self.max_rows)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SqlSandbox {
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.set_limit(Limit::SQLITE_LIMIT_ATTACHED, 0);
        conn.pragma_update(None, "foreign_keys", false)?;
        conn.execute_batch(SEED_SQL)?;

        Ok(Self {
            conn,
            max_rows: config.max_rows,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Run every statement of `sql` in order. The first failure aborts the run
    /// and is reported with the engine's own message.
    pub fn execute(&mut self, sql: &str) -> ExecOutcome {
        let deadline = Instant::now() + self.timeout;
        self.conn
            .progress_handler(1000, Some(move || Instant::now() > deadline));

        let (run, elapsed_ms) = measure(|| self.run_statements(sql));

        self.conn.progress_handler(0, None::<fn() -> bool>);

        let mut outcome = match run {
            Ok((results, returned_rows)) => {
                metrics::record_sandbox("ok");
                let mut outcome = ExecOutcome {
                    results,
                    ..Default::default()
                };
                if outcome.results.is_empty() {
                    if returned_rows {
                        outcome.message = Some(MSG_NO_RESULT.to_string());
                    } else {
                        outcome.message = Some(MSG_SUCCESS.to_string());
                        outcome.schema_changed = true;
                    }
                }
                outcome
            }
            Err(StatementError::Engine(message)) => {
                metrics::record_sandbox("error");
                ExecOutcome::failed(message)
            }
            Err(StatementError::Rejected(keyword)) => {
                metrics::record_sandbox("rejected");
                ExecOutcome::failed(format!(
                    "{} n'est pas disponible dans le bac à sable.",
                    keyword
                ))
            }
            Err(StatementError::Timeout) => {
                warn!("Sandbox run interrupted after {:?}", self.timeout);
                metrics::record_sandbox("timeout");
                ExecOutcome::failed(format!(
                    "Exécution interrompue : la requête a dépassé {} ms.",
                    self.timeout.as_millis()
                ))
            }
        };
        outcome.elapsed_ms = elapsed_ms;
        debug!("Sandbox run finished in {:.2} ms", elapsed_ms);
        outcome
    }

    /// Result sets with at least one row, and whether any statement could return rows.
    /// Statements come from the engine's own parser, one prepared statement at a time.
    fn run_statements(
        &self,
        sql: &str,
    ) -> std::result::Result<(Vec<ResultSet>, bool), StatementError> {
        let mut results = Vec::new();
        let mut returned_rows = false;
        let mut batch = Batch::new(&self.conn, sql);

        while let Some(mut stmt) = batch.next()? {
            let keyword = stmt
                .expanded_sql()
                .map(|text| leading_keyword(&text))
                .unwrap_or_default();
            if BLOCKED_KEYWORDS.contains(&keyword.as_str()) {
                return Err(StatementError::Rejected(keyword));
            }

            let column_count = stmt.column_count();
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            if column_count > 0 {
                returned_rows = true;
            }

            let mut rows = stmt.query([])?;
            let mut values = Vec::new();
            let mut truncated = false;
            while let Some(row) = rows.next()? {
                if values.len() >= self.max_rows {
                    truncated = true;
                    break;
                }
                let mut cells = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    cells.push(CellValue::from(row.get_ref(idx)?));
                }
                values.push(cells);
            }

            if !values.is_empty() {
                results.push(ResultSet {
                    columns,
                    values,
                    truncated,
                });
            }
        }

        Ok((results, returned_rows))
    }

    /// User tables in creation order with their columns
    pub fn schemas(&self) -> Result<Vec<TableSchema>> {
        let mut tables = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = tables
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut info = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1)")?;
        names
            .into_iter()
            .map(|name| {
                let columns = info
                    .query_map([&name], |row| {
                        Ok(ColumnInfo {
                            name: row.get(0)?,
                            column_type: row.get(1)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(TableSchema { name, columns })
            })
            .collect()
    }

    /// Drop every user table and view, then load the seed data again
    pub fn reset(&mut self) -> Result<ExecOutcome> {
        // a transaction left open by the visitor would keep the pragma below from applying
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.conn.pragma_update(None, "foreign_keys", false)?;

        let objects = {
            let mut stmt = self.conn.prepare(
                "SELECT type, name FROM sqlite_master
                 WHERE type IN ('view', 'table') AND name NOT LIKE 'sqlite_%'
                 ORDER BY type = 'table'",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>();
            rows?
        };

        let mut script = String::new();
        for (kind, name) in &objects {
            let kind = if kind == "view" { "VIEW" } else { "TABLE" };
            script.push_str(&format!(
                "DROP {} IF EXISTS \"{}\";\n",
                kind,
                name.replace('"', "\"\"")
            ));
        }
        script.push_str(SEED_SQL);
        self.conn.execute_batch(&script)?;

        debug!("Sandbox reset, dropped {} object(s)", objects.len());
        Ok(ExecOutcome {
            message: Some(MSG_RESET.to_string()),
            schema_changed: true,
            ..Default::default()
        })
    }
}

/// One sandbox per session, bounded by an LRU policy
pub struct SandboxPool {
    sandboxes: Mutex<LruCache<String, Arc<Mutex<SqlSandbox>>>>,
    config: SandboxConfig,
}

impl SandboxPool {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            DataSphereError::ConfigError("sandbox capacity must be at least 1".to_string())
        })?;
        info!("Sandbox pool ready for {} sessions", capacity);

        Ok(Self {
            sandboxes: Mutex::new(LruCache::new(capacity)),
            config,
        })
    }

    fn cache(&self) -> Result<MutexGuard<'_, LruCache<String, Arc<Mutex<SqlSandbox>>>>> {
        self.sandboxes
            .lock()
            .map_err(|_| DataSphereError::SandboxError("sandbox pool lock poisoned".to_string()))
    }

    /// Sandbox of `session`, created and seeded on first use
    pub fn checkout(&self, session: &str) -> Result<Arc<Mutex<SqlSandbox>>> {
        let mut cache = self.cache()?;
        if let Some(sandbox) = cache.get(session) {
            return Ok(Arc::clone(sandbox));
        }

        let sandbox = Arc::new(Mutex::new(SqlSandbox::new(&self.config)?));
        if let Some((evicted, _)) = cache.push(session.to_string(), Arc::clone(&sandbox)) {
            debug!("Dropped sandbox of idle session {}", evicted);
        }
        LIVE_SANDBOXES.set(cache.len() as i64);
        Ok(sandbox)
    }

    /// Run `f` with exclusive access to the session's sandbox
    pub fn with_sandbox<T>(
        &self,
        session: &str,
        f: impl FnOnce(&mut SqlSandbox) -> Result<T>,
    ) -> Result<T> {
        let sandbox = self.checkout(session)?;
        let mut guard = sandbox
            .lock()
            .map_err(|_| DataSphereError::SandboxError("sandbox lock poisoned".to_string()))?;
        f(&mut guard)
    }

    /// Sandboxes currently held in memory
    pub fn live_count(&self) -> usize {
        self.cache().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> SqlSandbox {
        SqlSandbox::new(&SandboxConfig::default()).unwrap()
    }

    fn count(sandbox: &mut SqlSandbox, table: &str) -> CellValue {
        let outcome = sandbox.execute(&format!("SELECT COUNT(*) FROM {}", table));
        outcome.results[0].values[0][0].clone()
    }

    #[test]
    fn test_seeded_schema() {
        let schemas = sandbox().schemas().unwrap();
        let names: Vec<&str> = schemas.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders", "shipments"]);
        assert_eq!(schemas[0].columns[0].name, "customer_id");
        assert_eq!(schemas[0].columns[0].column_type, "INTEGER");
        assert_eq!(schemas[1].columns.len(), 5);
    }

    #[test]
    fn test_initial_query() {
        let outcome = sandbox().execute(INITIAL_QUERY);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.results.len(), 1);

        let set = &outcome.results[0];
        assert_eq!(set.columns, vec!["order_id", "last_name", "carrier", "tracking_code"]);
        assert_eq!(set.values.len(), 2);
        assert_eq!(set.values[0][1], CellValue::Text("Bennani".to_string()));
    }

    #[test]
    fn test_examples_run() {
        let mut sandbox = sandbox();
        for example in EXAMPLES.iter() {
            let outcome = sandbox.execute(example.query);
            assert!(outcome.error.is_none(), "{} failed", example.label);
            assert!(!outcome.results.is_empty(), "{} returned nothing", example.label);
        }
        let top = sandbox.execute(EXAMPLES[5].query);
        assert_eq!(top.results[0].values.len(), 3);
        assert_eq!(top.results[0].values[0][1], CellValue::Integer(18000));
    }

    #[test]
    fn test_messages() {
        let mut sandbox = sandbox();

        let empty = sandbox.execute("SELECT * FROM customers WHERE city = 'Agadir'");
        assert_eq!(empty.message.as_deref(), Some(MSG_NO_RESULT));
        assert!(!empty.schema_changed);

        let ddl = sandbox.execute("CREATE TABLE notes (id INTEGER, body TEXT); INSERT INTO notes VALUES (1, 'x')");
        assert_eq!(ddl.message.as_deref(), Some(MSG_SUCCESS));
        assert!(ddl.schema_changed);

        let mixed = sandbox.execute("SELECT 1; SELECT 2 AS two");
        assert_eq!(mixed.results.len(), 2);
        assert!(mixed.message.is_none());
        assert_eq!(mixed.results[1].columns, vec!["two"]);
    }

    #[test]
    fn test_engine_error_is_verbatim() {
        let mut sandbox = sandbox();
        let outcome = sandbox.execute("SELECT 1; SELECT * FROM nope");
        assert_eq!(outcome.error.as_deref(), Some("no such table: nope"));
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut sandbox = sandbox();
        sandbox.execute("DELETE FROM customers; CREATE TABLE extra (x); CREATE VIEW v AS SELECT * FROM extra");
        assert_eq!(count(&mut sandbox, "customers"), CellValue::Integer(0));

        let outcome = sandbox.reset().unwrap();
        assert_eq!(outcome.message.as_deref(), Some(MSG_RESET));
        assert_eq!(count(&mut sandbox, "customers"), CellValue::Integer(6));
        assert_eq!(sandbox.schemas().unwrap().len(), 3);
    }

    #[test]
    fn test_parent_rows_can_be_deleted() {
        let mut sandbox = sandbox();
        let outcome = sandbox.execute("DELETE FROM customers");
        assert!(outcome.error.is_none(), "{:?}", outcome.error);

        let pragma = sandbox.execute("PRAGMA foreign_keys");
        assert_eq!(pragma.results[0].values, vec![vec![CellValue::Integer(0)]]);
    }

    #[test]
    fn test_reset_after_foreign_keys_enabled() {
        let mut sandbox = sandbox();
        sandbox.execute("PRAGMA foreign_keys = ON");
        assert!(sandbox.reset().is_ok());
        assert_eq!(count(&mut sandbox, "orders"), CellValue::Integer(6));
    }

    #[test]
    fn test_reset_inside_open_transaction() {
        let mut sandbox = sandbox();
        sandbox.execute("BEGIN; DELETE FROM shipments");
        assert!(sandbox.reset().is_ok());
        assert_eq!(count(&mut sandbox, "shipments"), CellValue::Integer(4));
    }

    #[test]
    fn test_script_parsing() {
        let mut sandbox = sandbox();
        let outcome = sandbox.execute(
            "SELECT ';' AS semi; -- note; here\nSELECT 'it''s; fine' AS quoted /* ; */;\n\n  ;-- only a comment",
        );
        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].values[0][0], CellValue::Text(";".to_string()));
        assert_eq!(outcome.results[1].values[0][0], CellValue::Text("it's; fine".to_string()));

        let blank = sandbox.execute("  -- nothing\n");
        assert!(blank.error.is_none());
        assert!(blank.results.is_empty());
    }

    #[test]
    fn test_trigger_bodies_run() {
        let mut sandbox = sandbox();
        let outcome = sandbox.execute(
            "CREATE TABLE log (x);
             CREATE TRIGGER t AFTER INSERT ON customers BEGIN INSERT INTO log VALUES (new.customer_id); END;
             INSERT INTO customers VALUES (7, 'Nadia', 'Berrada', 'Agadir', 'Maroc', '0600-000000');
             SELECT COUNT(*) FROM log;",
        );
        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(outcome.results[0].values[0][0], CellValue::Integer(1));
    }

    #[test]
    fn test_row_limit() {
        let mut sandbox = SqlSandbox::new(&SandboxConfig {
            max_rows: 2,
            ..Default::default()
        })
        .unwrap();
        let outcome = sandbox.execute("SELECT * FROM customers");
        assert_eq!(outcome.results[0].values.len(), 2);
        assert!(outcome.results[0].truncated);
    }

    #[test]
    fn test_timeout_interrupts_run() {
        let mut sandbox = SqlSandbox::new(&SandboxConfig {
            timeout_ms: 50,
            ..Default::default()
        })
        .unwrap();
        let outcome = sandbox.execute(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT COUNT(*) FROM c",
        );
        assert!(outcome.error.unwrap().contains("50 ms"));

        // the handler is removed after the run
        assert!(sandbox.execute("SELECT 1").error.is_none());
    }

    #[test]
    fn test_escape_hatches_are_closed() {
        let mut sandbox = sandbox();
        assert!(sandbox.execute("ATTACH DATABASE ':memory:' AS other").error.is_some());
        let vacuum = sandbox.execute("/* sneaky */ vacuum INTO '/tmp/copy.db'");
        assert!(vacuum.error.unwrap().starts_with("VACUUM"));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Null.to_string(), "NULL");
        assert_eq!(CellValue::Blob(vec![0xca, 0xfe]).to_string(), "x'cafe'");
        assert_eq!(serde_json::to_string(&CellValue::Null).unwrap(), "null");
    }

    #[test]
    fn test_pool_evicts_least_recently_used() {
        let pool = SandboxPool::new(SandboxConfig {
            capacity: 2,
            ..Default::default()
        })
        .unwrap();

        pool.with_sandbox("a", |s| Ok(s.execute("DELETE FROM orders"))).unwrap();
        pool.checkout("b").unwrap();
        pool.checkout("c").unwrap();
        assert_eq!(pool.live_count(), 2);

        // "a" was dropped, so it comes back freshly seeded
        let orders = pool
            .with_sandbox("a", |s| Ok(count(s, "orders")))
            .unwrap();
        assert_eq!(orders, CellValue::Integer(6));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = SandboxPool::new(SandboxConfig {
            capacity: 0,
            ..Default::default()
        })
        .err()
        .unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
