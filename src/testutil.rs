// In-memory stand-ins for the database and the dataset catalog.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    config::DbConfig,
    db::{Connector, SqlExecutor},
    fetch::DatasetFetcher,
};

pub fn write_csv(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    Ok(path)
}

#[derive(Default)]
struct State {
    statements: Vec<String>,
    tables: BTreeMap<String, usize>,
    snapshot: Option<BTreeMap<String, usize>>,
    connects: usize,
    closes: usize,
}

/// Records every statement and tracks table row counts, with just enough
/// transaction support for BEGIN/COMMIT/ROLLBACK.
#[derive(Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<State>>,
    fail_on: Option<String>,
    refuse_connect: bool,
    fail_probe: bool,
}

impl FakeDb {
    /// Any statement containing `pattern` errors.
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn refusing_connections() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    pub fn failing_probe() -> Self {
        Self {
            fail_probe: true,
            ..Self::default()
        }
    }

    pub fn executor(&self) -> FakeExecutor {
        FakeExecutor { db: self.clone() }
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn tables(&self) -> BTreeMap<String, usize> {
        self.state.lock().unwrap().tables.clone()
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.state.lock().unwrap().tables.get(table).copied()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Number of row tuples in a multi-row INSERT.
    pub fn rows_in(insert: &str) -> usize {
        insert.matches("), (").count() + 1
    }

    fn first_ident(sql: &str) -> String {
        let mut parts = sql.split('"');
        parts.next();
        parts.next().unwrap_or_default().to_string()
    }

    fn apply(&self, sql: &str) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;
        st.statements.push(sql.to_string());

        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                bail!("injected failure on `{}`", pattern);
            }
        }
        if self.fail_probe && sql == "SELECT 1" {
            bail!("password authentication failed for user \"loader\"");
        }

        match sql {
            "BEGIN" => st.snapshot = Some(st.tables.clone()),
            "COMMIT" => st.snapshot = None,
            "ROLLBACK" => {
                if let Some(snap) = st.snapshot.take() {
                    st.tables = snap;
                }
            }
            "SELECT 1" => {}
            s if s.starts_with("DROP TABLE IF EXISTS") => {
                st.tables.remove(&Self::first_ident(s));
            }
            s if s.starts_with("CREATE TABLE") => {
                let table = Self::first_ident(s);
                if st.tables.contains_key(&table) {
                    bail!("relation \"{}\" already exists", table);
                }
                st.tables.insert(table, 0);
            }
            s if s.starts_with("INSERT INTO") => {
                let table = Self::first_ident(s);
                match st.tables.get_mut(&table) {
                    Some(rows) => *rows += Self::rows_in(s),
                    None => bail!("relation \"{}\" does not exist", table),
                }
            }
            other => bail!("unsupported statement: {}", other),
        }
        Ok(())
    }
}

pub struct FakeExecutor {
    db: FakeDb,
}

#[async_trait]
impl SqlExecutor for FakeExecutor {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.db.apply(sql)
    }

    async fn close(self) -> Result<()> {
        self.db.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl Connector for FakeDb {
    type Executor = FakeExecutor;

    async fn connect(&self, _cfg: &DbConfig) -> Result<FakeExecutor> {
        self.state.lock().unwrap().connects += 1;
        if self.refuse_connect {
            bail!("connection refused");
        }
        Ok(self.executor())
    }
}

/// Hands out a fixed directory and counts how often it was asked.
pub struct FakeFetcher {
    dir: PathBuf,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl DatasetFetcher for FakeFetcher {
    async fn fetch(&self, _handle: &str) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.dir.clone())
    }
}
