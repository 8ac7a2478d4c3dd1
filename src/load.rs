// src/load.rs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::BATCH_SIZE,
    db::SqlExecutor,
    error::IngestError,
    naming::table_name,
    report::{RunReport, TableReport},
    source::{read_source, SourceTable},
    sql,
};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Drop every target table before anything is loaded. Failures are ignored.
#[instrument(level = "info", skip_all, fields(files = files.len()))]
pub async fn drop_tables<E: SqlExecutor>(exec: &mut E, files: &[PathBuf]) {
    for path in files {
        let table = table_name(&file_name(path));
        if let Err(e) = exec.execute(&sql::drop_table(&table)).await {
            debug!(table = %table, error = %e, "drop failed, ignoring");
        }
    }
}

/// Read one CSV and load it into its table. Drop, create and inserts share a
/// transaction, so a failed file leaves the table as it was before.
#[instrument(level = "info", skip(exec, path), fields(file = %file_name(path)))]
pub async fn load_file<E: SqlExecutor>(exec: &mut E, path: &Path) -> Result<TableReport> {
    let start = Instant::now();

    // parsing is CPU + blocking I/O
    let source = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || read_source(path)
    })
    .await??;
    let table = table_name(&source.file_name);

    exec.begin().await.context("starting transaction")?;
    match write_table(exec, &table, &source).await {
        Ok(()) => exec.commit().await.context("committing")?,
        Err(e) => {
            if let Err(rb) = exec.rollback().await {
                warn!(table = %table, error = %rb, "rollback failed");
            }
            return Err(e);
        }
    }

    info!(
        table = %table,
        rows = source.rows.len(),
        columns = source.headers.len(),
        elapsed = ?start.elapsed(),
        "loaded"
    );
    Ok(TableReport {
        table,
        rows: source.rows.len(),
        columns: source.headers,
    })
}

async fn write_table<E: SqlExecutor>(exec: &mut E, table: &str, source: &SourceTable) -> Result<()> {
    // an earlier file in this run may already own the name; the later one wins
    exec.execute(&sql::drop_table(table))
        .await
        .with_context(|| format!("replacing table {}", table))?;
    exec.execute(&sql::create_table(table, &source.headers))
        .await
        .with_context(|| format!("creating table {}", table))?;

    for (i, batch) in source.rows.chunks(BATCH_SIZE).enumerate() {
        exec.execute(&sql::insert_batch(table, &source.headers, batch))
            .await
            .with_context(|| {
                format!(
                    "inserting rows {}..{} into {}",
                    i * BATCH_SIZE,
                    i * BATCH_SIZE + batch.len(),
                    table
                )
            })?;
    }
    Ok(())
}

/// Load `files` in order, stopping at the first failure.
pub async fn load_all<E: SqlExecutor>(
    exec: &mut E,
    files: &[PathBuf],
) -> Result<RunReport, IngestError> {
    let mut report = RunReport::default();
    for path in files {
        let table = load_file(exec, path)
            .await
            .map_err(|source| IngestError::FileProcessingFailed {
                file: file_name(path),
                source,
            })?;
        report.push(table);
    }
    Ok(report)
}
