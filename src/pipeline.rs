// src/pipeline.rs

use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    config::Config,
    db::{Connector, SqlExecutor},
    error::IngestError,
    fetch::{list_csv_files, DatasetFetcher},
    load::{drop_tables, load_all},
    report::RunReport,
};

/// One full ingestion: fetch the dataset, check the database, drop every
/// target table, then load each CSV in file-name order.
///
/// The connection is closed on every path once it has been opened.
#[instrument(level = "info", skip_all, fields(dataset = %config.dataset))]
pub async fn run<F, C>(config: &Config, fetcher: &F, connector: &C) -> Result<RunReport, IngestError>
where
    F: DatasetFetcher + ?Sized,
    C: Connector,
{
    let start = Instant::now();

    let dir = fetcher.fetch(&config.dataset).await?;
    if !dir.is_dir() {
        return Err(IngestError::DatasetUnavailable { path: dir });
    }
    info!(path = %dir.display(), "dataset available");

    let mut exec = connector
        .connect(&config.db)
        .await
        .map_err(IngestError::ConnectionFailed)?;

    let outcome = match exec.probe().await {
        Ok(()) => ingest(&mut exec, &dir).await,
        Err(e) => Err(IngestError::ConnectionFailed(e)),
    };

    if let Err(e) = exec.close().await {
        warn!(error = %e, "closing connection failed");
    }

    match &outcome {
        Ok(report) => info!(
            tables = report.tables.len(),
            total_rows = report.total_rows,
            elapsed = ?start.elapsed(),
            "run complete"
        ),
        Err(e) => warn!(error = %e, elapsed = ?start.elapsed(), "run failed"),
    }
    outcome
}

async fn ingest<E: SqlExecutor>(exec: &mut E, dir: &Path) -> Result<RunReport, IngestError> {
    let files = list_csv_files(dir)?;
    if files.is_empty() {
        return Err(IngestError::NoInputFiles);
    }
    info!(files = files.len(), "found CSV files");

    drop_tables(exec, &files).await;
    load_all(exec, &files).await
}
