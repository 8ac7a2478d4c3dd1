// src/server.rs

use anyhow::anyhow;
use futures::FutureExt;
use reqwest::Client;
use std::{any::Any, convert::Infallible, panic::AssertUnwindSafe, sync::Arc, time::Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use warp::{http::StatusCode, reject::Rejection, reply::Reply, Filter};

use crate::{
    config::Config,
    db::Connector,
    error::IngestError,
    fetch::{self, DatasetFetcher},
    pipeline,
    report::{respond, ResponseBody, RunReport},
};

/// Shared by every request. Runs are serialised through `runs`.
pub struct AppState<C> {
    client: Client,
    connector: C,
    runs: Semaphore,
}

impl<C: Connector> AppState<C> {
    pub fn new(client: Client, connector: C) -> Self {
        Self {
            client,
            connector,
            runs: Semaphore::new(1),
        }
    }
}

/// Run one invocation end to end and turn the outcome into a status and
/// body. Configuration has already been resolved at the boundary; if that
/// failed, nothing is fetched and no connection is attempted.
pub async fn invoke<C, M>(
    config: Result<Config, IngestError>,
    make_fetcher: M,
    connector: &C,
) -> (u16, ResponseBody)
where
    C: Connector,
    M: FnOnce(&Config) -> anyhow::Result<Box<dyn DatasetFetcher>>,
{
    let outcome = AssertUnwindSafe(invoke_inner(config, make_fetcher, connector))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(IngestError::Unexpected(anyhow!(
                "panic: {}",
                panic_message(panic.as_ref())
            )))
        });
    respond(outcome)
}

async fn invoke_inner<C, M>(
    config: Result<Config, IngestError>,
    make_fetcher: M,
    connector: &C,
) -> Result<RunReport, IngestError>
where
    C: Connector,
    M: FnOnce(&Config) -> anyhow::Result<Box<dyn DatasetFetcher>>,
{
    let config = config?;
    let fetcher = make_fetcher(&config)?;
    pipeline::run(&config, fetcher.as_ref(), connector).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown".to_string()
    }
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "olist-ingest"
    })))
}

async fn ingest<C: Connector + 'static>(state: Arc<AppState<C>>) -> Result<impl Reply, Rejection> {
    let _permit = state.runs.acquire().await.ok();
    let start = Instant::now();
    info!("ingestion triggered");

    let (status, body) = invoke(
        Config::from_env(),
        |cfg| fetch::from_config(cfg, &state.client),
        &state.connector,
    )
    .await;

    let elapsed = start.elapsed().as_secs_f64();
    if status == 200 {
        info!(status, elapsed, "✅ ingestion finished");
    } else {
        warn!(status, elapsed, "❌ ingestion failed");
    }

    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}

fn with_state<C: Connector + 'static>(
    state: Arc<AppState<C>>,
) -> impl Filter<Extract = (Arc<AppState<C>>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `GET /health` and the ingestion trigger on `/` (any method, body ignored).
pub fn routes<C: Connector + 'static>(
    state: Arc<AppState<C>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let trigger = warp::path::end()
        .and(with_state(state))
        .and_then(ingest::<C>);

    health.or(trigger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetSource;
    use crate::testutil::{write_csv, FakeDb, FakeFetcher};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_HOST", "127.0.0.1"),
            ("DB_NAME", "ecommerce"),
            ("DB_USER", "loader"),
            ("DB_PASSWORD", "pw"),
        ]
    }

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn health_route() {
        let state = Arc::new(AppState::new(Client::new(), FakeDb::default()));
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(state))
            .await;
        assert_eq!(resp.status(), 200);
        let v: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(v["status"], "healthy");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let db = FakeDb::default();
        let state = Arc::new(AppState::new(Client::new(), db.clone()));
        let resp = warp::test::request()
            .method("POST")
            .path("/elsewhere")
            .reply(&routes(state))
            .await;
        assert_eq!(resp.status(), 404);
        assert_eq!(db.connects(), 0);
    }

    #[tokio::test]
    async fn missing_config_has_no_side_effects() {
        let fetcher = FakeFetcher::new("/unused");
        let calls = fetcher.counter();
        let db = FakeDb::default();

        let (status, body) = invoke(
            Config::from_lookup(env(&[("DB_HOST", "h"), ("DB_NAME", "n")])),
            move |_| Ok(Box::new(fetcher) as Box<dyn DatasetFetcher>),
            &db,
        )
        .await;

        assert_eq!(status, 400);
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["status"], "error");
        assert!(v["message"]
            .as_str()
            .unwrap()
            .starts_with("Missing environment variables: DB_USER, DB_PASSWORD"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(db.connects(), 0);
    }

    #[tokio::test]
    async fn successful_invocation() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "olist_sellers_dataset.csv", "seller_id,seller_state\ns1,SP\n").unwrap();
        let fetcher = FakeFetcher::new(dir.path());
        let db = FakeDb::default();

        let (status, body) = invoke(
            Config::from_lookup(env(&full_env())),
            move |_| Ok(Box::new(fetcher) as Box<dyn DatasetFetcher>),
            &db,
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "status": "success",
                "message": "Data stored successfully",
                "total_rows": 1,
                "tables": [{"table": "sellers_table", "rows": 1, "columns": ["seller_id", "seller_state"]}]
            })
        );
    }

    #[tokio::test]
    async fn file_failure_is_server_error_with_details() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "a.csv", "x\n1\n").unwrap();
        write_csv(dir.path(), "b.csv", "").unwrap();
        let fetcher = FakeFetcher::new(dir.path());
        let db = FakeDb::default();

        let (status, body) = invoke(
            Config::from_lookup(env(&full_env())),
            move |_| Ok(Box::new(fetcher) as Box<dyn DatasetFetcher>),
            &db,
        )
        .await;

        assert_eq!(status, 500);
        let v = serde_json::to_value(&body).unwrap();
        assert!(v["message"].as_str().unwrap().starts_with("Failed to process b.csv: "));
        assert!(v["details"].as_str().unwrap().contains("No columns to parse"));
        assert_eq!(db.row_count("a_table"), Some(1));
    }

    #[tokio::test]
    async fn fetcher_construction_failure_is_unexpected() {
        let db = FakeDb::default();
        let (status, body) = invoke(
            Config::from_lookup(env(&full_env())),
            |_| Err(anyhow!("cache directory unusable")),
            &db,
        )
        .await;
        assert_eq!(status, 500);
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["message"], "Failed: cache directory unusable");
    }

    #[tokio::test]
    async fn panics_become_unexpected_errors() {
        let db = FakeDb::default();
        let (status, body) = invoke(
            Config::from_lookup(env(&full_env())),
            |_| panic!("fetcher exploded"),
            &db,
        )
        .await;
        assert_eq!(status, 500);
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["message"], "Failed: panic: fetcher exploded");
    }

    #[test]
    fn local_source_selects_local_fetcher() {
        let mut pairs = full_env();
        pairs.push(("DATASET_DIR", "/data/olist"));
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(cfg.source, DatasetSource::Local("/data/olist".into()));
        assert!(fetch::from_config(&cfg, &Client::new()).is_ok());
    }
}
