// src/bin/check_download.rs
// Manual smoke test: download the dataset and list what arrived.
//
//   cargo run --bin check_download [-- --force]

use anyhow::Result;
use olist_ingest::{
    config::{default_cache_dir, DATASET_HANDLE},
    fetch::{list_csv_files, DatasetFetcher, KaggleFetcher},
};
use reqwest::Client;
use std::{env, path::PathBuf, process::ExitCode, time::Instant};

fn cache_dir() -> PathBuf {
    env::var("KAGGLEHUB_CACHE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_cache_dir(env::var("HOME").ok()))
}

async fn check(force: bool) -> Result<bool> {
    let credentials = env::var("KAGGLE_USERNAME")
        .ok()
        .zip(env::var("KAGGLE_KEY").ok());
    let fetcher = KaggleFetcher::new(Client::new(), cache_dir())?
        .with_credentials(credentials)
        .force_download(force);

    println!("Downloading dataset...");
    let start = Instant::now();
    let path = fetcher.fetch(DATASET_HANDLE).await?;
    println!(
        "✅ Download successful in {:.2} seconds",
        start.elapsed().as_secs_f64()
    );

    if !path.is_dir() {
        println!("❌ Dataset path does not exist: {}", path.display());
        return Ok(false);
    }
    println!("✅ Dataset path exists: {}", path.display());

    let files = list_csv_files(&path)?;
    println!("✅ Found {} CSV files:", files.len());
    for file in &files {
        let size_mb = std::fs::metadata(file)?.len() as f64 / (1024.0 * 1024.0);
        println!(
            "  - {}: {:.2} MB",
            file.file_name().unwrap_or_default().to_string_lossy(),
            size_mb
        );
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let force = env::args().any(|a| a == "--force");
    let rule = "=".repeat(60);

    println!("\n{}", rule);
    println!("Testing Kaggle Dataset Download");
    println!("{}", rule);
    println!("\nDataset: {}\n", DATASET_HANDLE);

    let passed = match check(force).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("❌ Download failed: {:#}", e);
            false
        }
    };

    println!("\n{}", rule);
    if passed {
        println!("✅ Download test PASSED");
    } else {
        println!("❌ Download test FAILED");
    }
    println!("{}", rule);

    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
