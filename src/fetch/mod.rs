// src/fetch/mod.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use glob::{glob, Pattern};
use reqwest::Client;
use std::path::{Path, PathBuf};

use crate::config::{Config, DatasetSource};

pub mod kaggle;

pub use kaggle::KaggleFetcher;

/// Materialises a dataset on local disk and returns its directory.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(&self, handle: &str) -> Result<PathBuf>;
}

/// A dataset that is already extracted somewhere on disk.
#[derive(Debug, Clone)]
pub struct LocalDataset(pub PathBuf);

#[async_trait]
impl DatasetFetcher for LocalDataset {
    async fn fetch(&self, _handle: &str) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

/// Pick the fetcher for the configured dataset source.
pub fn from_config(config: &Config, client: &Client) -> Result<Box<dyn DatasetFetcher>> {
    let fetcher: Box<dyn DatasetFetcher> = match &config.source {
        DatasetSource::Local(dir) => Box::new(LocalDataset(dir.clone())),
        DatasetSource::Kaggle {
            cache_dir,
            credentials,
        } => Box::new(
            KaggleFetcher::new(client.clone(), cache_dir.clone())?
                .with_credentials(credentials.clone()),
        ),
    };
    Ok(fetcher)
}

/// Top-level `*.csv` files in `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for dataset directory")? {
        let path = entry.context("reading dataset directory entry")?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
