// src/fetch/kaggle.rs

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::Instant,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use url::Url;
use zip::ZipArchive;

use super::DatasetFetcher;

const DEFAULT_BASE_URL: &str = "https://www.kaggle.com/api/v1/datasets/download/";
const VERSION_DIR: &str = "latest";

/// Written next to a fully extracted dataset; its presence is what makes a
/// cached directory usable.
#[derive(Debug, Serialize, Deserialize)]
struct CompletionMarker {
    handle: String,
    downloaded_at: DateTime<Utc>,
    files: usize,
}

/// Downloads public datasets from the Kaggle catalog into a local cache
/// laid out as `<cache>/datasets/<owner>/<slug>/latest`.
#[derive(Debug, Clone)]
pub struct KaggleFetcher {
    client: Client,
    base_url: Url,
    cache_dir: PathBuf,
    credentials: Option<(String, String)>,
    force_download: bool,
}

impl KaggleFetcher {
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            cache_dir: cache_dir.into(),
            credentials: None,
            force_download: false,
        })
    }

    pub fn with_credentials(mut self, credentials: Option<(String, String)>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Ignore any cached copy and download again.
    pub fn force_download(mut self, force: bool) -> Self {
        self.force_download = force;
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Directory the dataset is (or will be) extracted into.
    pub fn dataset_dir(&self, handle: &str) -> Result<PathBuf> {
        let (owner, slug) = split_handle(handle)?;
        Ok(self
            .cache_dir
            .join("datasets")
            .join(owner)
            .join(slug)
            .join(VERSION_DIR))
    }

    fn marker_path(dataset_dir: &Path) -> PathBuf {
        dataset_dir.with_extension("complete")
    }

    /// Stream the archive for `handle` into `dest`.
    async fn download_archive(&self, handle: &str, dest: &Path) -> Result<u64> {
        let url = self
            .base_url
            .join(handle)
            .with_context(|| format!("building download URL for {}", handle))?;

        let mut req = self.client.get(url.clone());
        if let Some((user, key)) = &self.credentials {
            req = req.basic_auth(user, Some(key));
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("creating {}", dest.display()))?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("reading body from {}", url))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl DatasetFetcher for KaggleFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, handle: &str) -> Result<PathBuf> {
        let target = self.dataset_dir(handle)?;
        let marker = Self::marker_path(&target);

        if !self.force_download && marker.is_file() && target.is_dir() {
            info!(path = %target.display(), "using cached dataset");
            return Ok(target);
        }

        let parent = target
            .parent()
            .ok_or_else(|| anyhow!("cache path {} has no parent", target.display()))?
            .to_path_buf();
        fs::create_dir_all(&parent).with_context(|| format!("creating {}", parent.display()))?;

        let archive = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".zip")
            .tempfile_in(&parent)?
            .into_temp_path();

        let start = Instant::now();
        let bytes = self.download_archive(handle, &archive).await?;
        info!(bytes, elapsed = ?start.elapsed(), "downloaded");

        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(&parent)?;
        let files = tokio::task::spawn_blocking({
            let archive = archive.to_path_buf();
            let staging = staging.path().to_path_buf();
            move || extract_archive(&archive, &staging)
        })
        .await??;

        // Swap the freshly extracted tree into place.
        let _ = fs::remove_file(&marker);
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("removing stale {}", target.display()))?;
        }
        fs::rename(staging.path(), &target)
            .with_context(|| format!("moving extracted dataset to {}", target.display()))?;

        let stamp = CompletionMarker {
            handle: handle.to_string(),
            downloaded_at: Utc::now(),
            files,
        };
        fs::write(&marker, serde_json::to_vec_pretty(&stamp)?)
            .with_context(|| format!("writing {}", marker.display()))?;

        info!(files, path = %target.display(), "dataset ready");
        Ok(target)
    }
}

/// Extract every entry of the ZIP at `zip_path` under `dest`.
/// Returns the number of regular files written.
pub fn extract_archive(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;
    let files = archive.file_names().filter(|n| !n.ends_with('/')).count();
    archive
        .extract(dest)
        .with_context(|| format!("extracting {:?} into {:?}", zip_path, dest))?;
    debug!(files, "extracted");
    Ok(files)
}

fn split_handle(handle: &str) -> Result<(&str, &str)> {
    match handle.split('/').collect::<Vec<_>>().as_slice() {
        [owner, slug] if !owner.is_empty() && !slug.is_empty() => Ok((*owner, *slug)),
        _ => bail!("invalid dataset handle `{}`, expected `owner/slug`", handle),
    }
}
