use crate::domain::ports::ArtifactSource;
use crate::utils::error::{FetchError, InstallError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

/// Name of the downloaded snapshot inside the destination directory.
pub const ARCHIVE_FILE: &str = "repo.zip";

const STAGING_DIR: &str = ".sin-unpack";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bounds on what a downloaded snapshot may expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_download_bytes: u64,
    pub max_entries: usize,
    pub max_extracted_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_download_bytes: 100 * 1024 * 1024,
            max_entries: 10_000,
            max_extracted_bytes: 500_000_000,
        }
    }
}

/// Downloads branch snapshots (`<repo>/archive/refs/heads/<branch>.zip`).
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: Client,
    limits: ArchiveLimits,
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("sin/", env!("CARGO_PKG_VERSION")))
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self::with_client(client)
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            limits: ArchiveLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ArchiveLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn archive_url(locator: &str, branch: &str) -> String {
        format!(
            "{}/archive/refs/heads/{}.zip",
            locator.trim_end_matches('/'),
            branch
        )
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let mut response = self.client.get(url).send().await?;
        tracing::debug!("Artifact response status: {}", response.status());

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let limit = self.limits.max_download_bytes;
        if let Some(size) = response.content_length().filter(|len| *len > limit) {
            return Err(FetchError::TooLarge { size, limit });
        }

        let capacity = usize::try_from(response.content_length().unwrap_or(0).min(limit)).unwrap_or(0);
        let mut bytes = Vec::with_capacity(capacity);
        while let Some(chunk) = response.chunk().await? {
            bytes.extend_from_slice(&chunk);
            let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
            if size > limit {
                return Err(FetchError::TooLarge { size, limit });
            }
        }

        Ok(bytes)
    }
}

#[async_trait]
impl ArtifactSource for ArchiveFetcher {
    async fn fetch(
        &self,
        locator: &str,
        branch: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = Self::archive_url(locator, branch);
        tracing::info!(url = %url, destination = %destination.display(), "Downloading service configuration");

        reset_directory(destination)
            .await
            .map_err(|e| InstallError::fetch(locator, e))?;

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InstallError::Cancelled),
            bytes = self.download(&url) => bytes.map_err(|e| InstallError::fetch(locator, e))?,
        };

        let archive_path = destination.join(ARCHIVE_FILE);
        tracing::debug!("Writing archive ({} bytes) to {}", bytes.len(), archive_path.display());
        tokio::fs::write(&archive_path, &bytes)
            .await
            .map_err(|e| InstallError::fetch(locator, e))?;

        let dest = destination.to_path_buf();
        let limits = self.limits;
        tokio::task::spawn_blocking(move || unpack_archive(&archive_path, &dest, &limits))
            .await
            .map_err(|e| InstallError::fetch(locator, e))?
            .map_err(|e| InstallError::fetch(locator, e))?;

        tracing::debug!("Artifact unpacked into {}", destination.display());
        Ok(())
    }
}

async fn reset_directory(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
        Ok(_) => tokio::fs::remove_file(path).await?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(path).await
}

/// Extract `archive_path` into `dest`, delete it, and strip the wrapper directory.
fn unpack_archive(
    archive_path: &Path,
    dest: &Path,
    limits: &ArchiveLimits,
) -> std::result::Result<(), FetchError> {
    {
        let file = fs::File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)?;
        check_archive(&mut archive, limits)?;
        archive.extract(dest)?;
    }
    fs::remove_file(archive_path)?;
    flatten_wrapper(dest)?;
    Ok(())
}

/// Reject archives whose entry count or declared uncompressed size is over the limits.
fn check_archive<R: io::Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    limits: &ArchiveLimits,
) -> std::result::Result<(), FetchError> {
    if archive.len() > limits.max_entries {
        return Err(FetchError::TooManyEntries {
            count: archive.len(),
            limit: limits.max_entries,
        });
    }

    let mut total: u64 = 0;
    for index in 0..archive.len() {
        total = total.saturating_add(archive.by_index_raw(index)?.size());
        if total > limits.max_extracted_bytes {
            return Err(FetchError::ExtractedTooLarge {
                limit: limits.max_extracted_bytes,
            });
        }
    }
    Ok(())
}

/// Move the children of a lone top-level directory up into `dest`.
/// A tree without exactly one top-level directory is already flat.
fn flatten_wrapper(dest: &Path) -> io::Result<()> {
    let entries = fs::read_dir(dest)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;

    let [wrapper] = entries.as_slice() else {
        return Ok(());
    };
    if !wrapper.is_dir() {
        return Ok(());
    }

    // 先改名，避免子項目與外層目錄同名時互相覆蓋
    let staging = dest.join(STAGING_DIR);
    fs::rename(wrapper, &staging)?;

    for item in fs::read_dir(&staging)? {
        let item = item?;
        fs::rename(item.path(), dest.join(item.file_name()))?;
    }

    fs::remove_dir(&staging)
}
