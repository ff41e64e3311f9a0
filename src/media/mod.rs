mod downloader;
mod error;
mod gallery_dl;
mod probe;
mod types;
mod ytdlp;

pub use downloader::{GalleryBackend, MediaBackend};
pub use error::{
    classify_probe_error, fallback_hint, FallbackHint, GalleryError, MediaError, ProbeError,
};
pub use gallery_dl::{GalleryDl, DEFAULT_GALLERY_TIMEOUT};
pub use probe::{classify, Route};
pub use types::{
    CodecKind, DownloadRequest, EncodingOption, FormatFallback, ProbeResult, ProgressSample,
    TimeRange, WorkerOutcome, DEFAULT_RETRIES,
};
pub use ytdlp::{run_media_worker, YtDlp};

use std::time::Duration;

use anyhow::{Context, Result};

const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(12);

/// Fetches a probed thumbnail URL into memory.
pub async fn fetch_thumbnail(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(THUMBNAIL_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to fetch thumbnail")?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to fetch thumbnail: HTTP {}", response.status());
    }

    Ok(response
        .bytes()
        .await
        .context("Failed to read thumbnail data")?
        .to_vec())
}
