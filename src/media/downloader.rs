use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::events::EventSender;

use super::error::{GalleryError, MediaError, ProbeError};
use super::types::{DownloadRequest, ProbeResult};

/// The video/audio backend. `fetch` is a single attempt; the retry policy
/// lives in the worker driving it.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &'static str;

    /// Metadata-only inspection; must not write media bytes to disk.
    async fn probe(&self, url: &str, cookies: Option<&Path>) -> Result<ProbeResult, ProbeError>;

    /// One download attempt, emitting progress events while it runs.
    async fn fetch(
        &self,
        request: &DownloadRequest,
        events: &EventSender,
    ) -> Result<(), MediaError>;
}

/// The image/gallery backend. Single-shot: the worker never retries it.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &'static str;

    /// Fetches everything behind `url` into `out_dir`, bounded by `timeout`.
    /// Returns the backend's textual output on success.
    async fn fetch(
        &self,
        url: &str,
        out_dir: &Path,
        cookies: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, GalleryError>;
}
