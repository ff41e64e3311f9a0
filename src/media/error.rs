//! Error taxonomy for the two backends, plus every substring heuristic
//! applied to their free-text output. Backend messages change between
//! releases, so the matching lives here and nowhere else.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("no media found")]
    NoMedia,
    #[error("unsupported url")]
    Unsupported,
    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("yt-dlp not found")]
    NotFound,
    /// One failed attempt, carrying the backend's raw error text.
    #[error("{0}")]
    Attempt(String),
    #[error("download failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GalleryError {
    #[error("gallery-dl not found")]
    NotFound,
    #[error("gallery-dl timeout")]
    Timeout,
    #[error("login required: {0}")]
    LoginRequired(String),
    #[error("{0}")]
    Exit(String),
}

/// Where a failed media item should go next, judged from the backend's
/// error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackHint {
    /// Image-only or unsupported content: hand the URL to gallery-dl.
    Gallery,
    /// The chosen format vanished: redispatch with the best selector.
    BestFormat,
    None,
}

/// Maps yt-dlp probe error text onto the probe taxonomy.
pub fn classify_probe_error(message: &str) -> ProbeError {
    let lower = message.to_lowercase();
    if lower.contains("no video") || lower.contains("there is no video") {
        ProbeError::NoMedia
    } else if lower.contains("unsupported url") {
        ProbeError::Unsupported
    } else {
        ProbeError::Unknown(message.trim().to_string())
    }
}

/// Judges a media worker's terminal failure text for reroute purposes.
pub fn fallback_hint(message: &str) -> FallbackHint {
    let lower = message.to_lowercase();
    if lower.contains("no video")
        || lower.contains("there is no video")
        || lower.contains("unsupported url")
    {
        FallbackHint::Gallery
    } else if lower.contains("requested format is not available") {
        FallbackHint::BestFormat
    } else {
        FallbackHint::None
    }
}

/// Whether gallery-dl output points at an authentication wall, meaning a
/// cookie store would help.
pub fn is_login_wall(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("redirect to login") || lower.contains("login")
}
