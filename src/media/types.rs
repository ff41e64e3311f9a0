use std::path::PathBuf;

use crate::utils::friendly_size;

pub const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Video,
    Audio,
    None,
}

/// One selectable format reported by the media backend.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingOption {
    pub format_id: String,
    pub height: Option<u32>,
    pub audio_bitrate: Option<u32>,
    pub container: String,
    pub size: Option<u64>,
    pub codec: CodecKind,
    pub note: Option<String>,
}

impl EncodingOption {
    /// Human-facing label, e.g. `720p [mp4] (12.3MB)` or
    /// `audio 128kbps [m4a] (3.2MB)`.
    pub fn label(&self) -> String {
        match self.codec {
            CodecKind::Video => format!(
                "{}p [{}] ({})",
                self.height.map(|h| h.to_string()).unwrap_or_default(),
                self.container,
                friendly_size(self.size)
            ),
            CodecKind::Audio => format!(
                "audio {}kbps [{}] ({})",
                self.audio_bitrate.map(|b| b.to_string()).unwrap_or_default(),
                self.container,
                friendly_size(self.size)
            ),
            CodecKind::None => self.note.clone().unwrap_or_else(|| self.container.clone()),
        }
    }
}

/// Metadata-only view of a URL, no payload bytes involved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub encodings: Vec<EncodingOption>,
}

impl ProbeResult {
    pub fn has_playable_encoding(&self) -> bool {
        self.encodings
            .iter()
            .any(|option| option.codec != CodecKind::None)
    }
}

/// Trim window passed through to the media backend. Only exists when the
/// two offsets differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    start: String,
    end: String,
}

impl TimeRange {
    pub fn new(start: &str, end: &str) -> Option<Self> {
        let start = start.trim();
        let end = end.trim();
        if start.is_empty() || end.is_empty() || start == end {
            return None;
        }
        Some(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// yt-dlp `--download-sections` spec for this window.
    pub fn section_spec(&self) -> String {
        format!("*{}-{}", self.start, self.end)
    }
}

/// What to do when an explicitly requested format is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatFallback {
    /// Redispatch once with the best-quality selector (notifying first).
    #[default]
    BestQuality,
    /// Surface the failure instead of downgrading.
    Fail,
}

/// One URL plus every option resolved for it. Built once per queue item at
/// dispatch time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub out_dir: PathBuf,
    pub cookies: Option<PathBuf>,
    pub proxy: Option<String>,
    pub format_id: Option<String>,
    pub use_best: bool,
    pub trim: Option<TimeRange>,
    pub retries: u32,
    pub format_fallback: FormatFallback,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            out_dir: out_dir.into(),
            cookies: None,
            proxy: None,
            format_id: None,
            use_best: true,
            trim: None,
            retries: DEFAULT_RETRIES,
            format_fallback: FormatFallback::default(),
        }
    }

    /// The yt-dlp format selector for this request.
    pub fn selector(&self) -> String {
        match (&self.format_id, self.use_best) {
            (Some(id), false) => id.clone(),
            _ => "bestvideo+bestaudio/best".to_string(),
        }
    }

    /// The same request with the explicit format choice relaxed to best
    /// quality, used for the implicit format-unavailable retry.
    pub fn relaxed(&self) -> Self {
        Self {
            format_id: None,
            use_best: true,
            ..self.clone()
        }
    }
}

/// Terminal result of one dispatched worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Success { url: String, detail: String },
    Failure { url: String, error: String },
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One raw progress update from the media worker. Transient; only the
/// latest sample matters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    pub percent: f64,
    pub detail: String,
}
