use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::events::{Event, EventSender};

use super::downloader::MediaBackend;
use super::error::{classify_probe_error, MediaError, ProbeError};
use super::probe::parse_probe_json;
use super::types::{DownloadRequest, ProbeResult, ProgressSample, WorkerOutcome};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Progress lines land on stdout as `status|percent|speed`, one per update.
const PROGRESS_TEMPLATE: &str =
    "download:%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s";

pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(_) => {
                warn!("❌ yt-dlp command failed");
                false
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaBackend for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, cookies: Option<&Path>) -> Result<ProbeResult, ProbeError> {
        debug!("probing with yt-dlp: {}", url);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--dump-json")
            .arg("--skip-download")
            .arg("--no-warnings");
        if let Some(path) = cookies {
            cmd.arg("--cookies").arg(path);
        }
        cmd.arg(url).kill_on_drop(true);

        let output = tokio::time::timeout(PROBE_TIMEOUT, cmd.output())
            .await
            .map_err(|_| ProbeError::Unknown("yt-dlp metadata probe timed out".to_string()))?
            .map_err(|e| ProbeError::Unknown(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_probe_error(&stderr));
        }

        parse_probe_json(&String::from_utf8_lossy(&output.stdout), url)
    }

    async fn fetch(
        &self,
        request: &DownloadRequest,
        events: &EventSender,
    ) -> Result<(), MediaError> {
        debug!("downloading with yt-dlp: {}", request.url);

        let mut child = Command::new(&self.program)
            .args(build_args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::NotFound
                } else {
                    MediaError::Attempt(format!("failed to spawn yt-dlp: {e}"))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Attempt("missing yt-dlp stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Attempt("missing yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| MediaError::Attempt(format!("failed to read yt-dlp output: {e}")))?
        {
            if let Some(sample) = parse_progress_line(&line) {
                let _ = events.send(Event::Progress {
                    percent: sample.percent,
                    detail: sample.detail,
                });
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| MediaError::Attempt(format!("failed to wait for yt-dlp: {e}")))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            let message = stderr_text.trim();
            Err(MediaError::Attempt(if message.is_empty() {
                format!("yt-dlp failed with status {status}")
            } else {
                message.to_string()
            }))
        }
    }
}

/// Full yt-dlp argument list for one download attempt.
pub(crate) fn build_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec![
        "--output".to_string(),
        request
            .out_dir
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned(),
        "--continue".to_string(),
        "--retries".to_string(),
        "2".to_string(),
        "--concurrent-fragments".to_string(),
        "3".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "--format".to_string(),
        request.selector(),
    ];
    if let Some(cookies) = &request.cookies {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
    if let Some(proxy) = &request.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }
    if let Some(trim) = &request.trim {
        args.push("--download-sections".to_string());
        args.push(trim.section_spec());
    }
    args.push(request.url.clone());
    args
}

/// Translates one templated progress line. Non-progress output maps to None.
pub(crate) fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let mut parts = line.splitn(3, '|');
    let status = parts.next()?.trim();
    let percent_str = parts.next()?;
    let speed = parts.next().unwrap_or("");

    match status {
        "downloading" => {
            let percent = percent_str
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .unwrap_or(0.0);
            Some(ProgressSample {
                percent,
                detail: speed.trim().to_string(),
            })
        }
        "finished" => Some(ProgressSample {
            percent: 100.0,
            detail: "processing".to_string(),
        }),
        _ => None,
    }
}

/// Backoff before the next attempt: 1.5^attempt seconds, capped at 10.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs_f64(1.5_f64.powi(attempt as i32).min(10.0))
}

/// Drives the media backend through up to `request.retries` attempts with
/// exponential backoff, reporting each attempt as a status event.
pub async fn run_media_worker(
    backend: &dyn MediaBackend,
    request: &DownloadRequest,
    events: &EventSender,
) -> WorkerOutcome {
    let retries = request.retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=retries {
        let _ = events.send(Event::Status(format!(
            "Starting download (attempt {attempt})"
        )));
        match backend.fetch(request, events).await {
            Ok(()) => {
                return WorkerOutcome::Success {
                    url: request.url.clone(),
                    detail: format!("saved under {}", request.out_dir.display()),
                };
            }
            Err(MediaError::NotFound) => {
                return WorkerOutcome::Failure {
                    url: request.url.clone(),
                    error: MediaError::NotFound.to_string(),
                };
            }
            Err(err) => {
                last_error = err.to_string();
                let _ = events.send(Event::Status(format!(
                    "Error: {last_error} (retrying {attempt}/{retries})"
                )));
                if attempt < retries {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }

    WorkerOutcome::Failure {
        url: request.url.clone(),
        error: MediaError::RetriesExhausted {
            attempts: retries,
            last: last_error,
        }
        .to_string(),
    }
}
