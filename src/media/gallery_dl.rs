use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::downloader::GalleryBackend;
use super::error::{is_login_wall, GalleryError};

pub const DEFAULT_GALLERY_TIMEOUT: Duration = Duration::from_secs(90);

pub struct GalleryDl {
    program: String,
}

impl GalleryDl {
    pub fn new() -> Self {
        Self::with_program("gallery-dl")
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
                info!("✅ gallery-dl is available, version: {}", version.trim());
                true
            }
            Ok(_) => {
                warn!("❌ gallery-dl command failed");
                false
            }
            Err(e) => {
                warn!("❌ gallery-dl not found: {}", e);
                false
            }
        }
    }
}

impl Default for GalleryDl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GalleryBackend for GalleryDl {
    fn name(&self) -> &'static str {
        "gallery-dl"
    }

    async fn fetch(
        &self,
        url: &str,
        out_dir: &Path,
        cookies: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, GalleryError> {
        debug!("running gallery-dl for: {}", url);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-d").arg(out_dir).arg(url);
        if let Some(path) = cookies {
            cmd.arg("--cookies").arg(path);
        }
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => return Err(GalleryError::Timeout),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GalleryError::NotFound)
            }
            Ok(Err(e)) => return Err(GalleryError::Exit(format!("failed to run gallery-dl: {e}"))),
            Ok(Ok(output)) => output,
        };

        outcome_from_output(
            output.status.success(),
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
    }
}

/// Maps a finished gallery-dl invocation onto the reported outcome. Pure so
/// the message selection is testable without a subprocess.
pub(crate) fn outcome_from_output(
    success: bool,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<String, GalleryError> {
    if success {
        let out = stdout.trim();
        return Ok(if out.is_empty() {
            "gallery-dl succeeded".to_string()
        } else {
            out.to_string()
        });
    }

    let message = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(code) => format!("exit {code}"),
            None => "killed by signal".to_string(),
        });

    if is_login_wall(&message) {
        Err(GalleryError::LoginRequired(message))
    } else {
        Err(GalleryError::Exit(message))
    }
}
