use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use tracing::warn;

use crate::batch::{BatchOptions, Orchestrator};
use crate::config::Settings;
use crate::events::{self, Event, EventReceiver};
use crate::media::{
    classify, fetch_thumbnail, FormatFallback, GalleryDl, MediaBackend, Route, TimeRange,
    WorkerOutcome, YtDlp, DEFAULT_RETRIES,
};
use crate::progress::Smoother;
use crate::utils::{is_supported_domain, normalize_url, parse_hhmmss, seconds_to_hhmmss};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect a URL without downloading anything
    Probe(ProbeArgs),
    /// Download one or more URLs, processed sequentially
    Download(DownloadArgs),
    /// Print the resolved settings document
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the resolved document to the default config location
    #[arg(long)]
    pub write: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    pub url: String,

    /// Save the thumbnail image to this path
    #[arg(long)]
    pub thumbnail: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// URLs to download, one batch item each
    pub urls: Vec<String>,

    /// Load additional URLs from a file, one per line
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Explicit format id from `probe` (disables best-quality selection)
    #[arg(long)]
    pub format: Option<String>,

    /// Trim start offset (h:mm:ss)
    #[arg(long)]
    pub start: Option<String>,

    /// Trim end offset (h:mm:ss)
    #[arg(long)]
    pub end: Option<String>,

    /// Target directory (defaults to the configured download folder)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Netscape cookies.txt for logged-in sites
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Proxy address passed to the media backend
    #[arg(long)]
    pub proxy: Option<String>,

    /// Download attempts per item for the media backend
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// gallery-dl timeout in seconds
    #[arg(long, default_value_t = 90)]
    pub gallery_timeout: u64,

    /// What to do when the requested format turns out to be unavailable
    #[arg(long, value_enum, default_value_t = FormatPolicy::Best)]
    pub on_format_missing: FormatPolicy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatPolicy {
    /// Download the best available quality instead
    Best,
    /// Report the item as failed
    Fail,
}

pub async fn probe(args: ProbeArgs, settings: &Settings) -> Result<()> {
    let url = normalize_url(&args.url);
    let backend = YtDlp::new();

    match classify(backend.probe(&url, settings.cookies.as_deref()).await) {
        Ok(Route::Media(result)) => {
            println!("{}", result.title);
            if let Some(uploader) = &result.uploader {
                println!("by {uploader}");
            }
            if let Some(duration) = result.duration {
                println!("duration {}", seconds_to_hhmmss(duration));
            }
            println!();
            for option in &result.encodings {
                println!("  {:>10}  {}", option.format_id, option.label());
            }

            if let Some(path) = &args.thumbnail {
                let Some(thumbnail_url) = &result.thumbnail else {
                    bail!("no thumbnail reported for this URL");
                };
                let bytes = fetch_thumbnail(thumbnail_url).await?;
                std::fs::write(path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("thumbnail saved to {}", path.display());
            }
        }
        Ok(Route::Gallery) => {
            println!("No video/audio encodings found; gallery-dl would handle this URL.");
        }
        Err(err) => bail!("probe failed: {err}"),
    }

    Ok(())
}

pub async fn download(args: DownloadArgs, settings: &Settings) -> Result<()> {
    let urls = collect_urls(&args)?;
    for url in &urls {
        if !is_supported_domain(url) {
            warn!("domain not in the known-supported list, trying anyway: {}", url);
        }
    }

    let trim = trim_from_args(&args)?;

    let mut options = BatchOptions::new(
        args.dir
            .clone()
            .unwrap_or_else(|| settings.download_dir.clone()),
    );
    options.cookies = args.cookies.clone().or_else(|| settings.cookies.clone());
    options.proxy = args.proxy.clone().or_else(|| settings.proxy.clone());
    options.format_id = args.format.clone();
    options.use_best = args.format.is_none();
    options.trim = trim;
    options.retries = args.retries;
    options.gallery_timeout = Duration::from_secs(args.gallery_timeout);
    options.format_fallback = match args.on_format_missing {
        FormatPolicy::Best => FormatFallback::BestQuality,
        FormatPolicy::Fail => FormatFallback::Fail,
    };

    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("Failed to create {}", options.out_dir.display()))?;

    let media = Arc::new(YtDlp::new());
    if !media.available().await {
        bail!("yt-dlp not found. Install it and make sure it is on PATH.");
    }
    let gallery = Arc::new(GalleryDl::new());
    if !gallery.available().await {
        warn!("gallery-dl not found; image and gallery posts will fail");
    }

    let (tx, rx) = events::channel();
    let orchestrator = Orchestrator::new(media, gallery, tx);
    let worker = tokio::spawn(async move {
        orchestrator.run(urls, &options).await;
    });

    render_events(rx).await;
    worker.await.context("batch task failed")?;
    Ok(())
}

pub fn show_config(args: ConfigArgs, settings: &Settings, path: Option<&Path>) -> Result<()> {
    if args.write {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => crate::config::default_config_location()
                .context("could not determine a config location")?,
        };
        settings.save(&target)?;
        println!("wrote {}", target.display());
        return Ok(());
    }

    match path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# built-in defaults (no config file found)"),
    }
    print!(
        "{}",
        toml::to_string_pretty(settings).context("Failed to serialize settings")?
    );
    Ok(())
}

fn collect_urls(args: &DownloadArgs) -> Result<Vec<String>> {
    let mut raw = args.urls.clone();
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        raw.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    let urls: Vec<String> = raw
        .iter()
        .map(|url| normalize_url(url))
        .filter(|url| !url.is_empty())
        .collect();
    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or via --file");
    }
    Ok(urls)
}

fn trim_from_args(args: &DownloadArgs) -> Result<Option<TimeRange>> {
    match (&args.start, &args.end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            if parse_hhmmss(start).is_none() || parse_hhmmss(end).is_none() {
                bail!("trim offsets must look like h:mm:ss");
            }
            Ok(TimeRange::new(start, end))
        }
        _ => bail!("--start and --end must be given together"),
    }
}

/// Renders core events to the terminal. A fixed-period ticker animates the
/// per-item percentage through the smoother, printing each whole point once.
async fn render_events(mut rx: EventReceiver) {
    let mut smoother = Smoother::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(40));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut latest_detail = String::new();
    let mut last_shown: i64 = -1;
    let mut failed = 0usize;

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(event) = maybe else { break };
                match event {
                    Event::Progress { percent, detail } => {
                        smoother.set_target(percent);
                        latest_detail = detail;
                    }
                    Event::Status(text) => println!("{text}"),
                    Event::ItemOutcome(outcome) => {
                        if !outcome.is_success() {
                            failed += 1;
                        }
                        match &outcome {
                            WorkerOutcome::Success { url, detail } => {
                                println!("done: {url} ({detail})");
                            }
                            WorkerOutcome::Failure { url, error } => {
                                eprintln!("failed: {url}: {error}");
                            }
                        }
                        smoother.reset();
                        latest_detail.clear();
                        last_shown = -1;
                    }
                    Event::BatchProgress { completed, total } => {
                        let percent = if total == 0 { 0 } else { completed * 100 / total };
                        println!("batch {completed}/{total} ({percent}%)");
                    }
                    Event::BatchDone => {
                        if failed > 0 {
                            eprintln!("{failed} item(s) failed; see the log above");
                        }
                    }
                }
            }
            _ = ticker.tick() => {
                let displayed = smoother.tick();
                let rounded = displayed.floor() as i64;
                if rounded > 0 && rounded != last_shown {
                    last_shown = rounded;
                    if latest_detail.is_empty() {
                        println!("item {rounded}%");
                    } else {
                        println!("item {rounded}% {latest_detail}");
                    }
                }
            }
        }
    }
}
