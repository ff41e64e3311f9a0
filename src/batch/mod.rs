use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::events::{Event, EventSender};
use crate::media::{
    classify, fallback_hint, run_media_worker, DownloadRequest, FallbackHint, FormatFallback,
    GalleryBackend, GalleryError, MediaBackend, Route, TimeRange, WorkerOutcome,
    DEFAULT_GALLERY_TIMEOUT, DEFAULT_RETRIES,
};

/// Queue and counters for one batch. Owned by the orchestrator; the advance
/// step is the only mutator.
#[derive(Debug)]
pub struct BatchState {
    queue: VecDeque<String>,
    total: usize,
    completed: usize,
}

impl BatchState {
    pub fn start(urls: Vec<String>) -> Self {
        let total = urls.len();
        Self {
            queue: urls.into(),
            total,
            completed: 0,
        }
    }

    pub fn pop_next(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Counts one resolved item, success or terminal failure alike.
    pub fn mark_completed(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    /// Overall progress, floored to whole percent.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            (self.completed * 100 / self.total) as u8
        }
    }
}

/// Batch-wide options from which each item's immutable request is minted at
/// dispatch time.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub out_dir: PathBuf,
    pub cookies: Option<PathBuf>,
    pub proxy: Option<String>,
    pub format_id: Option<String>,
    pub use_best: bool,
    pub trim: Option<TimeRange>,
    pub retries: u32,
    pub format_fallback: FormatFallback,
    pub gallery_timeout: Duration,
}

impl BatchOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            cookies: None,
            proxy: None,
            format_id: None,
            use_best: true,
            trim: None,
            retries: DEFAULT_RETRIES,
            format_fallback: FormatFallback::default(),
            gallery_timeout: DEFAULT_GALLERY_TIMEOUT,
        }
    }

    fn request_for(&self, url: &str) -> DownloadRequest {
        let mut request = DownloadRequest::new(url, self.out_dir.clone());
        request.cookies = self.cookies.clone();
        request.proxy = self.proxy.clone();
        request.format_id = self.format_id.clone();
        request.use_best = self.use_best;
        request.trim = self.trim.clone();
        request.retries = self.retries;
        request.format_fallback = self.format_fallback;
        request
    }
}

/// Processes an ordered queue of URLs one at a time: probe, classify,
/// dispatch to the matching worker, resolve any fallback, then advance.
/// At most one worker of either kind is ever active.
pub struct Orchestrator {
    media: Arc<dyn MediaBackend>,
    gallery: Arc<dyn GalleryBackend>,
    events: EventSender,
}

impl Orchestrator {
    pub fn new(
        media: Arc<dyn MediaBackend>,
        gallery: Arc<dyn GalleryBackend>,
        events: EventSender,
    ) -> Self {
        Self {
            media,
            gallery,
            events,
        }
    }

    /// Runs one batch to completion. A single item's failure never aborts
    /// the batch; the queue drains regardless.
    pub async fn run(&self, urls: Vec<String>, options: &BatchOptions) {
        let mut state = BatchState::start(urls);

        while let Some(url) = state.pop_next() {
            info!("processing: {}", url);
            let _ = self.events.send(Event::Status(format!("Processing: {url}")));

            let outcome = self.process_item(&url, options).await;
            match &outcome {
                WorkerOutcome::Success { url, detail } => info!("downloaded: {} ({})", url, detail),
                WorkerOutcome::Failure { url, error } => warn!("failed: {}: {}", url, error),
            }
            let _ = self.events.send(Event::ItemOutcome(outcome));

            state.mark_completed();
            let _ = self.events.send(Event::BatchProgress {
                completed: state.completed(),
                total: state.total(),
            });
        }

        debug_assert!(state.is_done());
        info!(
            "batch complete ({}/{}, {}%)",
            state.completed(),
            state.total(),
            state.percent()
        );
        let _ = self.events.send(Event::Status("All done.".to_string()));
        let _ = self.events.send(Event::BatchDone);
    }

    async fn process_item(&self, url: &str, options: &BatchOptions) -> WorkerOutcome {
        let probe = self.media.probe(url, options.cookies.as_deref()).await;
        match classify(probe) {
            Ok(Route::Media(_)) => self.dispatch_media(options.request_for(url), options).await,
            Ok(Route::Gallery) => {
                let _ = self.events.send(Event::Status(
                    "Image/gallery content detected; using gallery-dl".to_string(),
                ));
                self.dispatch_gallery(url, options).await
            }
            Err(err) => WorkerOutcome::Failure {
                url: url.to_string(),
                error: format!("content detection failed: {err}"),
            },
        }
    }

    async fn dispatch_media(
        &self,
        mut request: DownloadRequest,
        options: &BatchOptions,
    ) -> WorkerOutcome {
        loop {
            let outcome = run_media_worker(self.media.as_ref(), &request, &self.events).await;
            let error = match &outcome {
                WorkerOutcome::Success { .. } => return outcome,
                WorkerOutcome::Failure { error, .. } => error.clone(),
            };

            match fallback_hint(&error) {
                FallbackHint::Gallery => {
                    let _ = self.events.send(Event::Status(
                        "No video found; trying gallery-dl fallback".to_string(),
                    ));
                    return self.dispatch_gallery(&request.url, options).await;
                }
                // one implicit retry with the relaxed selector; the guard
                // cannot match again once use_best is forced on
                FallbackHint::BestFormat if !request.use_best => match request.format_fallback {
                    FormatFallback::BestQuality => {
                        let _ = self.events.send(Event::Status(
                            "Requested format not available; downloading best quality instead"
                                .to_string(),
                        ));
                        request = request.relaxed();
                    }
                    FormatFallback::Fail => return outcome,
                },
                _ => return outcome,
            }
        }
    }

    async fn dispatch_gallery(&self, url: &str, options: &BatchOptions) -> WorkerOutcome {
        let _ = self
            .events
            .send(Event::Status("Running gallery-dl...".to_string()));

        match self
            .gallery
            .fetch(
                url,
                &options.out_dir,
                options.cookies.as_deref(),
                options.gallery_timeout,
            )
            .await
        {
            Ok(detail) => WorkerOutcome::Success {
                url: url.to_string(),
                detail,
            },
            Err(err) => {
                if matches!(err, GalleryError::LoginRequired(_)) {
                    let _ = self.events.send(Event::Status(
                        "Login required; provide a cookies.txt and retry".to_string(),
                    ));
                }
                WorkerOutcome::Failure {
                    url: url.to_string(),
                    error: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{self, EventReceiver};
    use crate::media::{CodecKind, EncodingOption, MediaError, ProbeError, ProbeResult};

    fn video_probe() -> ProbeResult {
        ProbeResult {
            title: "clip".to_string(),
            uploader: None,
            duration: None,
            thumbnail: None,
            encodings: vec![EncodingOption {
                format_id: "best".to_string(),
                height: Some(720),
                audio_bitrate: None,
                container: "mp4".to_string(),
                size: None,
                codec: CodecKind::Video,
                note: None,
            }],
        }
    }

    struct FakeMedia {
        probe_response: Result<ProbeResult, ProbeError>,
        fetch_responses: Mutex<Vec<Result<(), MediaError>>>,
        requests: Mutex<Vec<DownloadRequest>>,
    }

    impl FakeMedia {
        fn playable(fetch_responses: Vec<Result<(), MediaError>>) -> Self {
            Self {
                probe_response: Ok(video_probe()),
                fetch_responses: Mutex::new(fetch_responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn with_probe(probe_response: Result<ProbeResult, ProbeError>) -> Self {
            Self {
                probe_response,
                fetch_responses: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<DownloadRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaBackend for FakeMedia {
        fn name(&self) -> &'static str {
            "fake-media"
        }

        async fn probe(
            &self,
            _url: &str,
            _cookies: Option<&Path>,
        ) -> Result<ProbeResult, ProbeError> {
            self.probe_response.clone()
        }

        async fn fetch(
            &self,
            request: &DownloadRequest,
            _events: &EventSender,
        ) -> Result<(), MediaError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.fetch_responses.lock().unwrap();
            if responses.is_empty() {
                Ok(())
            } else {
                responses.remove(0)
            }
        }
    }

    struct FakeGallery {
        response: Result<String, GalleryError>,
        calls: AtomicUsize,
    }

    impl FakeGallery {
        fn with(response: Result<String, GalleryError>) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }

        fn idle() -> Self {
            Self::with(Ok("gallery-dl succeeded".to_string()))
        }
    }

    #[async_trait]
    impl GalleryBackend for FakeGallery {
        fn name(&self) -> &'static str {
            "fake-gallery"
        }

        async fn fetch(
            &self,
            _url: &str,
            _out_dir: &Path,
            _cookies: Option<&Path>,
            _timeout: Duration,
        ) -> Result<String, GalleryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn drain(rx: &mut EventReceiver) -> Vec<Event> {
        let mut collected = Vec::new();
        while let Ok(event) = rx.try_recv() {
            collected.push(event);
        }
        collected
    }

    fn run_setup(
        media: FakeMedia,
        gallery: FakeGallery,
    ) -> (Arc<FakeMedia>, Arc<FakeGallery>, Orchestrator, EventReceiver) {
        let media = Arc::new(media);
        let gallery = Arc::new(gallery);
        let (tx, rx) = events::channel();
        let orchestrator = Orchestrator::new(media.clone(), gallery.clone(), tx);
        (media, gallery, orchestrator, rx)
    }

    #[tokio::test]
    async fn test_batch_where_every_item_succeeds() {
        let (_media, gallery, orchestrator, mut rx) =
            run_setup(FakeMedia::playable(Vec::new()), FakeGallery::idle());
        let urls = vec![
            "https://example.com/1".to_string(),
            "https://example.com/2".to_string(),
            "https://example.com/3".to_string(),
        ];

        orchestrator.run(urls, &BatchOptions::new("/downloads")).await;

        let events = drain(&mut rx);
        let outcomes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(WorkerOutcome::is_success));

        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::BatchProgress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        let done_count = events
            .iter()
            .filter(|e| matches!(e, Event::BatchDone))
            .count();
        assert_eq!(done_count, 1);
        assert!(matches!(events.last(), Some(Event::BatchDone)));

        assert_eq!(gallery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_finishes_immediately() {
        let (_media, _gallery, orchestrator, mut rx) =
            run_setup(FakeMedia::playable(Vec::new()), FakeGallery::idle());

        orchestrator
            .run(Vec::new(), &BatchOptions::new("/downloads"))
            .await;

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .all(|e| !matches!(e, Event::BatchProgress { .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::BatchDone))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_media_failure_reroutes_to_gallery() {
        let media = FakeMedia::playable(vec![Err(MediaError::Attempt(
            "ERROR: There is no video in this post".to_string(),
        ))]);
        let gallery = FakeGallery::with(Ok("saved 4 files".to_string()));
        let (_media, gallery, orchestrator, mut rx) = run_setup(media, gallery);

        let mut options = BatchOptions::new("/downloads");
        options.retries = 1;
        orchestrator
            .run(vec!["https://example.com/post".to_string()], &options)
            .await;

        let events = drain(&mut rx);
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        assert_eq!(
            outcome,
            WorkerOutcome::Success {
                url: "https://example.com/post".to_string(),
                detail: "saved 4 files".to_string(),
            }
        );
        assert_eq!(gallery.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_format_unavailable_redispatches_with_best() {
        let media = FakeMedia::playable(vec![
            Err(MediaError::Attempt(
                "ERROR: Requested format is not available".to_string(),
            )),
            Ok(()),
        ]);
        let (media, gallery, orchestrator, mut rx) = run_setup(media, FakeGallery::idle());

        let mut options = BatchOptions::new("/downloads");
        options.retries = 1;
        options.format_id = Some("137".to_string());
        options.use_best = false;
        orchestrator
            .run(vec!["https://example.com/v".to_string()], &options)
            .await;

        let requests = media.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].selector(), "137");
        assert!(requests[1].use_best);
        assert_eq!(requests[1].selector(), "bestvideo+bestaudio/best");

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Status(text) if text.contains("best quality")
        )));
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        assert!(outcome.is_success());
        assert_eq!(gallery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_format_unavailable_with_fail_policy_surfaces_failure() {
        let media = FakeMedia::playable(vec![Err(MediaError::Attempt(
            "ERROR: Requested format is not available".to_string(),
        ))]);
        let (media, gallery, orchestrator, mut rx) = run_setup(media, FakeGallery::idle());

        let mut options = BatchOptions::new("/downloads");
        options.retries = 1;
        options.format_id = Some("137".to_string());
        options.use_best = false;
        options.format_fallback = FormatFallback::Fail;
        orchestrator
            .run(vec!["https://example.com/v".to_string()], &options)
            .await;

        assert_eq!(media.recorded_requests().len(), 1);
        assert_eq!(gallery.calls.load(Ordering::SeqCst), 0);

        let events = drain(&mut rx);
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_unroutable_probe_error_counts_item_and_advances() {
        let media = FakeMedia::with_probe(Err(ProbeError::Unknown("HTTP Error 500".to_string())));
        let (media, gallery, orchestrator, mut rx) = run_setup(media, FakeGallery::idle());

        orchestrator
            .run(
                vec!["https://example.com/v".to_string()],
                &BatchOptions::new("/downloads"),
            )
            .await;

        assert!(media.recorded_requests().is_empty());
        assert_eq!(gallery.calls.load(Ordering::SeqCst), 0);

        let events = drain(&mut rx);
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        match outcome {
            WorkerOutcome::Failure { error, .. } => {
                assert!(error.contains("content detection failed"));
                assert!(error.contains("HTTP Error 500"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(events.iter().any(|e| matches!(
            e,
            Event::BatchProgress { completed: 1, total: 1 }
        )));
        assert!(matches!(events.last(), Some(Event::BatchDone)));
    }

    #[tokio::test]
    async fn test_probe_without_playable_encodings_routes_to_gallery() {
        let probe = ProbeResult {
            encodings: Vec::new(),
            ..video_probe()
        };
        let media = FakeMedia::with_probe(Ok(probe));
        let (media, gallery, orchestrator, mut rx) = run_setup(media, FakeGallery::idle());

        orchestrator
            .run(
                vec!["https://example.com/album".to_string()],
                &BatchOptions::new("/downloads"),
            )
            .await;

        assert!(media.recorded_requests().is_empty());
        assert_eq!(gallery.calls.load(Ordering::SeqCst), 1);

        let events = drain(&mut rx);
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_gallery_login_wall_reported_distinctly() {
        let media = FakeMedia::with_probe(Err(ProbeError::NoMedia));
        let gallery = FakeGallery::with(Err(GalleryError::LoginRequired(
            "HTTP redirect to login page".to_string(),
        )));
        let (_media, _gallery, orchestrator, mut rx) = run_setup(media, gallery);

        orchestrator
            .run(
                vec!["https://example.com/private".to_string()],
                &BatchOptions::new("/downloads"),
            )
            .await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Status(text) if text.contains("cookies.txt")
        )));
        let outcome = events
            .iter()
            .find_map(|e| match e {
                Event::ItemOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .expect("missing item outcome");
        match outcome {
            WorkerOutcome::Failure { error, .. } => {
                assert!(error.contains("login required"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // failed or not, the item counts and the batch completes
        assert!(events.iter().any(|e| matches!(
            e,
            Event::BatchProgress { completed: 1, total: 1 }
        )));
    }

    #[test]
    fn test_batch_state_percent_is_floored() {
        let mut state = BatchState::start(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]);
        assert_eq!(state.percent(), 0);
        state.mark_completed();
        assert_eq!(state.percent(), 33);
        state.mark_completed();
        assert_eq!(state.percent(), 66);
        state.mark_completed();
        assert_eq!(state.percent(), 100);
        // completed never exceeds total
        state.mark_completed();
        assert_eq!(state.completed(), 3);
    }

    #[test]
    fn test_batch_state_done_when_queue_empty() {
        let mut state = BatchState::start(vec!["a".to_string()]);
        assert!(!state.is_done());
        assert_eq!(state.pop_next().as_deref(), Some("a"));
        assert!(state.is_done());
        assert_eq!(state.pop_next(), None);
        assert_eq!(BatchState::start(Vec::new()).percent(), 0);
    }
}
