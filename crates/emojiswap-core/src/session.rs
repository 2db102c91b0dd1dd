//! # Processing Session
//!
//! Orchestrates one photo through detect → configure → process → materialize.
//!
//! ## States
//!
//! ```text
//!  Idle ──submit──▶ Detecting ──faces──▶ AwaitingConfig ──config──▶ Processing ──▶ Ready
//!                       │                                              │  ▲          │
//!                       └──────────────▶ Failed ◀──────────────────────┘  └──config──┘
//! ```
//!
//! ## Ordering
//!
//! Every `process` call gets a sequence number. Responses can complete in any
//! order; only the one carrying the highest submitted number may change state.
//! Each photo also gets an epoch, bumped on reset or retake, so answers for a
//! discarded photo are ignored no matter what they contain.
//!
//! ## Example
//!
//! ```ignore
//! let session = ProcessingSession::new(api, cache, SessionOptions::default());
//! session.submit(PhotoHandle::from_path("selfie.jpg")).await;
//! let snapshot = session.config_changed(EmojiConfig::default()).await;
//! assert_eq!(snapshot.status, SessionStatus::Ready);
//! ```

use crate::cache::{LocalResource, ResultCache};
use crate::error::{ErrorInfo, Stage};
use crate::gallery::{Gallery, GalleryEntry};
use bytes::Bytes;
use emojiswap_client::{ClientError, DetectionResult, EmojiConfig, FaceSwapApi, PhotoHandle};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionStatus {
    Idle,
    Detecting,
    AwaitingConfig,
    Processing,
    Ready,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Detecting => "detecting",
            SessionStatus::AwaitingConfig => "awaiting config",
            SessionStatus::Processing => "processing",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A processed image and the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedArtifact {
    /// Sequence number of the `process` call
    pub seq: u64,
    pub config: EmojiConfig,
    pub bytes: Bytes,
    /// Where the bytes were written; `None` until materialized
    pub location: Option<LocalResource>,
}

impl ProcessedArtifact {
    pub fn new(seq: u64, config: EmojiConfig, bytes: Bytes) -> Self {
        Self {
            seq,
            config,
            bytes,
            location: None,
        }
    }
}

/// Everything the display host needs to render the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub handle: Option<PhotoHandle>,
    pub detection: Option<DetectionResult>,
    pub config: EmojiConfig,
    pub latest_artifact: Option<ProcessedArtifact>,
    /// Set while `Failed`
    pub error: Option<ErrorInfo>,
    /// Non-fatal problem, e.g. the result could not be written locally
    pub warning: Option<ErrorInfo>,
}

impl SessionSnapshot {
    pub fn face_count(&self) -> usize {
        self.detection.as_ref().map_or(0, DetectionResult::face_count)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Issue the first `process` call as soon as faces are found, using the
    /// session's current config
    pub auto_process: bool,
}

/// Last operation attempted, replayed by `retry`
#[derive(Debug, Clone, Copy)]
enum Operation {
    Detect,
    Process(EmojiConfig),
}

pub(crate) struct ProcessRequest {
    epoch: u64,
    seq: u64,
    handle: PhotoHandle,
    config: EmojiConfig,
    cancel: CancellationToken,
}

struct DetectRequest {
    epoch: u64,
    handle: PhotoHandle,
    cancel: CancellationToken,
}

struct SessionState {
    epoch: u64,
    cancel: CancellationToken,
    status: SessionStatus,
    handle: Option<PhotoHandle>,
    detection: Option<DetectionResult>,
    config: EmojiConfig,
    latest_artifact: Option<ProcessedArtifact>,
    error: Option<ErrorInfo>,
    warning: Option<ErrorInfo>,
    /// Highest sequence number submitted for the current photo
    last_seq: u64,
    /// Config of the `last_seq` request while it is outstanding
    in_flight: Option<EmojiConfig>,
    last_op: Option<Operation>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            epoch: 0,
            cancel: CancellationToken::new(),
            status: SessionStatus::Idle,
            handle: None,
            detection: None,
            config: EmojiConfig::default(),
            latest_artifact: None,
            error: None,
            warning: None,
            last_seq: 0,
            in_flight: None,
            last_op: None,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            handle: self.handle.clone(),
            detection: self.detection.clone(),
            config: self.config,
            latest_artifact: self.latest_artifact.clone(),
            error: self.error.clone(),
            warning: self.warning.clone(),
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            debug!(epoch = self.epoch, "Session {} -> {}", self.status, status);
            self.status = status;
        }
    }

    fn fail(&mut self, error: ErrorInfo) {
        self.error = Some(error);
        self.set_status(SessionStatus::Failed);
    }

    /// Drop the photo and everything derived from it. Outstanding calls are
    /// cancelled and their answers will no longer match the epoch.
    fn discard_photo(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.epoch += 1;
        self.handle = None;
        self.detection = None;
        self.latest_artifact = None;
        self.error = None;
        self.warning = None;
        self.last_seq = 0;
        self.in_flight = None;
        self.last_op = None;
        self.set_status(SessionStatus::Idle);
    }

    fn has_faces(&self) -> bool {
        self.detection.as_ref().is_some_and(DetectionResult::has_faces)
    }

    fn is_current(&self, epoch: u64, seq: u64) -> bool {
        self.epoch == epoch && self.last_seq == seq
    }
}

struct Shared {
    api: Arc<dyn FaceSwapApi>,
    cache: ResultCache,
    options: SessionOptions,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

/// Handle to one processing session. Clones share the same state.
#[derive(Clone)]
pub struct ProcessingSession {
    shared: Arc<Shared>,
}

impl ProcessingSession {
    pub fn new(api: Arc<dyn FaceSwapApi>, cache: ResultCache, options: SessionOptions) -> Self {
        let state = SessionState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(Shared {
                api,
                cache,
                options,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.shared.options
    }

    pub fn cache(&self) -> &ResultCache {
        &self.shared.cache
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.state.lock().status
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    fn publish(&self, state: &SessionState) -> SessionSnapshot {
        let snapshot = state.snapshot();
        self.shared.updates.send_replace(snapshot.clone());
        snapshot
    }

    /// Start a session for `handle` and run face detection.
    ///
    /// Submitting while another photo is active is a retake: the old photo
    /// and its in-flight requests are discarded, the config is kept.
    pub async fn submit(&self, handle: PhotoHandle) -> SessionSnapshot {
        let request = {
            let mut state = self.shared.state.lock();
            if state.status != SessionStatus::Idle {
                info!("Replacing photo {:?}", state.handle.as_ref().map(PhotoHandle::id));
                state.discard_photo();
            }
            state.handle = Some(handle.clone());
            state.last_op = Some(Operation::Detect);
            state.set_status(SessionStatus::Detecting);
            self.publish(&state);
            DetectRequest {
                epoch: state.epoch,
                handle,
                cancel: state.cancel.clone(),
            }
        };
        self.run_detect(request).await
    }

    async fn run_detect(&self, request: DetectRequest) -> SessionSnapshot {
        debug!(epoch = request.epoch, photo = %request.handle.id(), "Detecting faces via {}", self.shared.api.name());
        let result = self
            .shared
            .api
            .detect_faces(&request.handle, &request.cancel)
            .await;

        let auto_config = {
            let mut state = self.shared.state.lock();
            if state.epoch != request.epoch {
                debug!(epoch = request.epoch, "Discarding detection for a superseded photo");
                return state.snapshot();
            }

            match result {
                Ok(detection) if detection.has_faces() => {
                    info!(faces = detection.face_count(), "Faces detected");
                    state.detection = Some(detection);
                    state.error = None;
                    state.set_status(SessionStatus::AwaitingConfig);
                }
                Ok(detection) => {
                    warn!("No face detected in photo {}", request.handle.id());
                    state.detection = Some(detection);
                    state.fail(ErrorInfo::no_face());
                }
                Err(err) => {
                    warn!("Face detection failed: {}", err);
                    state.fail(ErrorInfo::from_client(&err, Stage::Detect));
                }
            }
            self.publish(&state);

            (self.shared.options.auto_process && state.status == SessionStatus::AwaitingConfig)
                .then_some(state.config)
        };

        match auto_config {
            Some(config) => self.config_changed(config).await,
            None => self.snapshot(),
        }
    }

    /// Apply a new config and, when a photo with faces is loaded, reprocess it.
    ///
    /// Before detection has succeeded the config is only stored.
    pub async fn config_changed(&self, config: EmojiConfig) -> SessionSnapshot {
        match self.queue_config(config) {
            Some(request) => self.run_process(request).await,
            None => self.snapshot(),
        }
    }

    /// Apply `config` and claim the next sequence number without calling the
    /// service. Requests queued in order keep that order no matter when
    /// [`run_process`](Self::run_process) gets to run.
    pub(crate) fn queue_config(&self, config: EmojiConfig) -> Option<ProcessRequest> {
        let mut state = self.shared.state.lock();
        self.begin_process(&mut state, config)
    }

    fn begin_process(&self, state: &mut SessionState, config: EmojiConfig) -> Option<ProcessRequest> {
        if let Err(err) = config.validate() {
            warn!("Ignoring config change: {}", err);
            return None;
        }
        state.config = config;

        let can_process = match state.status {
            SessionStatus::AwaitingConfig | SessionStatus::Processing | SessionStatus::Ready => true,
            SessionStatus::Failed => state.has_faces(),
            SessionStatus::Idle | SessionStatus::Detecting => false,
        };
        if !can_process {
            debug!("Config stored, nothing to process in state {}", state.status);
            self.publish(state);
            return None;
        }

        let unchanged = match state.status {
            SessionStatus::Processing => state.in_flight == Some(config),
            SessionStatus::Ready => state.latest_artifact.as_ref().map(|a| a.config) == Some(config),
            _ => false,
        };
        if unchanged {
            debug!("Config matches the current result, not reprocessing");
            self.publish(state);
            return None;
        }

        let handle = state.handle.clone()?;
        state.last_seq += 1;
        state.in_flight = Some(config);
        state.last_op = Some(Operation::Process(config));
        state.error = None;
        state.set_status(SessionStatus::Processing);
        self.publish(state);

        Some(ProcessRequest {
            epoch: state.epoch,
            seq: state.last_seq,
            handle,
            config,
            cancel: state.cancel.clone(),
        })
    }

    pub(crate) async fn run_process(&self, request: ProcessRequest) -> SessionSnapshot {
        debug!(seq = request.seq, epoch = request.epoch, "Processing image");
        let result = self
            .shared
            .api
            .process_image(&request.handle, &request.config, &request.cancel)
            .await;

        match result {
            Ok(bytes) => self.complete_process(request, bytes).await,
            Err(err) => self.fail_process(request, err),
        }
    }

    fn fail_process(&self, request: ProcessRequest, err: ClientError) -> SessionSnapshot {
        let mut state = self.shared.state.lock();
        if !state.is_current(request.epoch, request.seq) {
            debug!(seq = request.seq, "Ignoring failure of superseded request: {}", err);
            return state.snapshot();
        }

        warn!(seq = request.seq, "Image processing failed: {}", err);
        state.in_flight = None;
        state.fail(ErrorInfo::from_client(&err, Stage::Process));
        self.publish(&state)
    }

    async fn complete_process(&self, request: ProcessRequest, bytes: Bytes) -> SessionSnapshot {
        {
            let state = self.shared.state.lock();
            if !state.is_current(request.epoch, request.seq) {
                debug!(seq = request.seq, latest = state.last_seq, "Discarding stale result");
                return state.snapshot();
            }
        }

        let mut artifact = ProcessedArtifact::new(request.seq, request.config, bytes);
        let stored = self.shared.cache.materialize(&artifact).await;

        let outcome = {
            let mut state = self.shared.state.lock();
            // a newer request may have been submitted while writing
            if !state.is_current(request.epoch, request.seq) {
                debug!(seq = request.seq, "Result superseded during materialization");
                Err(state.snapshot())
            } else {
                match &stored {
                    Ok(location) => {
                        artifact.location = Some(location.clone());
                        state.warning = None;
                    }
                    Err(err) => {
                        warn!(seq = request.seq, "Could not materialize result: {}", err);
                        state.warning = Some(ErrorInfo::storage(err));
                    }
                }

                info!(seq = request.seq, "Result ready");
                state.latest_artifact = Some(artifact);
                state.in_flight = None;
                state.error = None;
                state.set_status(SessionStatus::Ready);
                Ok(self.publish(&state))
            }
        };

        match outcome {
            Ok(snapshot) => snapshot,
            Err(snapshot) => {
                if let Ok(location) = &stored {
                    self.shared.cache.discard(location).await;
                }
                snapshot
            }
        }
    }

    /// Re-attempt whatever failed, with the same photo and config
    pub async fn retry(&self) -> SessionSnapshot {
        enum Next {
            Detect(DetectRequest),
            Process(ProcessRequest),
        }

        let next = {
            let mut state = self.shared.state.lock();
            if state.status != SessionStatus::Failed {
                debug!("Nothing to retry in state {}", state.status);
                return state.snapshot();
            }

            match (state.last_op, state.handle.clone()) {
                (Some(Operation::Detect), Some(handle)) => {
                    state.error = None;
                    state.detection = None;
                    state.set_status(SessionStatus::Detecting);
                    self.publish(&state);
                    Next::Detect(DetectRequest {
                        epoch: state.epoch,
                        handle,
                        cancel: state.cancel.clone(),
                    })
                }
                (Some(Operation::Process(config)), Some(_)) => {
                    match self.begin_process(&mut state, config) {
                        Some(request) => Next::Process(request),
                        None => return state.snapshot(),
                    }
                }
                _ => return state.snapshot(),
            }
        };

        info!("Retrying");
        match next {
            Next::Detect(request) => self.run_detect(request).await,
            Next::Process(request) => self.run_process(request).await,
        }
    }

    /// Back to `Idle`: photo, detection, results and config are discarded and
    /// in-flight requests cancelled.
    pub fn reset(&self) -> SessionSnapshot {
        let mut state = self.shared.state.lock();
        state.discard_photo();
        state.config = EmojiConfig::default();
        info!("Session reset");
        self.publish(&state)
    }

    /// Store a config without triggering any processing
    pub fn update_config(&self, config: EmojiConfig) -> SessionSnapshot {
        let mut state = self.shared.state.lock();
        if config.validate().is_ok() {
            state.config = config;
        }
        self.publish(&state)
    }

    /// Cancel outstanding requests for the current photo.
    ///
    /// The requests resolve as cancelled network failures, which `retry` can
    /// re-issue.
    pub fn cancel_in_flight(&self) {
        let mut state = self.shared.state.lock();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        debug!(epoch = state.epoch, "Cancelled in-flight requests");
    }

    /// Write the latest result again after a storage failure
    pub async fn retry_materialize(&self) -> SessionSnapshot {
        let (epoch, mut artifact) = {
            let state = self.shared.state.lock();
            match (&state.warning, &state.latest_artifact) {
                (Some(_), Some(artifact)) if state.status == SessionStatus::Ready => {
                    (state.epoch, artifact.clone())
                }
                _ => return state.snapshot(),
            }
        };

        let stored = self.shared.cache.materialize(&artifact).await;

        let outcome = {
            let mut state = self.shared.state.lock();
            let still_latest = state.epoch == epoch
                && state.latest_artifact.as_ref().map(|a| a.seq) == Some(artifact.seq);
            if !still_latest {
                Err(state.snapshot())
            } else {
                match &stored {
                    Ok(location) => {
                        info!("Result materialized on retry");
                        artifact.location = Some(location.clone());
                        state.latest_artifact = Some(artifact);
                        state.warning = None;
                    }
                    Err(err) => {
                        warn!("Materialization retry failed: {}", err);
                        state.warning = Some(ErrorInfo::storage(err));
                    }
                }
                Ok(self.publish(&state))
            }
        };

        match outcome {
            Ok(snapshot) => snapshot,
            Err(snapshot) => {
                if let Ok(location) = &stored {
                    self.shared.cache.discard(location).await;
                }
                snapshot
            }
        }
    }

    /// Save the ready result to `gallery` and close the session.
    ///
    /// Returns `Ok(None)` when there is no ready result.
    pub async fn commit_to_gallery(
        &self,
        gallery: &mut Gallery,
        title: &str,
    ) -> crate::Result<Option<GalleryEntry>> {
        let (epoch, artifact) = {
            let state = self.shared.state.lock();
            match (&state.latest_artifact, state.status) {
                (Some(artifact), SessionStatus::Ready) => (state.epoch, artifact.clone()),
                _ => return Ok(None),
            }
        };

        let entry = gallery.commit(&artifact, title).await?;

        let mut state = self.shared.state.lock();
        if state.epoch == epoch {
            state.discard_photo();
            state.config = EmojiConfig::default();
            self.publish(&state);
        }
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{artifact_bytes, one_face, ScriptedApi};
    use std::time::Duration;

    fn session_with(api: Arc<ScriptedApi>, dir: &std::path::Path) -> ProcessingSession {
        ProcessingSession::new(api, ResultCache::new(dir.join("cache")), SessionOptions::default())
    }

    fn config(blend: u8) -> EmojiConfig {
        EmojiConfig {
            blend_intensity: blend,
            ..EmojiConfig::default()
        }
    }

    fn photo() -> PhotoHandle {
        PhotoHandle::from_bytes(&b"jpeg"[..])
    }

    #[tokio::test]
    async fn test_one_face_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api.clone(), dir.path());

        let snapshot = session.submit(photo()).await;
        assert_eq!(snapshot.status, SessionStatus::AwaitingConfig);
        assert_eq!(snapshot.face_count(), 1);

        let snapshot = session.config_changed(EmojiConfig::default()).await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
        let artifact = snapshot.latest_artifact.unwrap();
        assert_eq!(artifact.seq, 1);
        assert_eq!(artifact.bytes, artifact_bytes(&EmojiConfig::default()));
        let location = artifact.location.unwrap();
        assert_eq!(std::fs::read(location.path).unwrap(), &artifact.bytes[..]);
        assert_eq!(api.process_calls(), vec![EmojiConfig::default()]);
    }

    #[tokio::test]
    async fn test_auto_process_on_detection() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = ProcessingSession::new(
            api.clone(),
            ResultCache::new(dir.path()),
            SessionOptions { auto_process: true },
        );

        let snapshot = session.submit(photo()).await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.latest_artifact.unwrap().seq, 1);
        assert_eq!(api.process_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_no_face_blocks_processing() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_detect(Ok(DetectionResult::default()));
        let session = session_with(api.clone(), dir.path());

        let snapshot = session.submit(photo()).await;
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::NoFaceDetected);

        for blend in [10, 20, 30] {
            let snapshot = session.config_changed(config(blend)).await;
            assert_eq!(snapshot.status, SessionStatus::Failed);
        }
        assert!(api.process_calls().is_empty());

        // a new photo unblocks processing
        session.submit(photo()).await;
        session.config_changed(config(40)).await;
        assert_eq!(api.process_calls(), vec![config(40)]);
    }

    #[tokio::test]
    async fn test_retry_after_no_face_detects_once_more() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_detect(Ok(DetectionResult::default()));
        api.push_detect(Ok(DetectionResult::default()));
        let session = session_with(api.clone(), dir.path());

        session.submit(photo()).await;
        assert_eq!(api.detect_count(), 1);

        let snapshot = session.retry().await;
        assert_eq!(api.detect_count(), 2);
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert!(api.process_calls().is_empty());
    }

    #[tokio::test]
    async fn test_detect_failure_then_retry_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_detect(Err(ClientError::Network("connection reset".into())));
        let session = session_with(api.clone(), dir.path());

        let snapshot = session.submit(photo()).await;
        let error = snapshot.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.stage, Stage::Detect);

        let snapshot = session.retry().await;
        assert_eq!(snapshot.status, SessionStatus::AwaitingConfig);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_detect_timeout_classified() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_detect(Err(ClientError::Timeout(Duration::from_millis(10_000))));
        let session = session_with(api, dir.path());

        let snapshot = session.submit(photo()).await;
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_latest_submission_wins_in_any_completion_order() {
        let orders: [[usize; 4]; 6] = [
            [0, 1, 2, 3],
            [3, 2, 1, 0],
            [3, 0, 1, 2],
            [1, 3, 0, 2],
            [2, 0, 3, 1],
            [0, 2, 1, 3],
        ];

        for order in orders {
            let dir = tempfile::tempdir().unwrap();
            let api = Arc::new(ScriptedApi::gated());
            let session = session_with(api.clone(), dir.path());
            session.submit(photo()).await;

            let configs: Vec<EmojiConfig> = (1..=4).map(|i| config(i * 10)).collect();
            let mut tasks = Vec::new();
            for (i, cfg) in configs.iter().copied().enumerate() {
                let session = session.clone();
                tasks.push(tokio::spawn(async move { session.config_changed(cfg).await }));
                api.wait_for_process_gates(i + 1).await;
            }

            for index in order {
                api.release_process(index, Ok(artifact_bytes(&configs[index])));
                tokio::task::yield_now().await;
            }
            for task in tasks {
                task.await.unwrap();
            }

            let snapshot = session.snapshot();
            assert_eq!(snapshot.status, SessionStatus::Ready, "order {:?}", order);
            let artifact = snapshot.latest_artifact.unwrap();
            assert_eq!(artifact.seq, 4, "order {:?}", order);
            assert_eq!(artifact.config, configs[3], "order {:?}", order);
            assert_eq!(artifact.bytes, artifact_bytes(&configs[3]));
        }
    }

    #[tokio::test]
    async fn test_stale_result_keeps_processing() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::gated());
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(10)).await }
        });
        api.wait_for_process_gates(1).await;
        let second = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(20)).await }
        });
        api.wait_for_process_gates(2).await;

        api.release_process(0, Ok(artifact_bytes(&config(10))));
        let snapshot = first.await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Processing);
        assert!(snapshot.latest_artifact.is_none());

        api.release_process(1, Ok(artifact_bytes(&config(20))));
        let snapshot = second.await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.latest_artifact.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_result_superseded_while_writing_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::gated());
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(10)).await }
        });
        api.wait_for_process_gates(1).await;

        // let the first result pass its check and start writing
        api.release_process(0, Ok(artifact_bytes(&config(10))));
        tokio::task::yield_now().await;
        assert_eq!(session.status(), SessionStatus::Processing);

        let request = session.queue_config(config(20)).unwrap();
        let second = tokio::spawn({
            let session = session.clone();
            async move { session.run_process(request).await }
        });
        api.wait_for_process_gates(2).await;

        let snapshot = first.await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Processing);
        assert!(snapshot.latest_artifact.is_none());

        api.release_process(1, Ok(artifact_bytes(&config(20))));
        let snapshot = second.await.unwrap();
        let location = snapshot.latest_artifact.unwrap().location.unwrap();
        assert_eq!(session.cache().entries().await.unwrap(), vec![location.path]);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_override_ready() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::gated());
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(10)).await }
        });
        api.wait_for_process_gates(1).await;
        let second = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(20)).await }
        });
        api.wait_for_process_gates(2).await;

        api.release_process(1, Ok(artifact_bytes(&config(20))));
        second.await.unwrap();
        api.release_process(0, Err(ClientError::Network("reset".into())));
        first.await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.latest_artifact.unwrap().config, config(20));
    }

    #[tokio::test]
    async fn test_process_failure_then_retry_same_config() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_process(Err(ClientError::Service {
            status: 500,
            message: "GPU unavailable".into(),
        }));
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let snapshot = session.config_changed(config(33)).await;
        assert_eq!(snapshot.status, SessionStatus::Failed);
        let error = snapshot.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Service);
        assert_eq!(error.message, "GPU unavailable");
        assert_eq!(error.stage, Stage::Process);

        let snapshot = session.retry().await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.latest_artifact.unwrap().seq, 2);
        assert_eq!(api.process_calls(), vec![config(33), config(33)]);
    }

    #[tokio::test]
    async fn test_config_change_after_process_failure_reprocesses() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.push_process(Err(ClientError::Timeout(Duration::from_secs(10))));
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let snapshot = session.config_changed(config(10)).await;
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Timeout);

        let snapshot = session.config_changed(config(20)).await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_unchanged_config_not_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        session.config_changed(config(10)).await;
        session.config_changed(config(10)).await;
        assert_eq!(api.process_calls().len(), 1);

        let snapshot = session.config_changed(config(11)).await;
        assert_eq!(snapshot.latest_artifact.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_config_before_detection_is_only_stored() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api.clone(), dir.path());

        let snapshot = session.config_changed(config(5)).await;
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert_eq!(snapshot.config, config(5));
        assert!(api.process_calls().is_empty());
    }

    #[tokio::test]
    async fn test_reset_then_new_photo_ignores_stale_answer() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::gated());
        let session = session_with(api.clone(), dir.path());

        let photo_a = photo();
        session.submit(photo_a.clone()).await;
        let stale = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(10)).await }
        });
        api.wait_for_process_gates(1).await;
        assert!(!api.process_token(0).is_cancelled());

        session.reset();
        assert!(api.process_token(0).is_cancelled());

        let photo_b = photo();
        let snapshot = session.submit(photo_b.clone()).await;
        assert_eq!(snapshot.status, SessionStatus::AwaitingConfig);

        // photo A's answer arrives late anyway
        api.release_process(0, Ok(artifact_bytes(&config(10))));
        stale.await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::AwaitingConfig);
        assert_eq!(snapshot.handle, Some(photo_b));
        assert!(snapshot.latest_artifact.is_none());
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_stale_detection_after_retake() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.gate_detect();
        let session = session_with(api.clone(), dir.path());

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.submit(photo()).await }
        });
        api.wait_for_detect_gates(1).await;

        let photo_b = photo();
        let retake = tokio::spawn({
            let session = session.clone();
            let photo_b = photo_b.clone();
            async move { session.submit(photo_b).await }
        });
        api.wait_for_detect_gates(2).await;

        api.release_detect(1, Ok(one_face()));
        assert_eq!(retake.await.unwrap().status, SessionStatus::AwaitingConfig);

        api.release_detect(0, Ok(DetectionResult::default()));
        first.await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::AwaitingConfig);
        assert_eq!(snapshot.handle, Some(photo_b));
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api, dir.path());
        session.submit(photo()).await;
        session.config_changed(config(5)).await;

        let snapshot = session.reset();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.handle.is_none());
        assert!(snapshot.detection.is_none());
        assert!(snapshot.latest_artifact.is_none());
        assert_eq!(snapshot.config, EmojiConfig::default());
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_ready_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, b"in the way").unwrap();

        let api = Arc::new(ScriptedApi::new());
        let session = ProcessingSession::new(api, ResultCache::new(&blocker), SessionOptions::default());
        session.submit(photo()).await;

        let snapshot = session.config_changed(config(10)).await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.warning.as_ref().unwrap().kind, ErrorKind::Storage);
        let artifact = snapshot.latest_artifact.unwrap();
        assert!(artifact.location.is_none());
        assert!(!artifact.bytes.is_empty());

        std::fs::remove_file(&blocker).unwrap();
        let snapshot = session.retry_materialize().await;
        assert!(snapshot.warning.is_none());
        assert!(snapshot.latest_artifact.unwrap().location.is_some());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::gated());
        api.honor_cancellation();
        let session = session_with(api.clone(), dir.path());
        session.submit(photo()).await;

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.config_changed(config(10)).await }
        });
        api.wait_for_process_gates(1).await;
        session.cancel_in_flight();

        let snapshot = task.await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Network);

        let retry = tokio::spawn({
            let session = session.clone();
            async move { session.retry().await }
        });
        api.wait_for_process_gates(2).await;
        api.release_process(1, Ok(artifact_bytes(&config(10))));
        assert_eq!(retry.await.unwrap().status, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api, dir.path());
        let mut updates = session.subscribe();

        session.submit(photo()).await;
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().status, SessionStatus::AwaitingConfig);

        session.config_changed(config(10)).await;
        assert_eq!(updates.borrow_and_update().status, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_commit_to_gallery_closes_session() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let session = session_with(api, dir.path());
        let mut gallery = Gallery::open(dir.path().join("gallery")).await.unwrap();

        assert!(session.commit_to_gallery(&mut gallery, "Nope").await.unwrap().is_none());

        session.submit(photo()).await;
        session.config_changed(config(10)).await;
        let entry = session
            .commit_to_gallery(&mut gallery, "Beach day")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.title, "Beach day");
        assert_eq!(entry.config, config(10));
        assert_eq!(gallery.len(), 1);
        assert_eq!(session.status(), SessionStatus::Idle);
    }
}
