//! Scripted service double for session and adjuster tests.

use async_trait::async_trait;
use bytes::Bytes;
use emojiswap_client::{
    ClientError, DetectionResult, EmojiConfig, FaceRegion, FaceSwapApi, PhotoHandle, Result,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub(crate) fn one_face() -> DetectionResult {
    DetectionResult {
        faces: vec![FaceRegion {
            x: Some(10.0),
            y: Some(12.0),
            width: Some(64.0),
            height: Some(64.0),
            confidence: Some(0.98),
            ..FaceRegion::default()
        }],
    }
}

/// Bytes the default process reply produces for `config`
pub(crate) fn artifact_bytes(config: &EmojiConfig) -> Bytes {
    Bytes::from(format!(
        "jpeg:{}:{}:{}:{}",
        config.style_id, config.blend_intensity, config.expression_match, config.color_adjustment
    ))
}

#[derive(Default)]
struct Script {
    detect_replies: VecDeque<Result<DetectionResult>>,
    process_replies: VecDeque<Result<Bytes>>,
    gate_detect: bool,
    gate_process: bool,
    honor_cancel: bool,
    detect_calls: usize,
    process_calls: Vec<EmojiConfig>,
    process_tokens: Vec<CancellationToken>,
    detect_gates: Vec<Option<oneshot::Sender<Result<DetectionResult>>>>,
    process_gates: Vec<Option<oneshot::Sender<Result<Bytes>>>>,
}

/// Answers from a queue, or holds each call until the test releases it.
///
/// Without queued replies detect finds one face and process returns
/// [`artifact_bytes`] for the requested config.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every process call waits for [`release_process`](Self::release_process)
    pub fn gated() -> Self {
        let api = Self::new();
        api.script.lock().gate_process = true;
        api
    }

    pub fn gate_detect(&self) {
        self.script.lock().gate_detect = true;
    }

    /// Gated calls resolve as cancelled once their token fires
    pub fn honor_cancellation(&self) {
        self.script.lock().honor_cancel = true;
    }

    pub fn push_detect(&self, reply: Result<DetectionResult>) {
        self.script.lock().detect_replies.push_back(reply);
    }

    pub fn push_process(&self, reply: Result<Bytes>) {
        self.script.lock().process_replies.push_back(reply);
    }

    pub fn detect_count(&self) -> usize {
        self.script.lock().detect_calls
    }

    pub fn process_calls(&self) -> Vec<EmojiConfig> {
        self.script.lock().process_calls.clone()
    }

    pub fn process_token(&self, index: usize) -> CancellationToken {
        self.script.lock().process_tokens[index].clone()
    }

    pub async fn wait_for_process_gates(&self, count: usize) {
        while self.script.lock().process_gates.len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub async fn wait_for_detect_gates(&self, count: usize) {
        while self.script.lock().detect_gates.len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn release_process(&self, index: usize, reply: Result<Bytes>) {
        let gate = self.script.lock().process_gates[index].take();
        if let Some(gate) = gate {
            let _ = gate.send(reply);
        }
    }

    pub fn release_detect(&self, index: usize, reply: Result<DetectionResult>) {
        let gate = self.script.lock().detect_gates[index].take();
        if let Some(gate) = gate {
            let _ = gate.send(reply);
        }
    }
}

async fn wait_gate<T>(
    rx: oneshot::Receiver<Result<T>>,
    cancel: &CancellationToken,
    honor_cancel: bool,
) -> Result<T> {
    if honor_cancel {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            reply = rx => reply.unwrap_or(Err(ClientError::Cancelled)),
        }
    } else {
        rx.await.unwrap_or(Err(ClientError::Cancelled))
    }
}

#[async_trait]
impl FaceSwapApi for ScriptedApi {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn detect_faces(
        &self,
        _photo: &PhotoHandle,
        cancel: &CancellationToken,
    ) -> Result<DetectionResult> {
        let (rx, honor_cancel) = {
            let mut script = self.script.lock();
            script.detect_calls += 1;
            if !script.gate_detect {
                return script.detect_replies.pop_front().unwrap_or_else(|| Ok(one_face()));
            }
            let (tx, rx) = oneshot::channel();
            script.detect_gates.push(Some(tx));
            (rx, script.honor_cancel)
        };
        wait_gate(rx, cancel, honor_cancel).await
    }

    async fn process_image(
        &self,
        _photo: &PhotoHandle,
        config: &EmojiConfig,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let (rx, honor_cancel) = {
            let mut script = self.script.lock();
            script.process_calls.push(*config);
            script.process_tokens.push(cancel.clone());
            if !script.gate_process {
                return script
                    .process_replies
                    .pop_front()
                    .unwrap_or_else(|| Ok(artifact_bytes(config)));
            }
            let (tx, rx) = oneshot::channel();
            script.process_gates.push(Some(tx));
            (rx, script.honor_cancel)
        };
        wait_gate(rx, cancel, honor_cancel).await
    }
}
