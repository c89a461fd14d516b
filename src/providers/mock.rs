/*!
 * Scripted caption provider for tests.
 *
 * Outcomes are handed out in order, one per call. When the script runs out the
 * fallback outcome is repeated. Every call records the egress identity it was
 * given so tests can assert rotation behavior.
 */

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::caption_parser::Chunk;
use crate::providers::{AuthToken, CaptionProvider, FetchOutcome};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub video_id: String,
    pub egress: Option<String>,
    pub authenticated: bool,
}

/// Provider that replays a fixed sequence of outcomes
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<FetchOutcome>>>,
    fallback: FetchOutcome,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    request_count: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Replay `outcomes`, then keep returning `Fatal`
    pub fn new(outcomes: impl IntoIterator<Item = FetchOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            fallback: FetchOutcome::Fatal("script exhausted".to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Always succeed with `chunks`
    pub fn always(chunks: Vec<Chunk>) -> Self {
        Self::new(Vec::new()).with_fallback(FetchOutcome::Success {
            chunks,
            lang: "en".to_string(),
        })
    }

    /// Outcome used once the script is exhausted
    pub fn with_fallback(mut self, outcome: FetchOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Sleep before answering, for cancellation tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn next_outcome(&self) -> FetchOutcome {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Convenience success outcome with English captions
pub fn success(chunks: Vec<Chunk>) -> FetchOutcome {
    FetchOutcome::Success {
        chunks,
        lang: "en".to_string(),
    }
}

#[async_trait]
impl CaptionProvider for ScriptedProvider {
    async fn fetch_captions(&self, video_id: &str, egress: Option<&str>, auth: Option<&AuthToken>) -> FetchOutcome {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                video_id: video_id.to_string(),
                egress: egress.map(str::to_string),
                authenticated: auth.is_some(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_outcome()
    }
}
