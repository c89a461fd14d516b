use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::app_config::Config;
use crate::database::{PendingItem, PersistenceGateway, SENTINEL_TEXT};
use crate::providers::{AuthToken, CaptionProvider, FetchOutcome};
use crate::proxy::ProxyRotator;
use crate::sentence_window::{WindowFinder, WindowResult};

// @module: Batch controller driving fetch, retry, rotation and persistence

/// Attempts spent on one item
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    // @field: Fetch attempts made
    pub attempts: u32,
    // @field: Rotations requested after rate limiting
    pub rotations: u32,
}

/// Terminal state of one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Window found and stored
    Succeeded { window: WindowResult, record: AttemptRecord },
    /// Provider has no captions for the video; placeholder stored
    NoCaptionsRecorded,
    /// Captions fetched but the word is not in them; placeholder stored
    WordNotFound,
    /// Retries exhausted or a fatal failure; nothing stored
    GaveUp { reason: String, record: AttemptRecord },
    /// Row lacks a word or a video id; nothing stored
    Skipped,
    /// Interrupt received before the item finished; nothing stored
    Interrupted,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Why the batch stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTermination {
    /// Nothing was selected
    NoPendingItems,
    /// Every selected item was handled
    Completed,
    /// Consecutive failures hit the configured ceiling
    ErrorCeilingReached,
    /// External interrupt
    Interrupted,
}

impl fmt::Display for BatchTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPendingItems => write!(f, "no remaining items"),
            Self::Completed => write!(f, "completed"),
            Self::ErrorCeilingReached => write!(f, "error ceiling reached"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Counts for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    // @field: Items selected
    pub selected: usize,
    // @field: Items that reached a terminal state
    pub processed: usize,
    pub succeeded: usize,
    // @field: Placeholder writes (no captions or word not found)
    pub sentinels: usize,
    pub gave_up: usize,
    pub skipped: usize,
    pub termination: BatchTermination,
}

impl BatchReport {
    fn new(selected: usize) -> Self {
        Self {
            selected,
            processed: 0,
            succeeded: 0,
            sentinels: 0,
            gave_up: 0,
            skipped: 0,
            termination: BatchTermination::Completed,
        }
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Interrupted => return,
            ItemOutcome::Succeeded { .. } => self.succeeded += 1,
            ItemOutcome::NoCaptionsRecorded | ItemOutcome::WordNotFound => self.sentinels += 1,
            ItemOutcome::GaveUp { .. } => self.gave_up += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
        self.processed += 1;
    }

    /// Items that did not end with a stored window
    pub fn not_succeeded(&self) -> usize {
        self.selected - self.succeeded
    }
}

/// Processes pending rows one at a time
pub struct Controller<P, G> {
    // @field: App configuration
    config: Config,
    provider: P,
    gateway: G,
    rotator: ProxyRotator,
    finder: WindowFinder,
    auth: Option<AuthToken>,
    interrupt: watch::Receiver<bool>,
    // @field: Failures since the last successful fetch, across items
    consecutive_failures: u32,
}

impl<P: CaptionProvider, G: PersistenceGateway> Controller<P, G> {
    /// Create a controller; the rotator must match `config.egress`
    pub fn new(config: Config, provider: P, gateway: G, rotator: ProxyRotator) -> Self {
        let finder = WindowFinder::new(config.window.max_expand, config.window.max_duration_secs);
        let auth = config.provider.auth_token.clone().map(AuthToken::new);
        // sender dropped: never interrupted
        let (_, interrupt) = watch::channel(false);

        Self {
            config,
            provider,
            gateway,
            rotator,
            finder,
            auth,
            interrupt,
            consecutive_failures: 0,
        }
    }

    /// Stop between attempts once `interrupt` flips to `true`
    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn rotator(&self) -> &ProxyRotator {
        &self.rotator
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Select pending rows and process them in order until done, halted or interrupted
    pub async fn run_batch(&mut self) -> Result<BatchReport> {
        let items = self
            .gateway
            .select_pending(self.config.batch.limit, self.config.batch.reprocess_threshold())
            .await
            .context("Failed to select pending words")?;

        let mut report = BatchReport::new(items.len());
        if items.is_empty() {
            info!("✨ No words to process");
            report.termination = BatchTermination::NoPendingItems;
            return Ok(report);
        }

        info!("📋 {} word(s) to process via {}", items.len(), self.rotator.describe());
        if let Some(proxy) = self.rotator.current() {
            info!("🌐 Proxy: {}", proxy);
        }

        let total = items.len();
        for (index, item) in items.iter().enumerate() {
            let outcome = self.process_item(item).await?;
            log_outcome(index + 1, total, item, &outcome);
            report.record(&outcome);

            if outcome == ItemOutcome::Interrupted {
                report.termination = BatchTermination::Interrupted;
                break;
            }

            if self.consecutive_failures >= self.config.batch.max_consecutive_errors {
                error!("🛑 {} consecutive failures, stopping", self.consecutive_failures);
                report.termination = BatchTermination::ErrorCeilingReached;
                break;
            }

            let is_last = index + 1 == total;
            if !is_last && outcome != ItemOutcome::Skipped && !self.pause().await {
                report.termination = BatchTermination::Interrupted;
                break;
            }
        }

        info!(
            "🏁 Done ({}): ✅ {}  ❌ {}  (placeholders {}, gave up {}, skipped {})",
            report.termination,
            report.succeeded,
            report.not_succeeded(),
            report.sentinels,
            report.gave_up,
            report.skipped
        );
        Ok(report)
    }

    /// Drive one item to a terminal state, persisting its outcome
    pub async fn process_item(&mut self, item: &PendingItem) -> Result<ItemOutcome> {
        if !item.is_processable() {
            return Ok(ItemOutcome::Skipped);
        }

        let ceiling = self.rotator.retry_ceiling(self.config.batch.max_retries);
        let mut record = AttemptRecord::default();

        let (chunks, lang) = loop {
            record.attempts += 1;
            let fetch = self
                .provider
                .fetch_captions(&item.video_id, self.rotator.current(), self.auth.as_ref());
            let Some(outcome) = until_interrupted(&mut self.interrupt, fetch).await else {
                return Ok(ItemOutcome::Interrupted);
            };

            match outcome {
                FetchOutcome::Success { chunks, lang } => {
                    self.consecutive_failures = 0;
                    break (chunks, lang);
                }
                FetchOutcome::NoCaptions => {
                    self.gateway.write_sentinel(item.id, SENTINEL_TEXT).await?;
                    return Ok(ItemOutcome::NoCaptionsRecorded);
                }
                FetchOutcome::RateLimited(detail) if record.rotations < ceiling => {
                    record.rotations += 1;
                    debug!(
                        "Rate limited on '{}' ({}), rotating (attempt {}): {}",
                        item.word, item.video_id, record.attempts, detail
                    );
                    if until_interrupted(&mut self.interrupt, self.rotator.rotate()).await.is_none() {
                        return Ok(ItemOutcome::Interrupted);
                    }
                }
                FetchOutcome::RateLimited(detail) => {
                    self.consecutive_failures += 1;
                    return Ok(ItemOutcome::GaveUp {
                        reason: format!("rate limited, {} attempt(s) exhausted: {}", record.attempts, detail),
                        record,
                    });
                }
                FetchOutcome::Fatal(detail) => {
                    self.consecutive_failures += 1;
                    return Ok(ItemOutcome::GaveUp { reason: detail, record });
                }
            }
        };

        match self.finder.find(&chunks, &item.word) {
            Some(window) => {
                self.gateway.write_result(item.id, &window, &lang, Utc::now()).await?;
                Ok(ItemOutcome::Succeeded { window, record })
            }
            None => {
                self.gateway.write_sentinel(item.id, SENTINEL_TEXT).await?;
                Ok(ItemOutcome::WordNotFound)
            }
        }
    }

    /// Randomized pause between items; `false` when interrupted
    async fn pause(&mut self) -> bool {
        let (min, max) = self.config.batch.pause_range();
        let secs = rand::rng().random_range(min.as_secs_f64()..=max.as_secs_f64());
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(max);
        debug!("Sleeping {:.1}s before next word", secs);
        until_interrupted(&mut self.interrupt, tokio::time::sleep(delay))
            .await
            .is_some()
    }
}

/// Run `work` unless the interrupt flag is or becomes set
async fn until_interrupted<F: Future>(interrupt: &mut watch::Receiver<bool>, work: F) -> Option<F::Output> {
    if *interrupt.borrow() {
        return None;
    }
    tokio::select! {
        biased;
        _ = interrupted(interrupt) => None,
        output = work => Some(output),
    }
}

async fn interrupted(interrupt: &mut watch::Receiver<bool>) {
    if interrupt.wait_for(|flag| *flag).await.is_err() {
        // no sender left, so no interrupt can arrive
        std::future::pending::<()>().await;
    }
}

fn log_outcome(index: usize, total: usize, item: &PendingItem, outcome: &ItemOutcome) {
    let prefix = format!("[{}/{}] '{}' ({})", index, total, item.word, item.video_id);
    match outcome {
        ItemOutcome::Succeeded { window, .. } => {
            let preview: String = window.sentence.chars().take(70).collect();
            let ellipsis = if window.sentence.chars().count() > 70 { "…" } else { "" };
            info!("{} ... ✅ [{}s–{}s] «{}{}»", prefix, window.start, window.end, preview, ellipsis);
        }
        ItemOutcome::NoCaptionsRecorded => warn!("{} ... ⚠️ no captions", prefix),
        ItemOutcome::WordNotFound => warn!("{} ... ⚠️ word not found in captions", prefix),
        ItemOutcome::GaveUp { reason, .. } => {
            let reason: String = reason.chars().take(80).collect();
            warn!("{} ... ❌ {}", prefix, reason);
        }
        ItemOutcome::Skipped => debug!("{} ... skipped (missing word or video)", prefix),
        ItemOutcome::Interrupted => warn!("{} ... ⛔ interrupted", prefix),
    }
}
