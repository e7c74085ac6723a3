// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Research Task Orchestrator Application Service
//!
//! Schedules, deduplicates, and retries the research pipeline per
//! `(consultant_type, prospect_id)` key.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive collector → extractor → aggregator → scoring runs
//!   as observable background tasks
//! - **Dependencies:** Domain (task, collector, repository ports),
//!   Infrastructure (event bus)
//!
//! # Scheduling Model
//!
//! A fixed pool of workers pulls tasks from a priority queue (higher
//! priority first, FIFO among equals). The `active` map holds the single
//! queued-or-running task per key; duplicate submits coalesce onto it. That
//! at-most-one-active-task invariant is also what serializes absorbs into a
//! prospect's aggregator — the running task takes the aggregator out of the
//! arena and owns it exclusively for the whole run.

use crate::application::aggregator::ProspectAggregator;
use crate::application::extractor::SignalExtractor;
use crate::application::registry::TemplateRegistry;
use crate::application::scoring::ScoringEngine;
use crate::domain::collector::{DocumentCollector, ProspectIdentity};
use crate::domain::document::DocumentId;
use crate::domain::events::ResearchEvent;
use crate::domain::repository::{ScoreRepository, TaskRepository};
use crate::domain::score::{InputSignature, ProspectScoreRecord};
use crate::domain::task::{ProspectKey, ResearchTask, TaskErrorKind, TaskId, TaskStatus};
use crate::domain::template::{ConsultantTemplate, ConsultantType};
use crate::infrastructure::event_bus::EventBus;
use anyhow::{anyhow, Result};
use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of pool workers pulling research tasks
    pub worker_count: usize,
    /// Attempt cap for transient collector failures
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_base_delay: Duration,
    /// Per-document fetch timeout
    pub fetch_timeout: Duration,
    /// Wall-clock budget for a whole task; documents not fetched in time
    /// degrade the run to `partial`, they do not fail it
    pub task_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(10),
            task_budget: Duration::from_secs(30),
        }
    }
}

/// Queue entry ordering: higher priority first, FIFO among equals via a
/// monotone sequence number.
struct QueuedEntry {
    priority: u8,
    seq: u64,
    task_id: TaskId,
    key: ProspectKey,
    identity: ProspectIdentity,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedEntry {}

impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Outcome of one whole attempt (discovery plus fetch loop).
struct AttemptRun {
    document_ids: Vec<DocumentId>,
    failed_sources: usize,
    budget_expired: bool,
}

enum AttemptError {
    Transient(String),
    Fatal(String),
    Cancelled,
}

pub struct ResearchOrchestrator {
    registry: Arc<TemplateRegistry>,
    collector: Arc<dyn DocumentCollector>,
    tasks: Arc<dyn TaskRepository>,
    scores: Arc<dyn ScoreRepository>,
    event_bus: Arc<EventBus>,
    config: OrchestratorConfig,

    queue: Mutex<BinaryHeap<QueuedEntry>>,
    queue_notify: Notify,
    seq: AtomicU64,

    /// The one queued-or-running task per prospect key
    active: DashMap<ProspectKey, TaskId>,
    cancellations: DashMap<TaskId, CancellationToken>,
    /// Per-prospect aggregator arena; the running task removes its entry and
    /// reinserts it when done, so absorbs never interleave across tasks
    aggregators: Mutex<HashMap<ProspectKey, ProspectAggregator>>,

    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ResearchOrchestrator {
    /// Build the orchestrator and spawn its worker pool.
    pub fn start(
        registry: Arc<TemplateRegistry>,
        collector: Arc<dyn DocumentCollector>,
        tasks: Arc<dyn TaskRepository>,
        scores: Arc<dyn ScoreRepository>,
        event_bus: Arc<EventBus>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            registry,
            collector,
            tasks,
            scores,
            event_bus,
            config,
            queue: Mutex::new(BinaryHeap::new()),
            queue_notify: Notify::new(),
            seq: AtomicU64::new(0),
            active: DashMap::new(),
            cancellations: DashMap::new(),
            aggregators: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        });

        let mut workers = orchestrator.workers.lock();
        for worker_id in 0..orchestrator.config.worker_count {
            let this = Arc::clone(&orchestrator);
            workers.push(tokio::spawn(async move {
                this.worker_loop(worker_id).await;
            }));
        }
        drop(workers);
        orchestrator
    }

    /// Enqueue a research run, coalescing onto any active task for the same
    /// key and short-circuiting to the cached record when the input
    /// signature is unchanged.
    ///
    /// Always returns a `TaskId`: coalesced submits get the existing id, a
    /// cache hit gets a task that is already `Completed`.
    pub async fn submit_research(
        &self,
        consultant_type: ConsultantType,
        identity: ProspectIdentity,
        priority: u8,
    ) -> Result<TaskId> {
        // Caller error, surfaced immediately, never queued.
        let template = self.registry.get(&consultant_type).map_err(|e| anyhow!(e))?;

        let key = ProspectKey::new(consultant_type, identity.prospect_id.clone());
        counter!("prospect_engine_tasks_submitted_total").increment(1);

        if let Some(existing) = self.active.get(&key).map(|entry| *entry.value()) {
            return Ok(self.coalesce(existing, &key));
        }

        if let Some(cached) = self.cache_lookup(&template, &identity, &key).await? {
            return Ok(cached);
        }

        let task = ResearchTask::new(key.clone(), priority);
        let task_id = task.id;

        // Entry API makes the check-and-insert atomic under racing submits.
        match self.active.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                return Ok(self.coalesce(*occupied.get(), &key));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(task_id);
            }
        }

        self.cancellations.insert(task_id, CancellationToken::new());
        if let Err(e) = self.tasks.save(&task).await {
            self.active.remove(&key);
            self.cancellations.remove(&task_id);
            return Err(anyhow!("Failed to persist task: {e}"));
        }

        self.event_bus.publish(ResearchEvent::TaskQueued {
            task_id,
            key: key.clone(),
            priority,
            queued_at: Utc::now(),
        });
        debug!(%task_id, prospect = %key.prospect_id, priority, "Research task queued");

        self.queue.lock().push(QueuedEntry {
            priority,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            task_id,
            key,
            identity,
        });
        self.queue_notify.notify_one();
        Ok(task_id)
    }

    pub async fn get_task_status(&self, task_id: TaskId) -> Result<ResearchTask> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| anyhow!("Task {task_id} not found"))
    }

    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<ResearchTask>> {
        Ok(self.tasks.list(status).await?)
    }

    /// Latest score for a key, stale-but-available: a failed run never
    /// erases the record from the last successful one.
    pub async fn get_score(&self, key: &ProspectKey) -> Result<Option<ProspectScoreRecord>> {
        Ok(self.scores.find_latest(key).await?)
    }

    /// Request cooperative cancellation. The task observes the token between
    /// document-fetch steps; returns false when the task is unknown or
    /// already terminal.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        match self.cancellations.get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Block until the task reaches a terminal status.
    pub async fn wait(&self, task_id: TaskId) -> Result<ResearchTask> {
        let mut receiver = self.event_bus.subscribe_task(task_id);
        loop {
            let task = self.get_task_status(task_id).await?;
            if task.status.is_terminal() {
                return Ok(task);
            }
            // Subscribe-then-check above makes this race-free; lag just
            // triggers another status check.
            let _ = receiver.recv().await;
        }
    }

    /// Stop accepting work and wait for workers to drain.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.queue_notify.notify_waiters();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!("Worker terminated abnormally: {e}");
            }
        }
    }

    fn coalesce(&self, existing: TaskId, key: &ProspectKey) -> TaskId {
        counter!("prospect_engine_tasks_coalesced_total").increment(1);
        self.event_bus.publish(ResearchEvent::TaskCoalesced {
            task_id: existing,
            key: key.clone(),
            coalesced_at: Utc::now(),
        });
        debug!(task_id = %existing, prospect = %key.prospect_id, "Submit coalesced onto active task");
        existing
    }

    async fn cache_lookup(
        &self,
        template: &ConsultantTemplate,
        identity: &ProspectIdentity,
        key: &ProspectKey,
    ) -> Result<Option<TaskId>> {
        let signature = InputSignature::compute(template, identity);
        let latest = self.scores.find_latest(key).await?;
        let Some(record) = latest else {
            return Ok(None);
        };
        if record.input_signature != signature {
            return Ok(None);
        }

        let mut task = ResearchTask::new(key.clone(), 0);
        task.complete_from_cache()
            .map_err(|e| anyhow!("Cache-hit task transition failed: {e}"))?;
        self.tasks.save(&task).await?;

        counter!("prospect_engine_cache_hits_total").increment(1);
        self.event_bus.publish(ResearchEvent::CacheHit {
            task_id: task.id,
            key: key.clone(),
            hit_at: Utc::now(),
        });
        debug!(task_id = %task.id, prospect = %key.prospect_id, "Unchanged input signature, served cached record");
        Ok(Some(task.id))
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        debug!(worker_id, "Research worker started");
        loop {
            while let Some(entry) = self.pop_queue() {
                if let Err(e) = self.execute_task(entry).await {
                    warn!(worker_id, "Task execution error: {e:#}");
                }
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.queue_notify.notified() => {}
            }
        }
        debug!(worker_id, "Research worker stopped");
    }

    fn pop_queue(&self) -> Option<QueuedEntry> {
        self.queue.lock().pop()
    }

    async fn execute_task(&self, entry: QueuedEntry) -> Result<()> {
        let QueuedEntry {
            task_id,
            key,
            identity,
            ..
        } = entry;

        let outcome = self.run_to_terminal(task_id, &key, &identity).await;

        // Unconditional: a leaked entry would make every future submit for
        // this key coalesce onto a task that no longer runs.
        self.active.remove(&key);
        self.cancellations.remove(&task_id);
        outcome
    }

    async fn run_to_terminal(
        &self,
        task_id: TaskId,
        key: &ProspectKey,
        identity: &ProspectIdentity,
    ) -> Result<()> {
        let mut task = self.get_task_status(task_id).await?;
        let token = self
            .cancellations
            .get(&task_id)
            .map(|t| t.value().clone())
            .unwrap_or_default();

        task.start().map_err(|e| anyhow!(e))?;
        self.tasks.save(&task).await?;

        // Aggregator ownership handoff: this task is the single writer for
        // the key until it finishes.
        let mut aggregator = self
            .aggregators
            .lock()
            .remove(key)
            .unwrap_or_else(ProspectAggregator::new);

        let outcome = self
            .run_task(&mut task, key, identity, &token, &mut aggregator)
            .await;

        self.aggregators.lock().insert(key.clone(), aggregator);

        match outcome {
            Ok(record) => {
                task.complete().map_err(|e| anyhow!(e))?;
                if let Err(e) = self.tasks.save(&task).await {
                    warn!(%task_id, "Failed to persist completed task: {e}");
                }
                counter!("prospect_engine_tasks_completed_total").increment(1);
                self.event_bus.publish(ResearchEvent::TaskCompleted {
                    task_id,
                    key: key.clone(),
                    overall_score: record.overall_score,
                    partial: record.partial,
                    completed_at: Utc::now(),
                });
                info!(
                    %task_id,
                    prospect = %key.prospect_id,
                    overall_score = record.overall_score,
                    partial = record.partial,
                    "Research task completed"
                );
            }
            Err(kind) => {
                task.fail(kind).map_err(|e| anyhow!(e))?;
                if let Err(e) = self.tasks.save(&task).await {
                    warn!(%task_id, "Failed to persist failed task: {e}");
                }
                counter!("prospect_engine_tasks_failed_total").increment(1);
                self.event_bus.publish(ResearchEvent::TaskFailed {
                    task_id,
                    key: key.clone(),
                    error_kind: kind,
                    failed_at: Utc::now(),
                });
                warn!(%task_id, prospect = %key.prospect_id, ?kind, "Research task failed");
            }
        }
        Ok(())
    }

    /// Attempt loop with exponential backoff for transient failures. On
    /// success, scores the aggregated signal set and persists the record.
    async fn run_task(
        &self,
        task: &mut ResearchTask,
        key: &ProspectKey,
        identity: &ProspectIdentity,
        token: &CancellationToken,
        aggregator: &mut ProspectAggregator,
    ) -> std::result::Result<ProspectScoreRecord, TaskErrorKind> {
        // Template missing at execution time is a configuration error, not
        // retryable.
        let template = match self.registry.get(&key.consultant_type) {
            Ok(template) => template,
            Err(e) => {
                warn!(task_id = %task.id, "Template lookup failed: {e}");
                return Err(TaskErrorKind::ConfigurationError);
            }
        };

        let run = loop {
            if token.is_cancelled() {
                return Err(TaskErrorKind::Cancelled);
            }
            task.record_attempt();
            if let Err(e) = self.tasks.save(task).await {
                warn!(task_id = %task.id, "Failed to persist attempt count: {e}");
            }
            self.event_bus.publish(ResearchEvent::TaskStarted {
                task_id: task.id,
                key: key.clone(),
                attempt: task.attempt_count,
                started_at: Utc::now(),
            });

            match self
                .run_attempt(task.id, identity, &template, token, aggregator)
                .await
            {
                Ok(run) => break run,
                Err(AttemptError::Cancelled) => return Err(TaskErrorKind::Cancelled),
                Err(AttemptError::Fatal(reason)) => {
                    warn!(task_id = %task.id, reason, "Non-transient failure, not retrying");
                    return Err(TaskErrorKind::ConfigurationError);
                }
                Err(AttemptError::Transient(reason)) => {
                    if task.attempt_count >= self.config.max_attempts {
                        warn!(
                            task_id = %task.id,
                            attempts = task.attempt_count,
                            reason,
                            "Retry budget exhausted"
                        );
                        return Err(TaskErrorKind::SourceUnavailable);
                    }
                    let delay = self.config.retry_base_delay
                        * 2_u32.saturating_pow(task.attempt_count.saturating_sub(1));
                    debug!(
                        task_id = %task.id,
                        attempt = task.attempt_count,
                        delay_ms = delay.as_millis() as u64,
                        reason,
                        "Transient failure, backing off"
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Err(TaskErrorKind::Cancelled),
                        _ = sleep(delay) => {}
                    }
                }
            }
        };

        let partial = run.failed_sources > 0 || run.budget_expired;
        let record = ScoringEngine::score(
            aggregator.snapshot(),
            &template,
            identity,
            run.document_ids,
            partial,
            Utc::now(),
        )
        .map_err(|e| {
            // A scoring bug must fail the task rather than emit an
            // untrustworthy record.
            warn!(task_id = %task.id, "Scoring failed: {e}");
            TaskErrorKind::ConfigurationError
        })?;

        if let Err(e) = self.scores.save(&record).await {
            warn!(task_id = %task.id, "Failed to persist score record: {e}");
            return Err(TaskErrorKind::ConfigurationError);
        }
        Ok(record)
    }

    /// One pass over the collector's sources. Per-document failures are
    /// recorded and never abort the pass; an attempt only fails as a whole
    /// when it produced no documents at all.
    async fn run_attempt(
        &self,
        task_id: TaskId,
        identity: &ProspectIdentity,
        template: &ConsultantTemplate,
        token: &CancellationToken,
        aggregator: &mut ProspectAggregator,
    ) -> std::result::Result<AttemptRun, AttemptError> {
        let deadline = Instant::now() + self.config.task_budget;

        let sources = self
            .collector
            .discover_sources(identity)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    AttemptError::Transient(format!("Source discovery failed: {e}"))
                } else {
                    AttemptError::Fatal(format!("Source discovery failed: {e}"))
                }
            })?;

        let mut document_ids = Vec::new();
        let mut failed_sources = 0usize;
        let mut transient_failures = 0usize;
        let mut budget_expired = false;

        for source in &sources {
            // Cancellation and budget are checked between fetch steps only,
            // so a document is always absorbed as a whole or not at all.
            if token.is_cancelled() {
                return Err(AttemptError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(%task_id, source, "Task budget expired, degrading to partial");
                budget_expired = true;
                break;
            }
            let fetch_window = self.config.fetch_timeout.min(deadline - now);

            match timeout(fetch_window, self.collector.fetch(identity, source)).await {
                Err(_) => {
                    failed_sources += 1;
                    transient_failures += 1;
                    counter!("prospect_engine_documents_failed_total").increment(1);
                    self.event_bus.publish(ResearchEvent::DocumentFailed {
                        task_id,
                        source: source.clone(),
                        reason: "fetch timed out".to_string(),
                        failed_at: Utc::now(),
                    });
                }
                Ok(Err(e)) => {
                    failed_sources += 1;
                    if e.is_transient() {
                        transient_failures += 1;
                    }
                    counter!("prospect_engine_documents_failed_total").increment(1);
                    self.event_bus.publish(ResearchEvent::DocumentFailed {
                        task_id,
                        source: source.clone(),
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    });
                    debug!(%task_id, source, "Document fetch failed: {e}");
                }
                Ok(Ok(document)) => {
                    counter!("prospect_engine_documents_fetched_total").increment(1);
                    self.event_bus.publish(ResearchEvent::DocumentFetched {
                        task_id,
                        document_id: document.id.clone(),
                        source: source.clone(),
                        fetched_at: Utc::now(),
                    });

                    let observations = SignalExtractor::extract(&document, template);
                    let now = Utc::now();
                    for observation in observations {
                        let Some(pattern) = template.pattern(&observation.pattern_name) else {
                            continue;
                        };
                        self.event_bus.publish(ResearchEvent::SignalObserved {
                            task_id,
                            pattern_name: observation.pattern_name.clone(),
                            confidence: observation.confidence,
                            document_id: observation.source_document_id.clone(),
                            observed_at: observation.observed_at,
                        });
                        aggregator.absorb(observation, pattern, now);
                    }
                    document_ids.push(document.id);
                }
            }
        }

        if document_ids.is_empty()
            && failed_sources > 0
            && transient_failures == failed_sources
            && !budget_expired
        {
            return Err(AttemptError::Transient(format!(
                "All {failed_sources} source fetches failed transiently"
            )));
        }

        Ok(AttemptRun {
            document_ids,
            failed_sources,
            budget_expired,
        })
    }
}
