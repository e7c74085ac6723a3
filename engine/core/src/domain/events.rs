// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::document::DocumentId;
use crate::domain::task::{ProspectKey, TaskErrorKind, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress events published by the research orchestrator.
///
/// Subscribers (CLI progress views, SSE bridges, observers) receive these
/// through the event bus; per-task filtering is available via
/// `EventBus::subscribe_task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResearchEvent {
    TaskQueued {
        task_id: TaskId,
        key: ProspectKey,
        priority: u8,
        queued_at: DateTime<Utc>,
    },
    /// A duplicate submit attached to an already-active task
    TaskCoalesced {
        task_id: TaskId,
        key: ProspectKey,
        coalesced_at: DateTime<Utc>,
    },
    /// Submit satisfied from the cached score record, no collector call
    CacheHit {
        task_id: TaskId,
        key: ProspectKey,
        hit_at: DateTime<Utc>,
    },
    TaskStarted {
        task_id: TaskId,
        key: ProspectKey,
        attempt: u32,
        started_at: DateTime<Utc>,
    },
    DocumentFetched {
        task_id: TaskId,
        document_id: DocumentId,
        source: String,
        fetched_at: DateTime<Utc>,
    },
    DocumentFailed {
        task_id: TaskId,
        source: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    SignalObserved {
        task_id: TaskId,
        pattern_name: String,
        confidence: f64,
        document_id: DocumentId,
        observed_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        key: ProspectKey,
        overall_score: f64,
        partial: bool,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: TaskId,
        key: ProspectKey,
        error_kind: TaskErrorKind,
        failed_at: DateTime<Utc>,
    },
}

impl ResearchEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            ResearchEvent::TaskQueued { task_id, .. }
            | ResearchEvent::TaskCoalesced { task_id, .. }
            | ResearchEvent::CacheHit { task_id, .. }
            | ResearchEvent::TaskStarted { task_id, .. }
            | ResearchEvent::DocumentFetched { task_id, .. }
            | ResearchEvent::DocumentFailed { task_id, .. }
            | ResearchEvent::SignalObserved { task_id, .. }
            | ResearchEvent::TaskCompleted { task_id, .. }
            | ResearchEvent::TaskFailed { task_id, .. } => *task_id,
        }
    }
}
