// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Research Task Domain Model
//!
//! A `ResearchTask` tracks one background research run for a
//! `(consultant_type, prospect_id)` key. Status transitions are the only
//! mutations allowed; a task is terminal once `Completed` or `Failed`.

use crate::domain::template::ConsultantType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coalescing key: at most one task may be active per key at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProspectKey {
    pub consultant_type: ConsultantType,
    pub prospect_id: String,
}

impl ProspectKey {
    pub fn new(consultant_type: ConsultantType, prospect_id: impl Into<String>) -> Self {
        Self {
            consultant_type,
            prospect_id: prospect_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Failure taxonomy surfaced to whoever polls task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// Transient collector failure that outlived the retry budget
    SourceUnavailable,
    /// Missing template or a logic error — fatal, never retried
    ConfigurationError,
    /// Cooperative cancellation between document-fetch steps
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTask {
    pub id: TaskId,
    pub key: ProspectKey,
    pub status: TaskStatus,
    /// Higher runs first; FIFO among equals
    pub priority: u8,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_kind: Option<TaskErrorKind>,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

impl ResearchTask {
    pub fn new(key: ProspectKey, priority: u8) -> Self {
        Self {
            id: TaskId::new(),
            key,
            status: TaskStatus::Queued,
            priority,
            attempt_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_kind: None,
        }
    }

    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Queued {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Running,
            });
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn record_attempt(&mut self) {
        self.attempt_count += 1;
    }

    pub fn complete(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Running {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Completed,
            });
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark a submit-time cache hit: the task completes without ever running.
    pub fn complete_from_cache(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Queued {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Completed,
            });
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, kind: TaskErrorKind) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Failed,
            });
        }
        self.status = TaskStatus::Failed;
        self.error_kind = Some(kind);
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
