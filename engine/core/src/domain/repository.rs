// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root, following the DDD
//! Repository pattern: one repository per aggregate, interface defined in
//! the domain layer, implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `TaskRepository` | `ResearchTask` | `InMemoryTaskRepository` |
//! | `ScoreRepository` | `ProspectScoreRecord` | `InMemoryScoreRepository` |
//!
//! In-memory implementations serve development and testing; durable
//! backends are the persistence collaborator's concern.

use crate::domain::score::ProspectScoreRecord;
use crate::domain::task::{ProspectKey, ResearchTask, TaskId, TaskStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Repository interface for ResearchTask aggregates
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Save task (create or update)
    async fn save(&self, task: &ResearchTask) -> Result<(), RepositoryError>;

    /// Find task by ID
    async fn find_by_id(&self, id: TaskId) -> Result<Option<ResearchTask>, RepositoryError>;

    /// List tasks, optionally filtered by status, newest first
    async fn list(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<ResearchTask>, RepositoryError>;
}

/// Repository interface for ProspectScoreRecord aggregates.
///
/// Only the latest record per key is retained: the orchestrator replaces it
/// on each successful run, and a failed run leaves the previous record in
/// place (stale-but-available).
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn save(&self, record: &ProspectScoreRecord) -> Result<(), RepositoryError>;

    async fn find_latest(
        &self,
        key: &ProspectKey,
    ) -> Result<Option<ProspectScoreRecord>, RepositoryError>;
}
