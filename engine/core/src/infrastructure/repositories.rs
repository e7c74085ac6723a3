// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations for development and testing.
//! Durable backends are the persistence collaborator's concern (the ports
//! live in `domain::repository`).

use crate::domain::repository::{RepositoryError, ScoreRepository, TaskRepository};
use crate::domain::score::ProspectScoreRecord;
use crate::domain::task::{ProspectKey, ResearchTask, TaskId, TaskStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, ResearchTask>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &ResearchTask) -> Result<(), RepositoryError> {
        self.tasks.write().insert(task.id, task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<ResearchTask>, RepositoryError> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<ResearchTask>, RepositoryError> {
        let mut tasks: Vec<ResearchTask> = self
            .tasks
            .read()
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryScoreRepository {
    records: Arc<RwLock<HashMap<ProspectKey, ProspectScoreRecord>>>,
}

impl InMemoryScoreRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreRepository for InMemoryScoreRepository {
    async fn save(&self, record: &ProspectScoreRecord) -> Result<(), RepositoryError> {
        let key = ProspectKey::new(
            record.consultant_type.clone(),
            record.prospect_id.clone(),
        );
        self.records.write().insert(key, record.clone());
        Ok(())
    }

    async fn find_latest(
        &self,
        key: &ProspectKey,
    ) -> Result<Option<ProspectScoreRecord>, RepositoryError> {
        Ok(self.records.read().get(key).cloned())
    }
}
