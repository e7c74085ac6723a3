// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document Collector Port
//!
//! The collector is an external collaborator: it owns fetching, parsing,
//! robots/rate-limit behavior. The engine only depends on this interface.
//! Infrastructure provides a fixture implementation for development and
//! testing.

use crate::domain::document::DocumentRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of the organization being researched, plus hints about where
/// the collector should look.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProspectIdentity {
    pub prospect_id: String,
    pub company_name: String,
    /// Source hints (domains, feeds, registries). Order is not significant;
    /// signatures sort them before hashing.
    pub source_hints: Vec<String>,
}

impl ProspectIdentity {
    pub fn new(
        prospect_id: impl Into<String>,
        company_name: impl Into<String>,
        source_hints: Vec<String>,
    ) -> Self {
        Self {
            prospect_id: prospect_id.into(),
            company_name: company_name.into(),
            source_hints,
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectorError {
    /// Timeouts, 5xx, connection resets — worth retrying
    #[error("Transient collector failure: {0}")]
    Transient(String),
    /// Malformed source, permanent denial — retrying will not help
    #[error("Permanent collector failure: {0}")]
    Permanent(String),
}

impl CollectorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CollectorError::Transient(_))
    }
}

/// Port for the external document collector.
///
/// `discover_sources` resolves the concrete source list for a prospect;
/// `fetch` retrieves one source. The orchestrator drives fetches one source
/// at a time so cancellation and time budgets can be checked between steps.
#[async_trait]
pub trait DocumentCollector: Send + Sync {
    async fn discover_sources(
        &self,
        identity: &ProspectIdentity,
    ) -> Result<Vec<String>, CollectorError>;

    async fn fetch(
        &self,
        identity: &ProspectIdentity,
        source: &str,
    ) -> Result<DocumentRecord, CollectorError>;
}
