// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a collected document (source URL or collector-assigned id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a document came from. Mirrors the collector's target taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    PressRelease,
    NewsArticle,
    JobPosting,
    Filing,
    CompanyPage,
    IndustryReport,
    Other,
}

/// A single collected document. Produced by the document collector,
/// consumed (never mutated) by the signal extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub source_type: SourceType,
    pub retrieved_at: DateTime<Utc>,
    /// Plain-text content. Untrusted input: may be empty or garbage.
    pub content: String,
}

impl DocumentRecord {
    pub fn new(
        id: impl Into<String>,
        source_type: SourceType,
        retrieved_at: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(id),
            source_type,
            retrieved_at,
            content: content.into(),
        }
    }
}
