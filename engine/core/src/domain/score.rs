// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::collector::ProspectIdentity;
use crate::domain::document::DocumentId;
use crate::domain::signal::ProspectSignal;
use crate::domain::template::{ConsultantTemplate, ConsultantType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash of the inputs a score was computed from, used for cache-hit checks.
///
/// Covers what is knowable without invoking the collector: the template
/// fingerprint plus the prospect identity and its sorted source hints. A
/// template or hint change invalidates the cached record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSignature(String);

impl InputSignature {
    pub fn compute(template: &ConsultantTemplate, identity: &ProspectIdentity) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(template.fingerprint().as_bytes());
        hasher.update(identity.prospect_id.as_bytes());
        hasher.update(identity.company_name.as_bytes());
        let mut hints = identity.source_hints.clone();
        hints.sort();
        for hint in hints {
            hasher.update(hint.as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The scoring engine's output for one prospect: the overall score plus the
/// explainable breakdown it was derived from.
///
/// # Invariants
/// - `overall_score` is always derivable purely from `signal_breakdown`
/// - `signal_breakdown` is sorted by `relevance_score` descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectScoreRecord {
    pub prospect_id: String,
    pub consultant_type: ConsultantType,
    pub overall_score: f64,
    pub signal_breakdown: Vec<ProspectSignal>,
    /// Documents that contributed to this run (audit trail, not part of the
    /// input signature)
    pub document_ids: Vec<DocumentId>,
    /// True when the run had reduced document coverage (fetch failures or
    /// budget expiry). Not an error: the score is still usable.
    pub partial: bool,
    pub computed_at: DateTime<Utc>,
    pub input_signature: InputSignature,
}
