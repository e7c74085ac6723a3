// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Signal Domain Model
//!
//! `SignalObservation` is the extractor's per-document finding;
//! `ProspectSignal` is the aggregator's deduplicated, decayed view of one
//! pattern across all documents seen for a prospect.

use crate::domain::document::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on retained evidence per signal. Lowest-confidence entries
/// are evicted first; ties evict the older timestamp.
pub const MAX_SUPPORTING_OBSERVATIONS: usize = 5;

/// One pattern match inside one document. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalObservation {
    pub pattern_name: String,
    /// Strength estimate in [0,1] that the pattern truly matched
    pub confidence: f64,
    pub source_document_id: DocumentId,
    pub observed_at: DateTime<Utc>,
    pub evidence_excerpt: String,
}

/// Aggregated, deduplicated view of one pattern for one prospect.
///
/// Owned exclusively by the aggregator for that prospect; recomputed as a
/// whole whenever a new observation arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectSignal {
    pub pattern_name: String,
    /// Time-decayed, multi-source-combined confidence in [0,1]
    pub effective_confidence: f64,
    /// Bounded evidence list, most relevant first
    pub supporting_observations: Vec<SignalObservation>,
    /// `effective_confidence * pattern.weight`
    pub relevance_score: f64,
}

impl ProspectSignal {
    pub fn from_observation(observation: SignalObservation, weight: f64) -> Self {
        let effective_confidence = observation.confidence;
        Self {
            pattern_name: observation.pattern_name.clone(),
            effective_confidence,
            supporting_observations: vec![observation],
            relevance_score: effective_confidence * weight,
        }
    }

    /// Timestamp of the strongest retained observation, used for rank
    /// tie-breaking in the scoring engine.
    pub fn best_observed_at(&self) -> Option<DateTime<Utc>> {
        self.supporting_observations
            .first()
            .map(|obs| obs.observed_at)
    }

    /// Insert evidence keeping the list sorted by confidence descending and
    /// bounded to `MAX_SUPPORTING_OBSERVATIONS`. One entry per source
    /// document: a repeat observation replaces the existing entry only when
    /// it is stronger.
    pub fn push_supporting(&mut self, observation: SignalObservation) {
        if let Some(existing) = self
            .supporting_observations
            .iter()
            .position(|o| o.source_document_id == observation.source_document_id)
        {
            if self.supporting_observations[existing].confidence >= observation.confidence {
                return;
            }
            self.supporting_observations.remove(existing);
        }
        let at = self
            .supporting_observations
            .iter()
            .position(|existing| {
                observation.confidence > existing.confidence
                    || (observation.confidence == existing.confidence
                        && observation.observed_at > existing.observed_at)
            })
            .unwrap_or(self.supporting_observations.len());
        self.supporting_observations.insert(at, observation);
        self.supporting_observations
            .truncate(MAX_SUPPORTING_OBSERVATIONS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(confidence: f64, secs: i64) -> SignalObservation {
        SignalObservation {
            pattern_name: "p".to_string(),
            confidence,
            source_document_id: DocumentId::new(format!("doc-{secs}")),
            observed_at: DateTime::from_timestamp(secs, 0).unwrap(),
            evidence_excerpt: String::new(),
        }
    }

    #[test]
    fn supporting_observations_stay_bounded_and_sorted() {
        let mut signal = ProspectSignal::from_observation(obs(0.5, 0), 1.0);
        for i in 1..8 {
            signal.push_supporting(obs(0.1 * i as f64, i));
        }
        assert_eq!(
            signal.supporting_observations.len(),
            MAX_SUPPORTING_OBSERVATIONS
        );
        let confidences: Vec<f64> = signal
            .supporting_observations
            .iter()
            .map(|o| o.confidence)
            .collect();
        let mut sorted = confidences.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(confidences, sorted);
    }

    #[test]
    fn same_document_keeps_single_strongest_entry() {
        let mut signal = ProspectSignal::from_observation(obs(0.4, 100), 1.0);
        let mut stronger = obs(0.6, 200);
        stronger.source_document_id = DocumentId::new("doc-100");
        signal.push_supporting(stronger);
        assert_eq!(signal.supporting_observations.len(), 1);
        assert!((signal.supporting_observations[0].confidence - 0.6).abs() < 1e-9);

        let mut weaker = obs(0.3, 300);
        weaker.source_document_id = DocumentId::new("doc-100");
        signal.push_supporting(weaker);
        assert_eq!(signal.supporting_observations.len(), 1);
        assert!((signal.supporting_observations[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn confidence_tie_keeps_most_recent_first() {
        let mut signal = ProspectSignal::from_observation(obs(0.5, 100), 1.0);
        signal.push_supporting(obs(0.5, 200));
        assert_eq!(signal.supporting_observations[0].observed_at.timestamp(), 200);
    }
}
