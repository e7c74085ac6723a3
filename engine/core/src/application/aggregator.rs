// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Signal Aggregator
//!
//! Per-prospect accumulation of observations into deduplicated
//! `ProspectSignal`s. Evidence for the same pattern is merged with noisy-OR,
//! with half-life decay weighting down stale observations.
//!
//! Ownership: an aggregator instance is owned by whichever research task
//! currently holds the running slot for its prospect key. The orchestrator's
//! at-most-one-running-task invariant is what serializes absorbs — there is
//! no internal locking here.

use crate::domain::document::DocumentId;
use crate::domain::signal::{ProspectSignal, SignalObservation};
use crate::domain::template::SignalPattern;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Default)]
pub struct ProspectAggregator {
    signals: HashMap<String, ProspectSignal>,
    /// Contribution already applied per (pattern, document). Re-observing
    /// the same document replaces its contribution instead of corroborating;
    /// only distinct documents combine as independent evidence.
    contributions: HashMap<(String, DocumentId), f64>,
}

impl ProspectAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one observation into the prospect's signal set.
    ///
    /// Combination rule: `eff' = 1 - (1 - eff) * (1 - c * d)` where `c` is
    /// the observation's confidence and `d = 0.5^(age / half_life)` decays
    /// stale evidence (`age` measured from the observation's timestamp to
    /// `now`). The old effective confidence is never scaled down, so the
    /// result is monotonically non-decreasing and caps at 1.0 without
    /// clamping.
    ///
    /// Corroboration requires distinct documents: re-observing a document
    /// that already backs the signal replaces its earlier contribution (if
    /// stronger) instead of stacking it, so re-running research over an
    /// unchanged source set cannot inflate the signal.
    pub fn absorb(
        &mut self,
        observation: SignalObservation,
        pattern: &SignalPattern,
        now: DateTime<Utc>,
    ) {
        let contribution_key = (
            observation.pattern_name.clone(),
            observation.source_document_id.clone(),
        );
        let entry = self.signals.get_mut(&observation.pattern_name);
        match entry {
            None => {
                let signal = ProspectSignal::from_observation(observation, pattern.weight);
                trace!(
                    pattern = %signal.pattern_name,
                    effective_confidence = signal.effective_confidence,
                    "New prospect signal"
                );
                self.contributions
                    .insert(contribution_key, signal.effective_confidence);
                self.signals.insert(signal.pattern_name.clone(), signal);
            }
            Some(signal) => {
                let decayed = observation.confidence
                    * decay_factor(observation.observed_at, now, pattern.decay_half_life);
                let prior = self
                    .contributions
                    .get(&contribution_key)
                    .copied()
                    .unwrap_or(0.0);
                if decayed <= prior || prior >= 1.0 {
                    trace!(
                        pattern = %signal.pattern_name,
                        document = %observation.source_document_id,
                        "Document already contributes at least this much, skipping"
                    );
                    return;
                }
                // Back out the document's previous contribution, then apply
                // the stronger one. Since decayed > prior, the effective
                // confidence never decreases.
                let without = 1.0 - (1.0 - signal.effective_confidence) / (1.0 - prior);
                signal.effective_confidence =
                    1.0 - (1.0 - without.clamp(0.0, 1.0)) * (1.0 - decayed);
                signal.relevance_score = signal.effective_confidence * pattern.weight;
                trace!(
                    pattern = %signal.pattern_name,
                    incoming = observation.confidence,
                    decayed_contribution = decayed,
                    effective_confidence = signal.effective_confidence,
                    "Absorbed corroborating observation"
                );
                self.contributions.insert(contribution_key, decayed);
                signal.push_supporting(observation);
            }
        }
    }

    /// Current signal set, in no particular order (the scoring engine sorts).
    pub fn snapshot(&self) -> Vec<ProspectSignal> {
        self.signals.values().cloned().collect()
    }

    pub fn signal(&self, pattern_name: &str) -> Option<&ProspectSignal> {
        self.signals.get(pattern_name)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// `0.5^(age / half_life)`, with negative ages (clock skew, documents
/// timestamped in the future) treated as zero age.
fn decay_factor(
    observed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life: std::time::Duration,
) -> f64 {
    let age = (now - observed_at).to_std().unwrap_or_default();
    let half_lives = age.as_secs_f64() / half_life.as_secs_f64();
    0.5_f64.powf(half_lives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::DocumentId;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn pattern(half_life_days: u64) -> SignalPattern {
        SignalPattern::new(
            "cmo_departure",
            vec!["chief marketing officer".to_string()],
            vec![],
            0.8,
            0.3,
            Duration::from_secs(86_400 * half_life_days),
        )
        .unwrap()
    }

    fn obs(doc: &str, confidence: f64, observed_at: DateTime<Utc>) -> SignalObservation {
        SignalObservation {
            pattern_name: "cmo_departure".to_string(),
            confidence,
            source_document_id: DocumentId::new(doc),
            observed_at,
            evidence_excerpt: "excerpt".to_string(),
        }
    }

    #[test]
    fn first_observation_seeds_effective_confidence() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        agg.absorb(obs("pr-1", 0.64, now), &pattern(30), now);
        let signal = agg.signal("cmo_departure").unwrap();
        assert!((signal.effective_confidence - 0.64).abs() < 1e-9);
        assert!((signal.relevance_score - 0.64 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn noisy_or_combines_half_and_half_to_three_quarters() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        agg.absorb(obs("pr-1", 0.5, now), &pattern(30), now);
        agg.absorb(obs("pr-2", 0.5, now), &pattern(30), now);
        let signal = agg.signal("cmo_departure").unwrap();
        assert!((signal.effective_confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn same_document_does_not_corroborate() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        agg.absorb(obs("pr-1", 0.64, now), &pattern(30), now);
        // Identical observation from a later re-run over the same source.
        agg.absorb(obs("pr-1", 0.64, now), &pattern(30), now);
        let signal = agg.signal("cmo_departure").unwrap();
        assert!((signal.effective_confidence - 0.64).abs() < 1e-9);
        assert_eq!(signal.supporting_observations.len(), 1);
    }

    #[test]
    fn stronger_reobservation_replaces_contribution() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        agg.absorb(obs("pr-1", 0.4, now), &pattern(30), now);
        // The document now yields richer evidence: its contribution is
        // replaced, not stacked (stacking would give 1 - 0.6 * 0.4 = 0.76).
        agg.absorb(obs("pr-1", 0.6, now), &pattern(30), now);
        let signal = agg.signal("cmo_departure").unwrap();
        assert!((signal.effective_confidence - 0.6).abs() < 1e-6);
        assert_eq!(signal.supporting_observations.len(), 1);
        assert!((signal.supporting_observations[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn stale_corroboration_contributes_less() {
        let now = Utc::now();
        let one_half_life_ago = now - ChronoDuration::days(30);

        let mut fresh = ProspectAggregator::new();
        fresh.absorb(obs("pr-1", 0.5, now), &pattern(30), now);
        fresh.absorb(obs("pr-2", 0.5, now), &pattern(30), now);

        let mut stale = ProspectAggregator::new();
        stale.absorb(obs("pr-1", 0.5, now), &pattern(30), now);
        stale.absorb(obs("pr-2", 0.5, one_half_life_ago), &pattern(30), now);

        let fresh_conf = fresh.signal("cmo_departure").unwrap().effective_confidence;
        let stale_conf = stale.signal("cmo_departure").unwrap().effective_confidence;
        assert!(stale_conf < fresh_conf);
        // 1 - 0.5 * (1 - 0.5 * 0.5) = 0.625
        assert!((stale_conf - 0.625).abs() < 1e-3);
    }

    #[test]
    fn absorb_is_monotone_non_decreasing() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        let mut last = 0.0;
        for (i, (confidence, age_days)) in
            [(0.9, 0), (0.05, 400), (0.3, 10), (0.7, 100)].into_iter().enumerate()
        {
            agg.absorb(
                obs(&format!("doc-{i}"), confidence, now - ChronoDuration::days(age_days)),
                &pattern(30),
                now,
            );
            let current = agg.signal("cmo_departure").unwrap().effective_confidence;
            assert!(current >= last);
            assert!(current <= 1.0);
            last = current;
        }
    }

    #[test]
    fn distinct_patterns_stay_separate() {
        let now = Utc::now();
        let mut agg = ProspectAggregator::new();
        agg.absorb(obs("pr-1", 0.5, now), &pattern(30), now);
        let mut other = obs("pr-1", 0.4, now);
        other.pattern_name = "hiring_surge".to_string();
        let hiring = SignalPattern::new(
            "hiring_surge",
            vec!["hiring".to_string()],
            vec![],
            0.5,
            0.2,
            Duration::from_secs(86_400 * 14),
        )
        .unwrap();
        agg.absorb(other, &hiring, now);
        assert_eq!(agg.snapshot().len(), 2);
    }
}
