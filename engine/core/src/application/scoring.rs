// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scoring Engine
//!
//! Combines an aggregated signal set into one overall prospect score plus
//! the explainable breakdown downstream reporting consumes. Pure given its
//! inputs: identical signals and template always yield an identical record,
//! including ordering.

use crate::domain::score::{InputSignature, ProspectScoreRecord};
use crate::domain::signal::ProspectSignal;
use crate::domain::template::ConsultantTemplate;
use crate::domain::{collector::ProspectIdentity, document::DocumentId};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    /// A template with no patterns is a configuration bug, not a runtime
    /// condition to recover from.
    #[error("Template for '{0}' defines no patterns")]
    EmptyTemplate(String),
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// `overall_score = Σ relevance / Σ weight` — normalized by the maximum
    /// attainable weighted score, so a prospect matching every high-weight
    /// pattern approaches 1.0 and one with no matches scores 0.0.
    pub fn score(
        mut prospect_signals: Vec<ProspectSignal>,
        template: &ConsultantTemplate,
        identity: &ProspectIdentity,
        document_ids: Vec<DocumentId>,
        partial: bool,
        computed_at: DateTime<Utc>,
    ) -> Result<ProspectScoreRecord, ScoringError> {
        if template.is_empty() {
            return Err(ScoringError::EmptyTemplate(
                template.consultant_type.to_string(),
            ));
        }

        // Signals for patterns no longer in the template carry no weight;
        // drop them rather than let them skew the normalized sum.
        prospect_signals.retain(|s| template.pattern(&s.pattern_name).is_some());

        let total_weight = template.total_weight();
        let weighted_sum: f64 = prospect_signals.iter().map(|s| s.relevance_score).sum();
        let overall_score = if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        prospect_signals.sort_by(rank_ordering);

        Ok(ProspectScoreRecord {
            prospect_id: identity.prospect_id.clone(),
            consultant_type: template.consultant_type.clone(),
            overall_score,
            signal_breakdown: prospect_signals,
            document_ids,
            partial,
            computed_at,
            input_signature: InputSignature::compute(template, identity),
        })
    }
}

/// Relevance descending, ties by higher raw confidence, then by the most
/// recent best supporting observation, then lexical pattern name. The final
/// lexical key makes the order total and the record fully deterministic.
fn rank_ordering(a: &ProspectSignal, b: &ProspectSignal) -> Ordering {
    b.relevance_score
        .partial_cmp(&a.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.effective_confidence
                .partial_cmp(&a.effective_confidence)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.best_observed_at().cmp(&a.best_observed_at()))
        .then_with(|| a.pattern_name.cmp(&b.pattern_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalObservation;
    use crate::domain::template::{ConsultantType, SignalPattern};
    use std::time::Duration;

    fn template(patterns: Vec<(&str, f64)>) -> ConsultantTemplate {
        let patterns = patterns
            .into_iter()
            .map(|(name, weight)| {
                SignalPattern::new(
                    name,
                    vec![name.to_string()],
                    vec![],
                    weight,
                    0.3,
                    Duration::from_secs(86_400 * 30),
                )
                .unwrap()
            })
            .collect();
        ConsultantTemplate::new(
            ConsultantType::new("fractional-cmo").unwrap(),
            "1.0",
            patterns,
        )
        .unwrap()
    }

    fn identity() -> ProspectIdentity {
        ProspectIdentity::new("acme", "Acme Corp", vec!["acme.com".to_string()])
    }

    fn signal(name: &str, confidence: f64, weight: f64, at_secs: i64) -> ProspectSignal {
        ProspectSignal::from_observation(
            SignalObservation {
                pattern_name: name.to_string(),
                confidence,
                source_document_id: DocumentId::new("doc"),
                observed_at: DateTime::from_timestamp(at_secs, 0).unwrap(),
                evidence_excerpt: String::new(),
            },
            weight,
        )
    }

    #[test]
    fn single_pattern_score_equals_effective_confidence() {
        let template = template(vec![("cmo_departure", 0.8)]);
        let record = ScoringEngine::score(
            vec![signal("cmo_departure", 0.64, 0.8, 1_000)],
            &template,
            &identity(),
            vec![],
            false,
            Utc::now(),
        )
        .unwrap();
        assert!((record.overall_score - 0.64).abs() < 1e-9);
    }

    #[test]
    fn empty_signal_set_scores_zero() {
        let template = template(vec![("a", 0.5), ("b", 0.9)]);
        let record = ScoringEngine::score(
            vec![],
            &template,
            &identity(),
            vec![],
            false,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(record.overall_score, 0.0);
        assert!(record.signal_breakdown.is_empty());
    }

    #[test]
    fn empty_template_is_rejected() {
        let template = template(vec![]);
        let err = ScoringEngine::score(vec![], &template, &identity(), vec![], false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScoringError::EmptyTemplate(_)));
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let template = template(vec![("a", 0.5), ("b", 0.9), ("c", 0.1)]);
        let record = ScoringEngine::score(
            vec![
                signal("a", 1.0, 0.5, 1),
                signal("b", 1.0, 0.9, 2),
                signal("c", 1.0, 0.1, 3),
            ],
            &template,
            &identity(),
            vec![],
            false,
            Utc::now(),
        )
        .unwrap();
        assert!((0.0..=1.0).contains(&record.overall_score));
        assert!((record.overall_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_sorted_with_deterministic_tie_breaks() {
        let template = template(vec![("alpha", 0.5), ("beta", 0.5), ("gamma", 0.9)]);
        // alpha and beta tie on relevance and confidence; beta is more recent
        let signals = vec![
            signal("alpha", 0.6, 0.5, 100),
            signal("beta", 0.6, 0.5, 200),
            signal("gamma", 0.2, 0.9, 50),
        ];
        let record = ScoringEngine::score(
            signals,
            &template,
            &identity(),
            vec![],
            false,
            Utc::now(),
        )
        .unwrap();
        let names: Vec<&str> = record
            .signal_breakdown
            .iter()
            .map(|s| s.pattern_name.as_str())
            .collect();
        assert_eq!(names, vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn scoring_is_deterministic_across_reruns() {
        let template = template(vec![("a", 0.5), ("b", 0.5)]);
        let signals = vec![signal("a", 0.6, 0.5, 100), signal("b", 0.6, 0.5, 100)];
        let at = Utc::now();
        let first =
            ScoringEngine::score(signals.clone(), &template, &identity(), vec![], false, at)
                .unwrap();
        let second =
            ScoringEngine::score(signals, &template, &identity(), vec![], false, at).unwrap();
        assert_eq!(first.overall_score, second.overall_score);
        assert_eq!(
            first
                .signal_breakdown
                .iter()
                .map(|s| s.pattern_name.clone())
                .collect::<Vec<_>>(),
            second
                .signal_breakdown
                .iter()
                .map(|s| s.pattern_name.clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(first.input_signature, second.input_signature);
    }

    #[test]
    fn signals_for_removed_patterns_are_dropped() {
        let template = template(vec![("a", 0.5)]);
        let record = ScoringEngine::score(
            vec![signal("a", 0.6, 0.5, 1), signal("ghost", 0.9, 0.9, 2)],
            &template,
            &identity(),
            vec![],
            false,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(record.signal_breakdown.len(), 1);
        assert!((record.overall_score - 0.6).abs() < 1e-9);
    }
}
