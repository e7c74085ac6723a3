// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Consultant Template Domain Model
//!
//! Defines the per-specialization detection templates: named signal patterns
//! with keywords, context rules, weights and decay parameters. Templates are
//! data, not behavior — dispatch is a keyed lookup in the
//! `TemplateRegistry`, never an inheritance hierarchy.
//!
//! # Design Principles
//!
//! 1. **Immutability:** Templates are immutable once loaded
//! 2. **Self-Validating:** Constructors enforce invariants
//! 3. **Type Safety:** Validated newtypes for lookup keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

/// Lookup key for a consultant specialization (e.g., "fractional-cmo")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsultantType(String);

impl ConsultantType {
    pub fn new(name: impl Into<String>) -> Result<Self, TemplateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::InvalidConsultantType);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConsultantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects: Detection Rules
// ============================================================================

/// Co-occurrence / proximity constraint applied on top of raw keyword hits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ContextRule {
    /// Both terms must occur within `max_distance` tokens of each other
    Proximity {
        anchor: String,
        companion: String,
        max_distance: usize,
    },
    /// No negation term may appear in the `window` tokens before a hit
    NegationFree { window: usize },
}

/// A named, weighted rule for detecting one signal type from text.
///
/// Immutable once loaded; owned by the `ConsultantTemplate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPattern {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub context_rules: Vec<ContextRule>,
    /// Importance for this consultant type, in [0,1]
    pub weight: f64,
    /// Minimum confidence for an observation to count, in [0,1]
    pub threshold: f64,
    /// Half-life governing how fast corroborating evidence fades
    #[serde(with = "humantime_serde")]
    pub decay_half_life: Duration,
}

impl SignalPattern {
    pub fn new(
        name: impl Into<String>,
        keywords: Vec<String>,
        context_rules: Vec<ContextRule>,
        weight: f64,
        threshold: f64,
        decay_half_life: Duration,
    ) -> Result<Self, TemplateError> {
        let pattern = Self {
            name: name.into(),
            keywords,
            context_rules,
            weight,
            threshold,
            decay_half_life,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::InvalidPatternName);
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(TemplateError::EmptyKeywords(self.name.clone()));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(TemplateError::WeightOutOfRange(self.weight));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(TemplateError::ThresholdOutOfRange(self.threshold));
        }
        if self.decay_half_life.is_zero() {
            return Err(TemplateError::ZeroHalfLife(self.name.clone()));
        }
        Ok(())
    }
}

// ============================================================================
// Aggregate Root: ConsultantTemplate
// ============================================================================

/// Ordered set of signal patterns for one consultant specialization.
///
/// # Invariants
/// - Pattern names are unique within a template
/// - Every pattern satisfies `SignalPattern::validate`
/// - Declaration order is preserved (reporting relies on it for stable
///   iteration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultantTemplate {
    pub consultant_type: ConsultantType,
    pub version: String,
    patterns: Vec<SignalPattern>,
}

impl ConsultantTemplate {
    pub fn new(
        consultant_type: ConsultantType,
        version: impl Into<String>,
        patterns: Vec<SignalPattern>,
    ) -> Result<Self, TemplateError> {
        for pattern in &patterns {
            pattern.validate()?;
        }
        for (i, pattern) in patterns.iter().enumerate() {
            if patterns[..i].iter().any(|p| p.name == pattern.name) {
                return Err(TemplateError::DuplicatePattern(pattern.name.clone()));
            }
        }
        Ok(Self {
            consultant_type,
            version: version.into(),
            patterns,
        })
    }

    pub fn patterns(&self) -> &[SignalPattern] {
        &self.patterns
    }

    pub fn pattern(&self, name: &str) -> Option<&SignalPattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Sum of all pattern weights — the maximum attainable weighted score
    pub fn total_weight(&self) -> f64 {
        self.patterns.iter().map(|p| p.weight).sum()
    }

    /// Content hash of the template, used in cache-invalidation signatures.
    ///
    /// Stable across runs: derived from the canonical JSON serialization,
    /// which preserves pattern declaration order.
    pub fn fingerprint(&self) -> String {
        let canonical =
            serde_json::to_vec(self).unwrap_or_else(|_| self.version.clone().into_bytes());
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Consultant type cannot be empty")]
    InvalidConsultantType,
    #[error("Pattern name cannot be empty")]
    InvalidPatternName,
    #[error("Pattern '{0}' has no usable keywords")]
    EmptyKeywords(String),
    #[error("Pattern weight {0} outside [0,1]")]
    WeightOutOfRange(f64),
    #[error("Pattern threshold {0} outside [0,1]")]
    ThresholdOutOfRange(f64),
    #[error("Pattern '{0}' has a zero decay half-life")]
    ZeroHalfLife(String),
    #[error("Duplicate pattern name '{0}' in template")]
    DuplicatePattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(name: &str, weight: f64) -> SignalPattern {
        SignalPattern::new(
            name,
            vec!["keyword".to_string()],
            vec![],
            weight,
            0.3,
            Duration::from_secs(86_400 * 30),
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let err = SignalPattern::new(
            "p",
            vec!["k".to_string()],
            vec![],
            1.2,
            0.3,
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::WeightOutOfRange(_)));
    }

    #[test]
    fn rejects_duplicate_pattern_names() {
        let ct = ConsultantType::new("fractional-cmo").unwrap();
        let err =
            ConsultantTemplate::new(ct, "1.0", vec![pattern("a", 0.5), pattern("a", 0.7)])
                .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicatePattern(_)));
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let ct = ConsultantType::new("fractional-cmo").unwrap();
        let t1 = ConsultantTemplate::new(ct.clone(), "1.0", vec![pattern("a", 0.5)]).unwrap();
        let t2 = ConsultantTemplate::new(ct, "1.0", vec![pattern("a", 0.6)]).unwrap();
        assert_ne!(t1.fingerprint(), t2.fingerprint());
        assert_eq!(t1.fingerprint(), t1.fingerprint());
    }
}
