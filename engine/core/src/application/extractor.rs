// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Signal Extractor
//!
//! Turns one raw document plus a consultant template into zero or more
//! scored `SignalObservation`s. Purely textual and stateless: safe to run
//! in parallel across documents and prospects.
//!
//! # Confidence Curve
//!
//! Hits are counted per distinct sentence, then mapped through the
//! saturating curve `1 - 0.6^hits`: a single hit lands at 0.4, two
//! independent hits at 0.64, and further corroboration pushes toward 1.0
//! with diminishing returns. Monotonic non-decreasing and bounded in [0,1].

use crate::domain::document::DocumentRecord;
use crate::domain::signal::SignalObservation;
use crate::domain::template::{ConsultantTemplate, ContextRule, SignalPattern};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Per-hit miss probability in the saturating confidence curve
const HIT_MISS_FACTOR: f64 = 0.6;

/// Evidence excerpts are capped to keep records compact
const MAX_EXCERPT_CHARS: usize = 240;

/// Terms that poison a negation-free window
const NEGATION_TERMS: &[&str] = &[
    "not", "no", "never", "neither", "denies", "denied", "without", "rumor", "rumour",
];

fn sentence_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"[.!?\n]+").expect("static regex"))
}

/// Case-folded, whitespace-collapsed view of a document, segmented into
/// sentences over one global token stream.
struct NormalizedDocument {
    /// Raw (trimmed) sentence text, for evidence excerpts
    sentences: Vec<String>,
    /// Lowercased tokens with their global position and owning sentence
    tokens: Vec<Token>,
}

struct Token {
    text: String,
    sentence: usize,
}

/// One keyword occurrence that survived context-rule filtering
#[derive(Debug, Clone, Copy)]
struct Occurrence {
    /// Global token position of the occurrence start
    position: usize,
    sentence: usize,
}

impl NormalizedDocument {
    fn parse(content: &str) -> Self {
        let mut sentences = Vec::new();
        let mut tokens = Vec::new();
        for raw in sentence_splitter().split(content) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let sentence_idx = sentences.len();
            for word in trimmed.split_whitespace() {
                let cleaned: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '-')
                    .flat_map(|c| c.to_lowercase())
                    .collect();
                if !cleaned.is_empty() {
                    tokens.push(Token {
                        text: cleaned,
                        sentence: sentence_idx,
                    });
                }
            }
            sentences.push(trimmed.to_string());
        }
        Self { sentences, tokens }
    }

    /// All global token positions where the (possibly multi-word) term
    /// starts. Terms are matched on the normalized token stream, so phrase
    /// matches may span sentence boundaries only in pathological inputs;
    /// the occurrence is attributed to the sentence of its first token.
    fn find_term(&self, term: &str) -> Vec<Occurrence> {
        let needle: Vec<String> = term
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if needle.is_empty() || self.tokens.len() < needle.len() {
            return Vec::new();
        }
        let mut occurrences = Vec::new();
        for start in 0..=(self.tokens.len() - needle.len()) {
            let matches = needle
                .iter()
                .enumerate()
                .all(|(i, word)| self.tokens[start + i].text == *word);
            if matches {
                occurrences.push(Occurrence {
                    position: start,
                    sentence: self.tokens[start].sentence,
                });
            }
        }
        occurrences
    }

    fn has_negation_before(&self, occurrence: Occurrence, window: usize) -> bool {
        let from = occurrence.position.saturating_sub(window);
        self.tokens[from..occurrence.position]
            .iter()
            .any(|t| NEGATION_TERMS.contains(&t.text.as_str()))
    }
}

pub struct SignalExtractor;

impl SignalExtractor {
    /// Run every pattern in the template against one document.
    ///
    /// Emits at most one observation per (document, pattern): multiple hits
    /// strengthen confidence, they never duplicate observations. An
    /// unparseable or empty document yields no observations and never
    /// errors — documents are untrusted input.
    pub fn extract(
        document: &DocumentRecord,
        template: &ConsultantTemplate,
    ) -> Vec<SignalObservation> {
        let normalized = NormalizedDocument::parse(&document.content);
        if normalized.tokens.is_empty() {
            debug!(document_id = %document.id, "Skipping empty or unparseable document");
            return Vec::new();
        }

        let mut observations = Vec::new();
        for pattern in template.patterns() {
            if let Some(observation) = Self::extract_pattern(document, &normalized, pattern) {
                observations.push(observation);
            }
        }
        observations
    }

    fn extract_pattern(
        document: &DocumentRecord,
        normalized: &NormalizedDocument,
        pattern: &SignalPattern,
    ) -> Option<SignalObservation> {
        let mut occurrences: Vec<Occurrence> = pattern
            .keywords
            .iter()
            .flat_map(|keyword| normalized.find_term(keyword))
            .collect();
        if occurrences.is_empty() {
            return None;
        }

        for rule in &pattern.context_rules {
            match rule {
                ContextRule::NegationFree { window } => {
                    occurrences.retain(|occ| !normalized.has_negation_before(*occ, *window));
                }
                ContextRule::Proximity {
                    anchor,
                    companion,
                    max_distance,
                } => {
                    // Document-level gate: the pair must co-occur somewhere
                    // within the distance or the pattern does not fire.
                    let anchors = normalized.find_term(anchor);
                    let companions = normalized.find_term(companion);
                    let satisfied = anchors.iter().any(|a| {
                        companions
                            .iter()
                            .any(|c| a.position.abs_diff(c.position) <= *max_distance)
                    });
                    if !satisfied {
                        occurrences.clear();
                    }
                }
            }
            if occurrences.is_empty() {
                return None;
            }
        }

        let mut hit_sentences: Vec<usize> = occurrences.iter().map(|occ| occ.sentence).collect();
        hit_sentences.sort_unstable();
        hit_sentences.dedup();
        let independent_hits = hit_sentences.len() as i32;

        let confidence = 1.0 - HIT_MISS_FACTOR.powi(independent_hits);
        if confidence < pattern.threshold {
            debug!(
                document_id = %document.id,
                pattern = %pattern.name,
                confidence,
                threshold = pattern.threshold,
                "Observation below pattern threshold, discarding"
            );
            return None;
        }

        let excerpt = normalized
            .sentences
            .get(hit_sentences[0])
            .map(|s| truncate_chars(s, MAX_EXCERPT_CHARS))
            .unwrap_or_default();

        Some(SignalObservation {
            pattern_name: pattern.name.clone(),
            confidence,
            source_document_id: document.id.clone(),
            observed_at: document.retrieved_at,
            evidence_excerpt: excerpt,
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
