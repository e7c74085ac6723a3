// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Template Manifest Parser
//!
//! Loads `ConsultantTemplate`s from YAML manifests and ships a starter
//! manifest with the stock signal families (funding, hiring, expansion,
//! product launch, partnership, leadership change). Parsed manifests go
//! through the domain constructors, so every invariant check applies to
//! configuration input too.

use crate::domain::template::{
    ConsultantTemplate, ConsultantType, ContextRule, SignalPattern, TemplateError,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Starter templates, multi-document YAML. Kept in the same format users
/// supply so the one parser covers both.
const DEFAULT_TEMPLATES_YAML: &str = r#"
consultant_type: fractional-cmo
version: "1.0"
patterns:
  - name: cmo_departure
    keywords: ["chief marketing officer", "cmo departure", "vp marketing departure"]
    context_rules:
      - rule: negation_free
        window: 6
    weight: 0.8
    threshold: 0.3
    decay_half_life: 60d
  - name: leadership_change
    keywords: ["new ceo", "executive appointment", "leadership change", "joins as"]
    weight: 0.5
    threshold: 0.3
    decay_half_life: 90d
  - name: rebrand
    keywords: ["rebrand", "brand refresh", "new brand identity"]
    weight: 0.4
    threshold: 0.3
    decay_half_life: 120d
---
consultant_type: growth-advisor
version: "1.0"
patterns:
  - name: funding_round
    keywords: ["series a funding", "series b funding", "seed funding", "investment round", "venture capital"]
    context_rules:
      - rule: negation_free
        window: 6
    weight: 0.9
    threshold: 0.3
    decay_half_life: 90d
  - name: hiring_surge
    keywords: ["expanding team", "job openings", "new positions", "recruitment drive"]
    weight: 0.6
    threshold: 0.3
    decay_half_life: 45d
  - name: market_expansion
    keywords: ["opening new office", "international expansion", "new market", "geographic expansion"]
    weight: 0.7
    threshold: 0.3
    decay_half_life: 90d
  - name: product_launch
    keywords: ["launching new", "product release", "beta launch"]
    weight: 0.5
    threshold: 0.3
    decay_half_life: 60d
  - name: partnership
    keywords: ["partnership with", "strategic alliance", "joint venture", "announces deal"]
    weight: 0.4
    threshold: 0.3
    decay_half_life: 90d
"#;

#[derive(Debug, Error)]
pub enum TemplateParseError {
    #[error("Failed to read template manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid template manifest YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Template validation failed: {0}")]
    Validation(#[from] TemplateError),
}

#[derive(Debug, Deserialize)]
struct TemplateManifest {
    consultant_type: String,
    version: String,
    patterns: Vec<PatternManifest>,
}

#[derive(Debug, Deserialize)]
struct PatternManifest {
    name: String,
    keywords: Vec<String>,
    #[serde(default)]
    context_rules: Vec<ContextRule>,
    weight: f64,
    threshold: f64,
    #[serde(with = "humantime_serde")]
    decay_half_life: Duration,
}

impl TemplateManifest {
    fn into_template(self) -> Result<ConsultantTemplate, TemplateError> {
        let consultant_type = ConsultantType::new(self.consultant_type)?;
        let patterns = self
            .patterns
            .into_iter()
            .map(|p| {
                SignalPattern::new(
                    p.name,
                    p.keywords,
                    p.context_rules,
                    p.weight,
                    p.threshold,
                    p.decay_half_life,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        ConsultantTemplate::new(consultant_type, self.version, patterns)
    }
}

pub struct TemplateParser;

impl TemplateParser {
    /// Parse a single-template manifest
    pub fn parse_str(yaml: &str) -> Result<ConsultantTemplate, TemplateParseError> {
        let manifest: TemplateManifest = serde_yaml::from_str(yaml)?;
        Ok(manifest.into_template()?)
    }

    /// Parse a multi-document manifest (`---` separated)
    pub fn parse_all_str(yaml: &str) -> Result<Vec<ConsultantTemplate>, TemplateParseError> {
        let mut templates = Vec::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let manifest = TemplateManifest::deserialize(document)?;
            templates.push(manifest.into_template()?);
        }
        Ok(templates)
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<ConsultantTemplate>, TemplateParseError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let templates = Self::parse_all_str(&contents)?;
        info!(
            path = %path.display(),
            count = templates.len(),
            "Loaded consultant templates"
        );
        Ok(templates)
    }

    /// The embedded starter templates
    pub fn builtin_templates() -> Result<Vec<ConsultantTemplate>, TemplateParseError> {
        Self::parse_all_str(DEFAULT_TEMPLATES_YAML)
    }
}
