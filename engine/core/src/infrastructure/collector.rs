// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Fixture Document Collector
//!
//! In-memory `DocumentCollector` for development and testing: scripted
//! documents per source, scripted failures, and a fetch call counter so
//! tests can assert the collector was (or was not) invoked.

use crate::domain::collector::{CollectorError, DocumentCollector, ProspectIdentity};
use crate::domain::document::DocumentRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
enum SourceScript {
    Document(DocumentRecord),
    Transient(String),
    Permanent(String),
}

#[derive(Default)]
struct FixtureState {
    /// source -> scripted outcome, in insertion order
    sources: Vec<(String, SourceScript)>,
    /// When set, discovery itself fails this many times before succeeding
    discovery_failures: usize,
    /// Simulated latency per fetch, for scheduling and cancellation tests
    fetch_delay: Option<std::time::Duration>,
}

/// Scripted collector. Sources are returned in the order they were added.
#[derive(Clone, Default)]
pub struct FixtureCollector {
    state: Arc<RwLock<FixtureState>>,
    fetch_calls: Arc<AtomicUsize>,
    discovery_calls: Arc<AtomicUsize>,
}

impl FixtureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, source: impl Into<String>, document: DocumentRecord) {
        self.state
            .write()
            .sources
            .push((source.into(), SourceScript::Document(document)));
    }

    pub fn add_transient_failure(&self, source: impl Into<String>, reason: impl Into<String>) {
        self.state
            .write()
            .sources
            .push((source.into(), SourceScript::Transient(reason.into())));
    }

    pub fn add_permanent_failure(&self, source: impl Into<String>, reason: impl Into<String>) {
        self.state
            .write()
            .sources
            .push((source.into(), SourceScript::Permanent(reason.into())));
    }

    /// Make the next `n` discovery calls fail transiently
    pub fn fail_discovery(&self, n: usize) {
        self.state.write().discovery_failures = n;
    }

    /// Simulate slow sources
    pub fn set_fetch_delay(&self, delay: std::time::Duration) {
        self.state.write().fetch_delay = Some(delay);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_calls() + self.discovery_calls()
    }

    fn script_for(&self, source: &str) -> Option<SourceScript> {
        self.state
            .read()
            .sources
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, script)| script.clone())
    }
}

#[async_trait]
impl DocumentCollector for FixtureCollector {
    async fn discover_sources(
        &self,
        _identity: &ProspectIdentity,
    ) -> Result<Vec<String>, CollectorError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if state.discovery_failures > 0 {
            state.discovery_failures -= 1;
            return Err(CollectorError::Transient(
                "source discovery unavailable".to_string(),
            ));
        }
        Ok(state.sources.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn fetch(
        &self,
        _identity: &ProspectIdentity,
        source: &str,
    ) -> Result<DocumentRecord, CollectorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.read().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.script_for(source) {
            Some(SourceScript::Document(document)) => Ok(document),
            Some(SourceScript::Transient(reason)) => Err(CollectorError::Transient(reason)),
            Some(SourceScript::Permanent(reason)) => Err(CollectorError::Permanent(reason)),
            None => Err(CollectorError::Permanent(format!(
                "unknown source '{source}'"
            ))),
        }
    }
}
