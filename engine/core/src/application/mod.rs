// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod registry;
pub mod extractor;
pub mod aggregator;
pub mod scoring;
pub mod orchestrator;

pub use orchestrator::{OrchestratorConfig, ResearchOrchestrator};
pub use registry::{RegistryError, TemplateRegistry};
