// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prospect Engine Core
//!
//! Signal detection and prospect scoring for the consultant intelligence
//! platform.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Detect domain-specific signals in collected documents and
//!   combine them into an actionable score per prospect, driven by a
//!   background research task orchestrator.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
