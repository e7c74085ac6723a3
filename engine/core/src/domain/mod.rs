// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod template;
pub mod document;
pub mod signal;
pub mod score;
pub mod task;
pub mod events;
pub mod repository;
pub mod collector;
