// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Template Registry
//!
//! Keyed lookup of `ConsultantTemplate`s. Additive-only during startup;
//! after `seal()` the registry is immutable and safe for unsynchronized
//! concurrent reads. Loading template definitions from configuration is the
//! template loader's concern (`infrastructure::template_loader`).

use crate::domain::template::{ConsultantTemplate, ConsultantType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No template registered for consultant type '{0}'")]
    UnknownConsultantType(ConsultantType),
    #[error("Registry is sealed; templates cannot be registered after startup")]
    RegistryClosed,
    #[error("Template already registered for consultant type '{0}'")]
    AlreadyRegistered(ConsultantType),
}

pub struct TemplateRegistry {
    templates: RwLock<HashMap<ConsultantType, Arc<ConsultantTemplate>>>,
    sealed: AtomicBool,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register a template. Fails once the registry has been sealed.
    pub fn register(&self, template: ConsultantTemplate) -> Result<(), RegistryError> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(RegistryError::RegistryClosed);
        }
        let mut templates = self.templates.write();
        let consultant_type = template.consultant_type.clone();
        if templates.contains_key(&consultant_type) {
            return Err(RegistryError::AlreadyRegistered(consultant_type));
        }
        info!(
            consultant_type = %consultant_type,
            patterns = template.patterns().len(),
            "Registered consultant template"
        );
        templates.insert(consultant_type, Arc::new(template));
        Ok(())
    }

    /// Transition to read-only. Idempotent.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn get(
        &self,
        consultant_type: &ConsultantType,
    ) -> Result<Arc<ConsultantTemplate>, RegistryError> {
        self.templates
            .read()
            .get(consultant_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownConsultantType(consultant_type.clone()))
    }

    pub fn consultant_types(&self) -> Vec<ConsultantType> {
        self.templates.read().keys().cloned().collect()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
