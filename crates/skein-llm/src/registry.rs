use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::provider::TextCompletion;
use skein_core::{Result, SkeinError};

/// Maps service ids to completion-service handles and tracks the default.
///
/// The first service added becomes the default unless another one is
/// explicitly marked default later.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn TextCompletion>>,
    default_id: Option<String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. Re-using an id replaces the previous handle.
    pub fn add(&mut self, id: impl Into<String>, service: Arc<dyn TextCompletion>) {
        let id = id.into();
        info!(service = %id, backend = service.name(), "registered completion service");
        if self.services.insert(id.clone(), service).is_some() {
            debug!(service = %id, "replaced existing completion service");
        }
        if self.default_id.is_none() {
            self.default_id = Some(id);
        }
    }

    /// Register a service and make it the default.
    pub fn add_as_default(&mut self, id: impl Into<String>, service: Arc<dyn TextCompletion>) {
        let id = id.into();
        self.add(id.clone(), service);
        self.default_id = Some(id);
    }

    /// Mark an already-registered service as the default.
    pub fn set_default(&mut self, id: &str) -> Result<()> {
        if !self.services.contains_key(id) {
            return Err(SkeinError::NoServiceConfigured(format!(
                "cannot make unknown service '{id}' the default"
            )));
        }
        self.default_id = Some(id.to_string());
        Ok(())
    }

    /// Remove a service. If it was the default, the default is cleared.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.services.remove(id).is_some();
        if removed && self.default_id.as_deref() == Some(id) {
            self.default_id = None;
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TextCompletion>> {
        self.services.get(id).cloned()
    }

    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.services.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolve the service for a call: explicit override, then the first
    /// registered id from `preferred`, then the registry default.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        preferred: &[String],
    ) -> Result<(String, Arc<dyn TextCompletion>)> {
        if let Some(id) = explicit {
            return self
                .get(id)
                .map(|s| (id.to_string(), s))
                .ok_or_else(|| {
                    SkeinError::NoServiceConfigured(format!("service '{id}' is not registered"))
                });
        }

        for id in preferred {
            if let Some(service) = self.get(id) {
                return Ok((id.clone(), service));
            }
        }
        if !preferred.is_empty() {
            warn!(
                preferred = ?preferred,
                "none of the preferred services is registered, falling back to default"
            );
        }

        self.default_id
            .as_deref()
            .and_then(|id| self.get(id).map(|s| (id.to_string(), s)))
            .ok_or_else(|| {
                SkeinError::NoServiceConfigured("no default completion service".into())
            })
    }
}
