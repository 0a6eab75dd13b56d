//! Fallback candidate source
//!
//! The routing collaborator knows which free-tier models exist and which are
//! currently unhealthy. The fallback controller asks it for candidates only
//! after the requested model and the configured alternatives are exhausted.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;

#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// Ordered free-tier candidates, excluding the given model keys
    async fn list_fallback_candidates(&self, exclude: &HashSet<String>) -> Vec<String>;

    /// Model keys the health check currently marks as unhealthy
    async fn unhealthy_models(&self) -> HashSet<String>;
}

/// Source with no dynamic candidates; the controller uses its static list
pub struct NoFallbackSource;

#[async_trait]
impl FallbackSource for NoFallbackSource {
    async fn list_fallback_candidates(&self, _exclude: &HashSet<String>) -> Vec<String> {
        Vec::new()
    }

    async fn unhealthy_models(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// Fixed candidate list with a mutable health set
#[derive(Default)]
pub struct StaticFallbackSource {
    candidates: Vec<String>,
    unhealthy: RwLock<HashSet<String>>,
}

impl StaticFallbackSource {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            unhealthy: RwLock::new(HashSet::new()),
        }
    }

    pub fn mark_unhealthy(&self, model_key: &str) {
        log::warn!("[ROUTING] Marking '{}' unhealthy", model_key);
        self.unhealthy.write().insert(model_key.to_string());
    }

    pub fn mark_healthy(&self, model_key: &str) {
        self.unhealthy.write().remove(model_key);
    }
}

#[async_trait]
impl FallbackSource for StaticFallbackSource {
    async fn list_fallback_candidates(&self, exclude: &HashSet<String>) -> Vec<String> {
        self.candidates
            .iter()
            .filter(|model| !exclude.contains(*model))
            .cloned()
            .collect()
    }

    async fn unhealthy_models(&self) -> HashSet<String> {
        self.unhealthy.read().clone()
    }
}
