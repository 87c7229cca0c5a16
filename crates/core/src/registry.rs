//! Engine Registry
//!
//! Holds every speech engine linked into the process, keyed by identifier,
//! together with the outcome of its one-time initialization.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, RegistryError};
use crate::traits::{EngineConfig, SpeechEngine};

/// Lifecycle of a registered engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Registered,
    Ready,
    /// Initialization failed; the engine stays unusable for this process
    Failed(String),
}

/// Registry of speech engines
pub struct EngineRegistry {
    engines: HashMap<&'static str, Arc<dyn SpeechEngine>>,
    status: RwLock<HashMap<&'static str, EngineStatus>>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            status: RwLock::new(HashMap::new()),
        }
    }

    /// Register an engine
    pub fn register<E: SpeechEngine>(&mut self, engine: E) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(engine))
    }

    /// Register a shared engine
    pub fn register_arc(&mut self, engine: Arc<dyn SpeechEngine>) -> Result<(), RegistryError> {
        let id = engine.identifier();
        if self.engines.contains_key(id) {
            return Err(RegistryError::DuplicateIdentifier(id));
        }
        self.engines.insert(id, engine);
        self.status.write().insert(id, EngineStatus::Registered);
        Ok(())
    }

    /// Initialize the engines `config_for` selects, each with its config.
    ///
    /// Engines mapped to `None` are skipped and stay `Registered`. Returns the
    /// engines that failed, with their errors; a failure marks only that
    /// engine unavailable.
    pub async fn initialize_all<F>(&self, config_for: F) -> Vec<(&'static str, EngineError)>
    where
        F: Fn(&str) -> Option<EngineConfig>,
    {
        let mut failures = Vec::new();
        for (id, engine) in &self.engines {
            let Some(config) = config_for(id) else {
                tracing::debug!(engine = *id, "Speech engine not selected, skipping");
                continue;
            };
            match engine.initialize(&config).await {
                Ok(()) => {
                    tracing::info!(engine = *id, "Speech engine initialized");
                    self.status.write().insert(*id, EngineStatus::Ready);
                },
                Err(e) => {
                    tracing::error!(engine = *id, error = %e, "Speech engine initialization failed");
                    self.status.write().insert(*id, EngineStatus::Failed(e.to_string()));
                    failures.push((*id, e));
                },
            }
        }
        failures
    }

    /// Get an engine that initialized successfully
    pub fn available(&self, id: &str) -> Result<Arc<dyn SpeechEngine>, RegistryError> {
        let engine = self
            .engines
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        match self.status(id) {
            Some(EngineStatus::Ready) => Ok(Arc::clone(engine)),
            Some(EngineStatus::Failed(_)) => Err(RegistryError::Unavailable(id.to_string())),
            _ => Err(RegistryError::NotInitialized(id.to_string())),
        }
    }

    pub fn status(&self, id: &str) -> Option<EngineStatus> {
        self.status.read().get(id).cloned()
    }

    /// Check if engine exists
    pub fn has(&self, id: &str) -> bool {
        self.engines.contains_key(id)
    }

    /// All registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.engines.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
