//! Construct-once settings cache.
//!
//! [`SettingsCache`] holds the outcome of the first assembly and hands out
//! shared references to it. Concurrent first access runs the assembler at
//! most once: readers take the shared lock, and the first writer re-checks
//! the slot before building. [`SettingsCache::invalidate`] drops the
//! cached outcome so the next access re-reads the sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::assembler::{Assembler, ValidationOutcome};
use crate::issue::ValidationIssue;
use crate::settings::Settings;
use crate::source::SourceStack;

/// Lazily assembled, shared validation outcome.
///
/// # Example
///
/// ```
/// use orgair_config::{Assembler, SettingsCache, SourceStack};
///
/// let cache = SettingsCache::new(Assembler::platform().unwrap(), SourceStack::new());
/// let first = cache.get();
/// let second = cache.get();
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(cache.constructions(), 1);
/// ```
#[derive(Debug)]
pub struct SettingsCache {
    assembler: Assembler,
    sources: SourceStack,
    slot: RwLock<Option<Arc<ValidationOutcome>>>,
    constructions: AtomicUsize,
}

impl SettingsCache {
    /// Create an empty cache.
    pub fn new(assembler: Assembler, sources: SourceStack) -> Self {
        Self {
            assembler,
            sources,
            slot: RwLock::new(None),
            constructions: AtomicUsize::new(0),
        }
    }

    /// The cached outcome, assembling it on first access.
    pub fn get(&self) -> Arc<ValidationOutcome> {
        if let Some(outcome) = self.slot.read().as_ref() {
            return Arc::clone(outcome);
        }

        let mut slot = self.slot.write();
        if let Some(outcome) = slot.as_ref() {
            return Arc::clone(outcome);
        }

        let count = self.constructions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(construction = count, "assembling cached settings");
        let outcome = Arc::new(self.assembler.assemble(&self.sources));
        *slot = Some(Arc::clone(&outcome));
        outcome
    }

    /// The cached settings, or the issues that prevented them.
    pub fn settings(&self) -> Result<Settings, Vec<ValidationIssue>> {
        match self.get().as_ref() {
            ValidationOutcome::Valid(settings) => Ok(settings.clone()),
            ValidationOutcome::Invalid(issues) => Err(issues.clone()),
        }
    }

    /// Whether an outcome is currently cached.
    pub fn is_cached(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Drop the cached outcome.
    pub fn invalidate(&self) {
        if self.slot.write().take().is_some() {
            info!("settings cache invalidated");
        }
    }

    /// How many times the assembler has run.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}
