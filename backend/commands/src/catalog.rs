//! Built-in command sources.
//!
//! Each source contributes a batch of built-in commands under a stable key.
//! Sources load in ordinal key order so the assembled list, and therefore
//! matching, is reproducible across runs.

use std::sync::Arc;

use hark_core::Command;
use tracing::{debug, warn};

/// A provider of built-in commands.
pub trait BuiltinSource: Send + Sync {
    /// Stable ordering key, e.g. `"core.sleep"`.
    fn key(&self) -> &str;

    fn create(&self) -> anyhow::Result<Vec<Command>>;
}

struct FnSource<F> {
    key: String,
    create: F,
}

impl<F> BuiltinSource for FnSource<F>
where
    F: Fn() -> anyhow::Result<Vec<Command>> + Send + Sync,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn create(&self) -> anyhow::Result<Vec<Command>> {
        (self.create)()
    }
}

/// The static catalog, assembled once and reloaded on every rebuild.
#[derive(Default, Clone)]
pub struct BuiltinCatalog {
    sources: Vec<Arc<dyn BuiltinSource>>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: Arc<dyn BuiltinSource>) {
        self.sources.push(source);
        self.sources.sort_by(|a, b| a.key().cmp(b.key()));
    }

    pub fn add_fn<F>(&mut self, key: impl Into<String>, create: F)
    where
        F: Fn() -> anyhow::Result<Vec<Command>> + Send + Sync + 'static,
    {
        self.add(Arc::new(FnSource {
            key: key.into(),
            create,
        }));
    }

    pub fn keys(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.key()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run every source in key order. A failing source is logged and skipped.
    pub fn load(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        for source in &self.sources {
            match source.create() {
                Ok(batch) => {
                    debug!(source = source.key(), count = batch.len(), "Loaded built-in commands");
                    commands.extend(batch);
                }
                Err(e) => {
                    warn!(source = source.key(), error = %e, "Built-in command source failed, skipping");
                }
            }
        }
        commands
    }
}
