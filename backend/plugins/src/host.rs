//! Plugin host: owns the plugin set, runs loads concurrently and tracks state.

use std::collections::BTreeMap;
use std::sync::Arc;

use hark_commands::{CommandRegistry, TemplateHub};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::context::PluginContext;
use crate::lifecycle::{run_load_sequence, run_unload_sequence, Plugin, PluginState};

struct LoadedPlugin {
    plugin: Arc<dyn Plugin>,
    ctx: Arc<PluginContext>,
    state: PluginState,
}

pub struct PluginHost {
    commands: CommandRegistry,
    templates: TemplateHub,
    plugins: Mutex<BTreeMap<String, LoadedPlugin>>,
}

impl PluginHost {
    pub fn new(commands: CommandRegistry, templates: TemplateHub) -> Self {
        Self {
            commands,
            templates,
            plugins: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add a plugin in the `Unloaded` state. Returns `false` if the name is
    /// blank or already taken.
    pub fn add(&self, plugin: Arc<dyn Plugin>) -> bool {
        let name = plugin.name().trim().to_string();
        if name.is_empty() {
            warn!("Ignoring plugin with blank name");
            return false;
        }

        let mut plugins = self.plugins.lock();
        if plugins.contains_key(&name) {
            warn!(plugin = %name, "Plugin already added");
            return false;
        }
        let ctx = Arc::new(PluginContext::new(name.clone(), self.commands.clone(), self.templates.clone()));
        plugins.insert(
            name,
            LoadedPlugin {
                plugin,
                ctx,
                state: PluginState::Unloaded,
            },
        );
        true
    }

    /// Load every `Unloaded` plugin concurrently and wait for all of them.
    ///
    /// A plugin whose load errors or panics ends up `Failed` with its
    /// registrations released; the others are unaffected.
    pub async fn load_all(&self) -> Vec<(String, PluginState)> {
        let mut set = JoinSet::new();
        {
            let mut plugins = self.plugins.lock();
            for (name, entry) in plugins.iter_mut() {
                if entry.state != PluginState::Unloaded {
                    continue;
                }
                entry.state = PluginState::Loading;
                let plugin = entry.plugin.clone();
                let ctx = entry.ctx.clone();
                let name = name.clone();
                set.spawn(async move {
                    let state = run_load_sequence(&*plugin, &ctx).await;
                    (name, state)
                });
            }
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, state)) => self.set_state(&name, state),
                Err(e) => error!(error = %e, "Plugin load task did not complete"),
            }
        }

        // Anything still Loading belonged to a task that panicked.
        let stranded: Vec<Arc<PluginContext>> = {
            let mut plugins = self.plugins.lock();
            plugins
                .values_mut()
                .filter(|p| p.state == PluginState::Loading)
                .map(|p| {
                    p.state = PluginState::Failed;
                    p.ctx.clone()
                })
                .collect()
        };
        for ctx in stranded {
            let released = ctx.release_all();
            warn!(plugin = %ctx.plugin_name(), released, "Plugin load panicked");
        }

        let states = self.states();
        let active = states.iter().filter(|(_, s)| *s == PluginState::Active).count();
        info!(active, total = states.len(), "Plugins loaded");
        states
    }

    /// Unload an `Active` plugin. Returns `false` if it is unknown or not active.
    pub async fn unload(&self, name: &str) -> bool {
        let (plugin, ctx) = {
            let mut plugins = self.plugins.lock();
            match plugins.get_mut(name.trim()) {
                Some(entry) if entry.state == PluginState::Active => {
                    entry.state = PluginState::Unloading;
                    (entry.plugin.clone(), entry.ctx.clone())
                }
                _ => return false,
            }
        };

        let state = run_unload_sequence(&*plugin, &ctx).await;
        self.set_state(ctx.plugin_name(), state);
        true
    }

    pub async fn unload_all(&self) {
        let active: Vec<String> = self
            .states()
            .into_iter()
            .filter(|(_, s)| *s == PluginState::Active)
            .map(|(n, _)| n)
            .collect();
        for name in active {
            self.unload(&name).await;
        }
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.plugins.lock().get(name.trim()).map(|p| p.state)
    }

    /// Plugin names with their states, in name order.
    pub fn states(&self) -> Vec<(String, PluginState)> {
        self.plugins
            .lock()
            .iter()
            .map(|(n, p)| (n.clone(), p.state))
            .collect()
    }

    /// Names of the commands a plugin currently owns.
    pub fn owned_names(&self, name: &str) -> Vec<String> {
        self.plugins
            .lock()
            .get(name.trim())
            .map(|p| p.ctx.owned_names())
            .unwrap_or_default()
    }

    fn set_state(&self, name: &str, state: PluginState) {
        if let Some(entry) = self.plugins.lock().get_mut(name) {
            entry.state = state;
        }
    }
}
