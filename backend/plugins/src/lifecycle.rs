//! Plugin trait and the load/unload sequences the host runs for each plugin.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::PluginContext;

/// Current state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Unloaded,
    Loading,
    Active,
    Unloading,
    Failed,
}

/// A contributor of commands and action templates.
///
/// `on_load` runs concurrently with other plugins while the registry's seal
/// window is open. Everything registered through the context is owned by the
/// plugin and removed again when it unloads or its load fails.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn on_load(&self, ctx: &PluginContext) -> Result<()>;

    async fn on_unload(&self, ctx: &PluginContext) -> Result<()> {
        debug!(plugin = %ctx.plugin_name(), "on_unload (default)");
        Ok(())
    }
}

/// Run `on_load`; on failure release whatever the plugin managed to register.
pub async fn run_load_sequence(plugin: &dyn Plugin, ctx: &PluginContext) -> PluginState {
    debug!(plugin = %ctx.plugin_name(), "Running load sequence");
    match plugin.on_load(ctx).await {
        Ok(()) => {
            info!(plugin = %ctx.plugin_name(), commands = ctx.owned_names().len(), "Plugin loaded");
            PluginState::Active
        }
        Err(e) => {
            let released = ctx.release_all();
            warn!(plugin = %ctx.plugin_name(), error = %e, released, "Plugin load failed");
            PluginState::Failed
        }
    }
}

/// Run `on_unload` and drop every command the plugin owns. Unload errors are
/// logged; the commands are removed regardless.
pub async fn run_unload_sequence(plugin: &dyn Plugin, ctx: &PluginContext) -> PluginState {
    debug!(plugin = %ctx.plugin_name(), "Running unload sequence");
    if let Err(e) = plugin.on_unload(ctx).await {
        warn!(plugin = %ctx.plugin_name(), error = %e, "on_unload failed");
    }
    let released = ctx.release_all();
    info!(plugin = %ctx.plugin_name(), released, "Plugin unloaded");
    PluginState::Unloaded
}
