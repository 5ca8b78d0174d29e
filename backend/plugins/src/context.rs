use hark_commands::{ActionTemplate, CommandRegistry, TemplateHub};
use hark_core::command::name_key;
use hark_core::Command;
use parking_lot::Mutex;
use tracing::debug;

/// What a plugin sees while loading: registration on its own behalf, with
/// every name recorded so the plugin's commands can be removed as a unit.
pub struct PluginContext {
    plugin: String,
    commands: CommandRegistry,
    templates: TemplateHub,
    owned: Mutex<Vec<String>>,
}

impl PluginContext {
    pub fn new(plugin: impl Into<String>, commands: CommandRegistry, templates: TemplateHub) -> Self {
        Self {
            plugin: plugin.into(),
            commands,
            templates,
            owned: Mutex::new(Vec::new()),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Register a command owned by this plugin. A second registration of a
    /// name the plugin already owns is ignored and returns `false`.
    pub fn register(&self, command: Command) -> bool {
        {
            let mut owned = self.owned.lock();
            let key = command.name_key();
            if owned.iter().any(|n| name_key(n) == key) {
                debug!(plugin = %self.plugin, command = %command.name(), "Plugin already owns command");
                return false;
            }
            owned.push(command.name().trim().to_string());
        }
        self.commands.register(command);
        true
    }

    /// Remove one of this plugin's commands. Names the plugin does not own
    /// are left alone and yield 0.
    pub fn unregister(&self, name: &str) -> usize {
        let key = name_key(name);
        let owned = {
            let mut owned = self.owned.lock();
            let before = owned.len();
            owned.retain(|n| name_key(n) != key);
            before != owned.len()
        };
        if owned {
            self.commands.unregister_by_name(name)
        } else {
            0
        }
    }

    pub fn owned_names(&self) -> Vec<String> {
        self.owned.lock().clone()
    }

    /// Remove every command this plugin registered.
    pub fn release_all(&self) -> usize {
        let names = std::mem::take(&mut *self.owned.lock());
        names.iter().map(|n| self.commands.unregister_by_name(n)).sum()
    }

    /// Templates are expanded per roster entity by the template registry and
    /// live for the whole session.
    pub fn register_template(&self, template: ActionTemplate) {
        debug!(plugin = %self.plugin, verb = %template.verb(), "Plugin registered action template");
        self.templates.register_template(template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(registry: &CommandRegistry) -> PluginContext {
        PluginContext::new("lights", registry.clone(), TemplateHub::new())
    }

    #[test]
    fn register_is_idempotent_per_name() {
        let registry = CommandRegistry::new();
        let ctx = ctx(&registry);
        assert!(ctx.register(Command::new("Lights On", || Ok(()))));
        assert!(!ctx.register(Command::new("  lights on ", || Ok(()))));
        assert_eq!(registry.len(), 1);
        assert_eq!(ctx.owned_names(), vec!["Lights On"]);
    }

    #[test]
    fn unregister_only_touches_owned_names() {
        let registry = CommandRegistry::new();
        registry.register(Command::new("someone else", || Ok(())));
        let ctx = ctx(&registry);
        ctx.register(Command::new("lights off", || Ok(())));

        assert_eq!(ctx.unregister("someone else"), 0);
        assert_eq!(ctx.unregister("LIGHTS OFF"), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_all_removes_exactly_the_plugins_commands() {
        let registry = CommandRegistry::new();
        registry.register(Command::new("weather", || Ok(())));
        let ctx = ctx(&registry);
        ctx.register(Command::new("lights on", || Ok(())));
        ctx.register(Command::new("lights off", || Ok(())));

        assert_eq!(ctx.release_all(), 2);
        let names: Vec<String> = registry.snapshot().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["weather"]);
        assert_eq!(ctx.release_all(), 0);
    }

    #[test]
    fn templates_queue_on_the_hub() {
        let registry = CommandRegistry::new();
        let hub = TemplateHub::new();
        let ctx = PluginContext::new("mute", registry, hub.clone());
        ctx.register_template(ActionTemplate::new("mute", "Player", |_| Ok(())).unwrap());
        assert!(hub.registry().is_none());
    }
}
