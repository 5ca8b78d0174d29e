//! Plugins bundled with the console host.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hark_commands::ActionTemplate;
use hark_core::Command;
use hark_plugins::{Plugin, PluginContext};

pub fn bundled() -> Vec<Arc<dyn Plugin>> {
    let greeting: Arc<dyn Plugin> = Arc::new(GreetingPlugin);
    let members: Arc<dyn Plugin> = Arc::new(MemberActionsPlugin);
    vec![greeting, members]
}

/// A couple of session-wide social commands.
pub struct GreetingPlugin;

#[async_trait]
impl Plugin for GreetingPlugin {
    fn name(&self) -> &str {
        "greetings"
    }

    async fn on_load(&self, ctx: &PluginContext) -> Result<()> {
        ctx.register(
            Command::builder("say hello")
                .category("Social")
                .description("Greet everyone in the session")
                .keywords(["hello everyone", "hi all"])
                .action(|| {
                    println!("Hello, everyone!");
                    Ok(())
                })
                .build()?,
        );
        ctx.register(
            Command::builder("thank everyone")
                .category("Social")
                .keyword("thanks all")
                .action(|| {
                    println!("Thanks, everyone!");
                    Ok(())
                })
                .build()?,
        );
        Ok(())
    }
}

/// Per-member actions, expanded for each entity in the session.
pub struct MemberActionsPlugin;

#[async_trait]
impl Plugin for MemberActionsPlugin {
    fn name(&self) -> &str {
        "member-actions"
    }

    async fn on_load(&self, ctx: &PluginContext) -> Result<()> {
        ctx.register_template(
            ActionTemplate::new("mute", "Members", |e| {
                println!("Muted {}.", e.display_name);
                Ok(())
            })?
            .with_description(|e| format!("Mute {}", e.display_name)),
        );
        ctx.register_template(
            ActionTemplate::new("unmute", "Members", |e| {
                println!("Unmuted {}.", e.display_name);
                Ok(())
            })?
            .with_description(|e| format!("Unmute {}", e.display_name)),
        );
        ctx.register_template(ActionTemplate::new("wave at", "Members", |e| {
            println!("You wave at {}.", e.display_name);
            Ok(())
        })?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_commands::{CommandRegistry, SharedRoster, TemplateHub, TemplateRegistry};
    use hark_core::{Entity, RosterObserver};
    use hark_plugins::{PluginHost, PluginState};

    #[tokio::test]
    async fn bundled_plugins_load() {
        let registry = CommandRegistry::new();
        let hub = TemplateHub::new();
        let host = PluginHost::new(registry.clone(), hub.clone());
        for plugin in bundled() {
            assert!(host.add(plugin));
        }

        let states = host.load_all().await;
        assert!(states.iter().all(|(_, s)| *s == PluginState::Active));
        assert_eq!(registry.len(), 2);

        let roster = Arc::new(SharedRoster::new());
        let templates = Arc::new(TemplateRegistry::new(registry.clone(), roster.clone()));
        hub.attach(templates.clone());
        assert_eq!(templates.template_count(), 3);

        let alice = Entity::new(1, "Alice");
        roster.on_entity_joined(&alice);
        templates.on_entity_joined(&alice);
        let names: Vec<String> = registry.snapshot().iter().map(|c| c.name().to_string()).collect();
        assert!(names.contains(&"mute alice".to_string()));
        assert!(names.contains(&"wave at alice".to_string()));
        assert_eq!(registry.len(), 5);
    }
}
