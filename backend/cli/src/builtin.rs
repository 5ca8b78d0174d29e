//! Commands that ship with the console host.

use std::sync::Arc;

use chrono::Local;
use hark_assistant::AssistantControl;
use hark_commands::BuiltinCatalog;
use hark_config::FlagStore;
use hark_core::{flag_keys, Command};

pub fn catalog(control: AssistantControl, flags: Arc<FlagStore>) -> BuiltinCatalog {
    let mut catalog = BuiltinCatalog::new();

    catalog.add_fn("assistant.sleep", move || {
        let control = control.clone();
        Ok(vec![Command::builder("go to sleep")
            .category("Assistant")
            .description("Stop listening for commands until the next wake word")
            .keywords(["goodbye", "that's all"])
            .action(move || {
                control.request_sleep();
                Ok(())
            })
            .build()?])
    });

    catalog.add_fn("assistant.settings", move || {
        Ok(vec![
            toggle("toggle quick commands", flag_keys::QUICK_COMMANDS, "Quick commands", flags.clone())?,
            toggle("toggle notifications", flag_keys::NOTIFICATIONS, "Notifications", flags.clone())?,
        ])
    });

    catalog.add_fn("clock.time", || {
        Ok(vec![Command::builder("what time is it")
            .category("Utility")
            .description("Print the local time")
            .keyword("current time")
            .action(|| {
                println!("It is {}.", Local::now().format("%H:%M"));
                Ok(())
            })
            .build()?])
    });

    catalog
}

fn toggle(name: &str, key: &'static str, label: &'static str, flags: Arc<FlagStore>) -> anyhow::Result<Command> {
    Ok(Command::builder(name)
        .category("Settings")
        .description(format!("Turn {} on or off", label.to_lowercase()))
        .action(move || {
            let enabled = flags.toggle(key, false);
            println!("{label} {}.", if enabled { "on" } else { "off" });
            Ok(())
        })
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_core::FlagSource;

    fn fixture() -> (BuiltinCatalog, AssistantControl, Arc<FlagStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let flags = Arc::new(FlagStore::in_memory(dir.path().join("settings.json")));
        let control = AssistantControl::new();
        (catalog(control.clone(), flags.clone()), control, flags, dir)
    }

    #[test]
    fn sources_load_in_key_order() {
        let (catalog, ..) = fixture();
        assert_eq!(catalog.keys(), vec!["assistant.settings", "assistant.sleep", "clock.time"]);
        let names: Vec<String> = catalog.load().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["toggle quick commands", "toggle notifications", "go to sleep", "what time is it"]
        );
    }

    #[test]
    fn sleep_command_requests_sleep() {
        let (catalog, control, ..) = fixture();
        let commands = catalog.load();
        let sleep = commands.iter().find(|c| c.name() == "go to sleep").unwrap();
        sleep.invoke().unwrap();
        assert!(control.is_sleep_requested());
    }

    #[test]
    fn toggle_flips_the_flag() {
        let (catalog, _, flags, _dir) = fixture();
        let commands = catalog.load();
        let toggle = commands.iter().find(|c| c.name() == "toggle quick commands").unwrap();
        assert!(flags.is_enabled(flag_keys::QUICK_COMMANDS));
        toggle.invoke().unwrap();
        assert!(!flags.is_enabled(flag_keys::QUICK_COMMANDS));
        assert!(flags.is_dirty());
    }
}
