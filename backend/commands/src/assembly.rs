//! Assembly of the authoritative command list from built-ins and the registry.

use std::collections::HashSet;

use hark_core::{Command, CommandSummary};

use crate::catalog::BuiltinCatalog;
use crate::registry::CommandRegistry;

/// Merge built-in and custom commands.
///
/// Built-ins are always kept. A custom command is dropped when its trimmed,
/// case-insensitive name was already seen. Blank custom names are always kept.
pub fn combine(builtin: Vec<Command>, custom: Vec<Command>) -> Vec<Command> {
    let mut seen: HashSet<String> = builtin.iter().map(Command::name_key).collect();
    let mut all = builtin;
    all.reserve(custom.len());

    for cmd in custom {
        if cmd.has_blank_name() {
            all.push(cmd);
            continue;
        }
        if seen.insert(cmd.name_key()) {
            all.push(cmd);
        } else {
            tracing::debug!(command = %cmd.name(), "Dropping custom command shadowed by an earlier name");
        }
    }

    all
}

/// Load the built-in catalog and merge the registry's current snapshot.
pub fn create_all(catalog: &BuiltinCatalog, registry: &CommandRegistry) -> Vec<Command> {
    combine(catalog.load(), registry.snapshot())
}

/// Every command's name followed by its keywords, in list order. Blank
/// names and keywords are skipped.
pub fn all_keywords(commands: &[Command]) -> Vec<String> {
    commands
        .iter()
        .flat_map(|cmd| std::iter::once(cmd.name()).chain(cmd.keywords().iter().map(String::as_str)))
        .filter(|phrase| !phrase.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn summaries(commands: &[Command]) -> Vec<CommandSummary> {
    commands.iter().map(Command::summary).collect()
}

/// Pretty JSON export of the catalog.
pub fn export_json(commands: &[Command]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&summaries(commands))?)
}
