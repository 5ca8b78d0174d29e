//! The `Command` entity: a named, keyword-triggerable unit of behavior.
//!
//! Built-in catalog entries, plugin registrations, and per-entity template
//! expansions are all different construction sites for this one shape.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HarkError;

/// Category assigned when a command is built without one.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Category used by the two-argument [`Command::new`] shorthand.
const CUSTOM_CATEGORY: &str = "Custom";

/// Zero-argument side effect bound to a command.
pub type Action = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Immutable description of a voice command.
#[derive(Clone)]
pub struct Command {
    name: String,
    category: String,
    description: String,
    keywords: Vec<String>,
    action: Action,
}

impl Command {
    /// Shorthand for a custom command with no description.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            category: CUSTOM_CATEGORY.to_string(),
            description: String::new(),
            keywords: Vec::new(),
            action: Arc::new(action),
        }
    }

    /// Build a command from already-validated parts.
    pub fn from_parts(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        keywords: Vec<String>,
        action: Action,
    ) -> Self {
        Self {
            name: name.into(),
            category: resolve_category(Some(category.into())),
            description: description.into(),
            keywords,
            action,
        }
    }

    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            name: name.into(),
            category: None,
            description: None,
            keywords: Vec::new(),
            action: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Alternate trigger phrases, in registration order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Identity key: trimmed, lowercased name.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    pub fn has_blank_name(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Run the action, converting a panic into an error.
    pub fn invoke(&self) -> anyhow::Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "action panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    pub fn summary(&self) -> CommandSummary {
        CommandSummary {
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("keywords", &self.keywords)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Command`]. `build` fails if no action was supplied.
pub struct CommandBuilder {
    name: String,
    category: Option<String>,
    description: Option<String>,
    keywords: Vec<String>,
    action: Option<Action>,
}

impl CommandBuilder {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn shared_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn build(self) -> Result<Command, HarkError> {
        let action = self
            .action
            .ok_or_else(|| HarkError::MissingAction { name: self.name.clone() })?;

        Ok(Command {
            name: self.name,
            category: resolve_category(self.category),
            description: self.description.unwrap_or_default(),
            keywords: self.keywords,
            action,
        })
    }
}

/// Serializable view of a command, used for catalog export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSummary {
    pub name: String,
    pub category: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Trimmed, lowercased form used for name comparisons.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn resolve_category(category: Option<String>) -> String {
    match category {
        Some(c) if !c.trim().is_empty() => c,
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
