//! Per-entity command templates.
//!
//! A template such as `mute` is expanded into one command per roster entity
//! (`"mute alice"`, `"mute bob"`) and those commands follow the entity in and
//! out of the session. Bookkeeping is planned under the template lock; the
//! actual register/unregister calls happen after it is released, under a
//! separate mutation lock so joins and leaves never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use hark_core::command::name_key;
use hark_core::{Action, Command, Entity, EntityId, HarkError, Roster, RosterObserver};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, ReentrantMutex};
use regex::Regex;
use tracing::{debug, info};

use crate::registry::CommandRegistry;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Action run against the entity a command was generated for.
pub type EntityAction = Arc<dyn Fn(&Entity) -> anyhow::Result<()> + Send + Sync>;

/// Produces the description of a generated command.
pub type DescriptionFactory = Arc<dyn Fn(&Entity) -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ActionTemplate {
    verb: String,
    category: String,
    describe: Option<DescriptionFactory>,
    action: EntityAction,
}

impl ActionTemplate {
    /// Verb is trimmed and lowercased, category trimmed. Either being blank is an error.
    pub fn new<F>(verb: &str, category: &str, action: F) -> Result<Self, HarkError>
    where
        F: Fn(&Entity) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let verb = verb.trim().to_lowercase();
        let category = category.trim().to_string();
        if verb.is_empty() {
            return Err(HarkError::InvalidTemplate("verb must not be blank".into()));
        }
        if category.is_empty() {
            return Err(HarkError::InvalidTemplate(format!("category for '{verb}' must not be blank")));
        }

        Ok(Self {
            verb,
            category,
            describe: None,
            action: Arc::new(action),
        })
    }

    pub fn with_description<F>(mut self, describe: F) -> Self
    where
        F: Fn(&Entity) -> String + Send + Sync + 'static,
    {
        self.describe = Some(Arc::new(describe));
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    fn command_name(&self, label: &str) -> String {
        format!("{} {}", self.verb, label)
    }

    fn description_for(&self, entity: &Entity) -> String {
        self.describe.as_ref().map(|f| f(entity)).unwrap_or_default()
    }
}

/// Display label for an entity: trimmed, whitespace-folded, lowercased.
/// Blank names fall back to `"entity <id>"`.
pub fn entity_label(entity: &Entity) -> String {
    let folded = WHITESPACE_RUN.replace_all(entity.display_name.trim(), " ").to_lowercase();
    if folded.is_empty() {
        format!("entity {}", entity.id)
    } else {
        folded
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Presence {
    label: String,
    entity: Entity,
    /// Bumped on every fresh join, so a rejoin invalidates older expansions.
    generation: u64,
}

#[derive(Default)]
struct TemplateState {
    templates: Vec<ActionTemplate>,
    /// Command names registered on behalf of each entity.
    registered: HashMap<EntityId, Vec<String>>,
    /// Label -> owning entity.
    phrase_keys: HashMap<String, EntityId>,
    present: HashMap<EntityId, Presence>,
    next_generation: u64,
}

/// Expands templates into per-entity commands and keeps them in lockstep with
/// roster membership.
pub struct TemplateRegistry {
    commands: CommandRegistry,
    roster: Arc<dyn Roster>,
    state: Mutex<TemplateState>,
    /// Held across plan+register and take+unregister. Reentrant because a
    /// registry listener may deliver roster events while a registration is
    /// in flight.
    mutation: ReentrantMutex<()>,
}

impl TemplateRegistry {
    pub fn new(commands: CommandRegistry, roster: Arc<dyn Roster>) -> Self {
        Self {
            commands,
            roster,
            state: Mutex::new(TemplateState::default()),
            mutation: ReentrantMutex::new(()),
        }
    }

    /// Store a template and expand it for every entity already present.
    pub fn register_template(&self, template: ActionTemplate) {
        let _mutation = self.mutation.lock();
        let planned: Vec<(EntityId, u64, Command)> = {
            let mut state = self.state.lock();
            state.templates.push(template.clone());
            state
                .present
                .iter()
                .map(|(id, p)| (*id, p.generation, self.build(&template, &p.label, &p.entity)))
                .collect()
        };

        let mut expanded = 0;
        for (id, generation, command) in planned {
            if self.admit(id, generation, &command) {
                self.commands.register(command);
                expanded += 1;
            }
        }
        info!(verb = %template.verb(), expanded, "Registered action template");
    }

    /// Expand every template for `entity`.
    pub fn expand_for(&self, entity: &Entity) {
        let _mutation = self.mutation.lock();
        let (generation, planned): (u64, Vec<Command>) = {
            let mut state = self.state.lock();
            let label = assign_label(&mut state, entity);
            let existing = state.present.get(&entity.id).map(|p| p.generation);
            let generation = match existing {
                Some(generation) => generation,
                None => {
                    state.next_generation += 1;
                    state.next_generation
                }
            };
            state.present.insert(
                entity.id,
                Presence {
                    label: label.clone(),
                    entity: entity.clone(),
                    generation,
                },
            );
            let planned: Vec<Command> = state.templates.iter().map(|t| self.build(t, &label, entity)).collect();
            (generation, planned)
        };

        let mut count = 0;
        for command in planned {
            if !self.admit(entity.id, generation, &command) {
                continue;
            }
            self.commands.register(command);
            count += 1;
        }
        debug!(entity = %entity.id, count, "Expanded templates for entity");
    }

    /// Remove every command and label owned by `id`.
    pub fn contract_for(&self, id: EntityId) {
        let _mutation = self.mutation.lock();
        let names = {
            let mut state = self.state.lock();
            state.phrase_keys.retain(|_, owner| *owner != id);
            state.present.remove(&id);
            state.registered.remove(&id).unwrap_or_default()
        };

        debug!(entity = %id, count = names.len(), "Removing entity commands");
        for name in names {
            self.commands.unregister_by_name(&name);
        }
    }

    /// Forget every entity at once.
    pub fn contract_all(&self) {
        let _mutation = self.mutation.lock();
        let names: Vec<String> = {
            let mut state = self.state.lock();
            state.phrase_keys.clear();
            state.present.clear();
            state.registered.drain().flat_map(|(_, names)| names).collect()
        };

        info!(count = names.len(), "Session ended, removing all entity commands");
        for name in names {
            self.commands.unregister_by_name(&name);
        }
    }

    pub fn template_count(&self) -> usize {
        self.state.lock().templates.len()
    }

    pub fn names_for(&self, id: EntityId) -> Vec<String> {
        self.state.lock().registered.get(&id).cloned().unwrap_or_default()
    }

    pub fn label_of(&self, id: EntityId) -> Option<String> {
        self.state.lock().present.get(&id).map(|p| p.label.clone())
    }

    pub fn phrase_key_count(&self) -> usize {
        self.state.lock().phrase_keys.len()
    }

    /// Record ownership of `command` right before it is registered. Refused
    /// when the entity left (or rejoined) since planning, or already owns the
    /// name.
    fn admit(&self, id: EntityId, generation: u64, command: &Command) -> bool {
        let mut state = self.state.lock();
        if state.present.get(&id).map(|p| p.generation) != Some(generation) {
            debug!(entity = %id, command = %command.name(), "Entity changed during expansion, skipping");
            return false;
        }
        let key = command.name_key();
        let owned = state.registered.entry(id).or_default();
        if owned.iter().any(|n| name_key(n) == key) {
            return false;
        }
        owned.push(command.name().to_string());
        true
    }

    fn build(&self, template: &ActionTemplate, label: &str, entity: &Entity) -> Command {
        let name = template.command_name(label);
        Command::from_parts(
            name.clone(),
            template.category.clone(),
            template.description_for(entity),
            vec![name],
            self.bind_action(template, entity),
        )
    }

    /// The bound action looks up the entity's current descriptor at call time.
    fn bind_action(&self, template: &ActionTemplate, entity: &Entity) -> Action {
        let roster = self.roster.clone();
        let action = template.action.clone();
        let captured = entity.clone();
        Arc::new(move || {
            let current = roster.get(captured.id).unwrap_or_else(|| captured.clone());
            action(&current)
        })
    }
}

/// Reuse the entity's label if it has one, otherwise pick the first free
/// suffix among labels held by other entities.
fn assign_label(state: &mut TemplateState, entity: &Entity) -> String {
    if let Some(presence) = state.present.get(&entity.id) {
        return presence.label.clone();
    }

    let base = entity_label(entity);
    let mut candidate = base.clone();
    let mut suffix = 2;
    while matches!(state.phrase_keys.get(&candidate), Some(owner) if *owner != entity.id) {
        candidate = format!("{base} {suffix}");
        suffix += 1;
    }
    state.phrase_keys.insert(candidate.clone(), entity.id);
    candidate
}

impl RosterObserver for TemplateRegistry {
    fn on_session_joined(&self, members: &[Entity]) {
        for entity in members {
            self.expand_for(entity);
        }
    }

    fn on_entity_joined(&self, entity: &Entity) {
        self.expand_for(entity);
    }

    fn on_entity_left(&self, id: EntityId) {
        self.contract_for(id);
    }

    fn on_session_ended(&self) {
        self.contract_all();
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

enum Slot {
    Pending(Vec<ActionTemplate>),
    Attached(Arc<TemplateRegistry>),
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Pending(Vec::new())
    }
}

/// Accepts templates before the template registry exists and replays them
/// once it is attached.
#[derive(Default, Clone)]
pub struct TemplateHub {
    slot: Arc<Mutex<Slot>>,
}

impl TemplateHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_template(&self, template: ActionTemplate) {
        let registry = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(queue) => {
                    debug!(verb = %template.verb(), "Queued action template until registry is attached");
                    queue.push(template);
                    return;
                }
                Slot::Attached(registry) => registry.clone(),
            }
        };
        registry.register_template(template);
    }

    /// Validate and register a template in one call.
    pub fn register<F>(&self, verb: &str, category: &str, action: F) -> Result<(), HarkError>
    where
        F: Fn(&Entity) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_template(ActionTemplate::new(verb, category, action)?);
        Ok(())
    }

    /// Attach the live registry and replay queued templates into it.
    pub fn attach(&self, registry: Arc<TemplateRegistry>) {
        let queued = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Attached(registry.clone())) {
                Slot::Pending(queue) => queue,
                Slot::Attached(_) => Vec::new(),
            }
        };
        for template in queued {
            registry.register_template(template);
        }
    }

    pub fn registry(&self) -> Option<Arc<TemplateRegistry>> {
        match &*self.slot.lock() {
            Slot::Attached(registry) => Some(registry.clone()),
            Slot::Pending(_) => None,
        }
    }
}
