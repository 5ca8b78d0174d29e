use std::collections::BTreeMap;

use hark_core::{Entity, EntityId, Roster, RosterObserver};
use parking_lot::RwLock;

/// In-memory session membership, kept current from roster events.
#[derive(Default)]
pub struct SharedRoster {
    members: RwLock<BTreeMap<EntityId, Entity>>,
}

impl SharedRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an entity's descriptor.
    pub fn join(&self, entity: Entity) {
        self.members.write().insert(entity.id, entity);
    }

    pub fn leave(&self, id: EntityId) -> Option<Entity> {
        self.members.write().remove(&id)
    }

    pub fn clear(&self) {
        self.members.write().clear();
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl Roster for SharedRoster {
    fn members(&self) -> Vec<Entity> {
        self.members.read().values().cloned().collect()
    }

    fn get(&self, id: EntityId) -> Option<Entity> {
        self.members.read().get(&id).cloned()
    }
}

/// Membership is kept current by observing the same roster events as the
/// template registry; register it first so lookups see the new state.
impl RosterObserver for SharedRoster {
    fn on_session_joined(&self, members: &[Entity]) {
        let mut map = self.members.write();
        map.clear();
        map.extend(members.iter().map(|e| (e.id, e.clone())));
    }

    fn on_entity_joined(&self, entity: &Entity) {
        self.join(entity.clone());
    }

    fn on_entity_left(&self, id: EntityId) {
        self.leave(id);
    }

    fn on_session_ended(&self) {
        self.clear();
    }
}
