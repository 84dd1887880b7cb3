use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::definition::ScriptDefinition;
use crate::interpreter::{EventArgs, ScriptableEntity, ZephyrHost};
use crate::value::{shared_map, SharedValueMap, ValueMap, ZephyrValue};

/// A minimal scriptable game object.
///
/// The engine's real entity layer lives outside this crate; this one exists
/// so the CLI demo and the tests have something to resolve chains against.
/// Dispatched events are recorded rather than interpreted further.
pub struct ScriptedEntity {
    id: String,
    variables: SharedValueMap,
    script: Option<Rc<ScriptDefinition>>,
    received_events: Vec<(String, EventArgs)>,
}

impl ScriptedEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variables: shared_map(ValueMap::new()),
            script: None,
            received_events: Vec::new(),
        }
    }

    /// Bind a compiled script. Refuses definitions whose compilation did not
    /// fully succeed.
    pub fn bind_script(&mut self, definition: Rc<ScriptDefinition>) -> bool {
        if !definition.is_valid() {
            warn!(
                entity = %self.id,
                script = %definition.name(),
                "refusing to bind invalid script definition"
            );
            return false;
        }
        self.script = Some(definition);
        true
    }

    pub fn script(&self) -> Option<&Rc<ScriptDefinition>> {
        self.script.as_ref()
    }

    pub fn variables(&self) -> SharedValueMap {
        Rc::clone(&self.variables)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: ZephyrValue) {
        self.variables.borrow_mut().insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<ZephyrValue> {
        self.variables.borrow().get(name).cloned()
    }

    pub fn received_events(&self) -> &[(String, EventArgs)] {
        &self.received_events
    }
}

impl ScriptableEntity for ScriptedEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn variables(&self) -> SharedValueMap {
        Rc::clone(&self.variables)
    }

    fn handle_event(&mut self, name: &str, args: &mut EventArgs) {
        self.received_events.push((name.to_string(), args.clone()));
    }
}

/// The set of live entities, keyed by id in spawn order.
#[derive(Default)]
pub struct EntityWorld {
    entities: IndexMap<String, ScriptedEntity>,
}

impl EntityWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, id: &str) -> &mut ScriptedEntity {
        self.entities
            .entry(id.to_string())
            .or_insert_with(|| ScriptedEntity::new(id))
    }

    pub fn despawn(&mut self, id: &str) -> bool {
        self.entities.shift_remove(id).is_some()
    }

    pub fn entity(&self, id: &str) -> Option<&ScriptedEntity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut ScriptedEntity> {
        self.entities.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl ZephyrHost for EntityWorld {
    fn resolve_entity(&mut self, id: &str) -> Option<&mut dyn ScriptableEntity> {
        self.entities
            .get_mut(id)
            .map(|entity| entity as &mut dyn ScriptableEntity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkKind};

    #[test]
    fn spawned_entities_resolve_and_despawned_ones_do_not() {
        let mut world = EntityWorld::new();
        world.spawn("drone");
        assert!(world.resolve_entity("drone").is_some());

        assert!(world.despawn("drone"));
        assert!(world.resolve_entity("drone").is_none());
        assert!(!world.despawn("drone"));
    }

    #[test]
    fn invalid_definitions_cannot_be_bound() {
        let mut definition =
            ScriptDefinition::new("broken", Chunk::new("broken", ChunkKind::Global));
        definition.set_valid(false);

        let mut entity = ScriptedEntity::new("sentry");
        assert!(!entity.bind_script(Rc::new(definition)));
        assert!(entity.script().is_none());

        let healthy = ScriptDefinition::new("ok", Chunk::new("ok", ChunkKind::Global));
        assert!(entity.bind_script(Rc::new(healthy)));
        assert!(entity.script().is_some());
    }

    #[test]
    fn variables_are_shared_with_the_interpreter_view() {
        let mut entity = ScriptedEntity::new("sentry");
        entity.set_variable("health", ZephyrValue::Number(100.0));

        let through_trait = ScriptableEntity::variables(&entity);
        through_trait
            .borrow_mut()
            .insert("health".to_string(), ZephyrValue::Number(50.0));

        assert_eq!(entity.variable("health"), Some(ZephyrValue::Number(50.0)));
    }
}
