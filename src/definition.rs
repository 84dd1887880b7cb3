use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::chunk::{Chunk, ChunkKind};

/// One compiled script: the global/state-machine chunk plus every named
/// state and event chunk, all exclusively owned here.
///
/// The chunk table keeps declaration order, which is what makes "the first
/// declared state" a meaningful notion on entity spawn.
#[derive(Debug, Clone)]
pub struct ScriptDefinition {
    name: String,
    global_chunk: Chunk,
    chunks: IndexMap<String, Chunk>,
    valid: bool,
}

impl ScriptDefinition {
    pub fn new(name: impl Into<String>, global_chunk: Chunk) -> Self {
        Self {
            name: name.into(),
            global_chunk,
            chunks: IndexMap::new(),
            valid: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn global_chunk(&self) -> &Chunk {
        &self.global_chunk
    }

    /// Add a named chunk in declaration order. A duplicate name keeps the
    /// first chunk and marks the definition invalid.
    pub fn add_chunk(&mut self, chunk: Chunk) {
        let name = chunk.name().to_string();
        if self.chunks.contains_key(&name) {
            warn!(script = %self.name, chunk = %name, "duplicate chunk name in script");
            self.valid = false;
            return;
        }
        self.chunks.insert(name, chunk);
    }

    /// Exact-name lookup. `None` means not found.
    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        self.chunks.get(name)
    }

    /// The first declared state's chunk, used as the initial state when the
    /// script is bound to a spawning entity.
    pub fn initial_state_chunk(&self) -> Option<&Chunk> {
        self.chunks
            .values()
            .find(|chunk| chunk.kind() == ChunkKind::State)
    }

    pub fn state_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .values()
            .filter(|chunk| chunk.kind() == ChunkKind::State)
    }

    pub fn event_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .values()
            .filter(|chunk| chunk.kind() == ChunkKind::Event)
    }

    /// Whether compilation fully succeeded. An invalid definition must never
    /// be bound to a live entity.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }
}

/// Owns every compiled script, keyed by source path and by logical name.
///
/// This is an explicitly owned object handed to whoever compiles and binds
/// scripts, not a process-wide singleton, so tests and multiple script
/// worlds can each carry their own.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    by_path: HashMap<String, Rc<ScriptDefinition>>,
    by_name: HashMap<String, Rc<ScriptDefinition>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly compiled definition under its source path.
    ///
    /// Registering the same path twice is idempotent: the existing
    /// definition is returned and the new one dropped.
    pub fn register(&mut self, path: &str, definition: ScriptDefinition) -> Rc<ScriptDefinition> {
        if let Some(existing) = self.by_path.get(path) {
            return Rc::clone(existing);
        }
        let definition = Rc::new(definition);
        self.by_path.insert(path.to_string(), Rc::clone(&definition));
        match self.by_name.entry(definition.name().to_string()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Rc::clone(&definition));
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                warn!(
                    script = %definition.name(),
                    path,
                    "script name already registered from another path; name lookup keeps the first"
                );
            }
        }
        definition
    }

    /// Resolve by logical script name, falling back to source path.
    pub fn find(&self, name_or_path: &str) -> Option<Rc<ScriptDefinition>> {
        self.by_name
            .get(name_or_path)
            .or_else(|| self.by_path.get(name_or_path))
            .map(Rc::clone)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition() -> ScriptDefinition {
        let mut definition =
            ScriptDefinition::new("sentry", Chunk::new("sentry", ChunkKind::Global));
        definition.add_chunk(Chunk::new("Patrol", ChunkKind::State));
        definition.add_chunk(Chunk::new("on_damage", ChunkKind::Event));
        definition.add_chunk(Chunk::new("Chase", ChunkKind::State));
        definition
    }

    #[test]
    fn chunk_lookup_is_exact() {
        let definition = sample_definition();
        assert!(definition.chunk("Patrol").is_some());
        assert!(definition.chunk("patrol").is_none());
        assert!(definition.chunk("missing").is_none());
    }

    #[test]
    fn first_declared_state_is_the_initial_state() {
        let definition = sample_definition();
        assert_eq!(definition.initial_state_chunk().unwrap().name(), "Patrol");
    }

    #[test]
    fn state_and_event_views_are_disjoint() {
        let definition = sample_definition();
        let states: Vec<&str> = definition.state_chunks().map(Chunk::name).collect();
        let events: Vec<&str> = definition.event_chunks().map(Chunk::name).collect();
        assert_eq!(states, vec!["Patrol", "Chase"]);
        assert_eq!(events, vec!["on_damage"]);
    }

    #[test]
    fn duplicate_chunk_names_invalidate_the_definition() {
        let mut definition = sample_definition();
        assert!(definition.is_valid());
        definition.add_chunk(Chunk::new("Patrol", ChunkKind::State));
        assert!(!definition.is_valid());
    }

    #[test]
    fn registering_the_same_path_twice_returns_the_same_definition() {
        let mut registry = ScriptRegistry::new();
        let first = registry.register("scripts/sentry.zephyr", sample_definition());
        let second = registry.register("scripts/sentry.zephyr", sample_definition());
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_resolve_by_name_and_by_path() {
        let mut registry = ScriptRegistry::new();
        registry.register("scripts/sentry.zephyr", sample_definition());
        assert!(registry.find("sentry").is_some());
        assert!(registry.find("scripts/sentry.zephyr").is_some());
        assert!(registry.find("turret").is_none());
    }
}
