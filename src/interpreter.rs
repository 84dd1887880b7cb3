use indexmap::IndexMap;
use tracing::warn;

use crate::chunk::Chunk;
use crate::config::VmConfig;
use crate::value::{SharedValueMap, ValueMap, ZephyrValue};
use crate::vm::{ExecState, VirtualMachine};

/// Named arguments carried into an event-handler chunk or a dispatched
/// member-function call: parameter name to value, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs {
    values: IndexMap<String, ZephyrValue>,
}

impl EventArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ZephyrValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ZephyrValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZephyrValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One scriptable game object, as the VM sees it.
///
/// The entity layer that actually owns game objects lives outside this
/// crate; anything that can hand out an id, a variable map, and an event
/// sink can host scripts.
pub trait ScriptableEntity {
    fn id(&self) -> &str;

    /// The entity's persistent variables — the global scope of any chunk
    /// running against this entity, and the map cross-entity chains read
    /// and write.
    fn variables(&self) -> SharedValueMap;

    /// Receive a dispatched event. Fire-and-forget: nothing flows back into
    /// the calling VM's stack.
    fn handle_event(&mut self, name: &str, args: &mut EventArgs);
}

/// Entity lookup, the one capability the VM needs from the surrounding
/// game world to resolve cross-entity chains.
pub trait ZephyrHost {
    fn resolve_entity(&mut self, id: &str) -> Option<&mut dyn ScriptableEntity>;
}

/// Entry points the host entity code calls. Each call builds a fresh VM,
/// runs one chunk to completion or error, and keeps nothing but frame
/// diagnostics; calls are freely re-entrant from the game loop's point of
/// view.
#[derive(Debug, Default)]
pub struct Interpreter {
    config: VmConfig,
    frame_errors: u32,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            frame_errors: 0,
        }
    }

    /// Start of a game tick: reset per-frame diagnostic state. Interpreter
    /// state proper does not exist to reset.
    pub fn begin_frame(&mut self) {
        self.frame_errors = 0;
    }

    /// End of a game tick: flush per-frame diagnostics.
    pub fn end_frame(&mut self) {
        if self.frame_errors > 0 {
            warn!(errors = self.frame_errors, "script errors this frame");
        }
        self.frame_errors = 0;
    }

    pub fn frame_error_count(&self) -> u32 {
        self.frame_errors
    }

    /// Run a state-machine chunk (entity spawn, state enter, state update).
    ///
    /// `globals` is the entity's persistent variable map; `state_vars`
    /// belongs to the entity's current state. Both are mutated in place.
    /// `host` may be absent only for pure global/tooling scripts.
    pub fn interpret_state_chunk<'a>(
        &mut self,
        chunk: &'a Chunk,
        globals: &SharedValueMap,
        host: Option<&'a mut dyn ZephyrHost>,
        state_vars: Option<&SharedValueMap>,
    ) {
        self.run(chunk, globals, host, state_vars, ValueMap::new());
    }

    /// Run an event-handler chunk in response to a named game event.
    ///
    /// The event scope is a private copy seeded from `args`; it is gone when
    /// this call returns.
    pub fn interpret_event_chunk<'a>(
        &mut self,
        chunk: &'a Chunk,
        globals: &SharedValueMap,
        host: Option<&'a mut dyn ZephyrHost>,
        args: &EventArgs,
        state_vars: Option<&SharedValueMap>,
    ) {
        let mut event_vars = ValueMap::new();
        for (name, value) in args.iter() {
            event_vars.insert(name.to_string(), value.clone());
        }
        self.run(chunk, globals, host, state_vars, event_vars);
    }

    fn run<'a>(
        &mut self,
        chunk: &'a Chunk,
        globals: &SharedValueMap,
        host: Option<&'a mut dyn ZephyrHost>,
        state_vars: Option<&SharedValueMap>,
        event_vars: ValueMap,
    ) {
        let mut vm = VirtualMachine::new(
            chunk,
            globals.clone(),
            state_vars.cloned(),
            event_vars,
            host,
            &self.config,
        );
        if vm.run() == ExecState::HaltedError {
            self.frame_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use crate::opcode::OpCode;
    use crate::value::shared_map;

    fn store_chunk(name: &str, target: &str, value: f32) -> Chunk {
        let mut chunk = Chunk::new(name, ChunkKind::State);
        chunk.emit_push_string(target);
        chunk.emit_push_number(value);
        chunk.write_op(OpCode::StoreVariable);
        chunk
    }

    #[test]
    fn event_args_keep_declaration_order() {
        let mut args = EventArgs::new();
        args.set("amount", ZephyrValue::Number(7.0));
        args.set("source", ZephyrValue::Str("drone".into()));
        let names: Vec<&str> = args.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["amount", "source"]);
    }

    #[test]
    fn frame_diagnostics_count_failed_calls() {
        let mut interpreter = Interpreter::new();
        let globals = shared_map(ValueMap::new());

        // A chunk that trips a type error: true + 1.
        let mut bad = Chunk::new("bad_math", ChunkKind::State);
        bad.emit_push_bool(true);
        bad.emit_push_number(1.0);
        bad.write_op(OpCode::Add);

        interpreter.begin_frame();
        interpreter.interpret_state_chunk(&bad, &globals, None, None);
        assert_eq!(interpreter.frame_error_count(), 1);

        // A healthy call on the same interpreter is unaffected.
        let good = store_chunk("good", "health", 10.0);
        interpreter.interpret_state_chunk(&good, &globals, None, None);
        assert_eq!(interpreter.frame_error_count(), 1);
        assert_eq!(
            globals.borrow().get("health"),
            Some(&ZephyrValue::Number(10.0))
        );

        interpreter.end_frame();
        assert_eq!(interpreter.frame_error_count(), 0);
    }
}
