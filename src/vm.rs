use glam::Vec2;
use tracing::{error, trace};

use crate::chunk::Chunk;
use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::interpreter::{EventArgs, ZephyrHost};
use crate::member::MemberAccess;
use crate::opcode::OpCode;
use crate::value::{SharedValueMap, ValueMap, ZephyrValue};

/// Where an interpretation call ended up. A VM starts `Running` and finishes
/// in exactly one of the halted states; there is no way back out of either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecState {
    Running,
    HaltedNormal,
    HaltedError,
}

/// The stack machine. One instance interprets one chunk and is thrown away.
///
/// The global and state maps belong to the calling entity and are mutated in
/// place; the event map is private to this call. Any reported error flips
/// the VM into `HaltedError`, skips the remaining bytes, and returns control
/// to the caller: a broken script is a logged no-op, not a crashed frame.
pub(crate) struct VirtualMachine<'a> {
    chunk: &'a Chunk,
    ip: usize,
    stack: Vec<ZephyrValue>,
    state: ExecState,
    event_vars: ValueMap,
    state_vars: Option<SharedValueMap>,
    global_vars: SharedValueMap,
    host: Option<&'a mut dyn ZephyrHost>,
    steps: usize,
    max_steps: usize,
    trace_execution: bool,
}

impl<'a> VirtualMachine<'a> {
    pub(crate) fn new(
        chunk: &'a Chunk,
        global_vars: SharedValueMap,
        state_vars: Option<SharedValueMap>,
        event_vars: ValueMap,
        host: Option<&'a mut dyn ZephyrHost>,
        config: &VmConfig,
    ) -> Self {
        Self {
            chunk,
            ip: 0,
            stack: Vec::with_capacity(16),
            state: ExecState::Running,
            event_vars,
            state_vars,
            global_vars,
            host,
            steps: 0,
            max_steps: config.max_steps,
            trace_execution: config.trace_execution,
        }
    }

    /// Walk the byte stream to the end or to the first reported error.
    pub(crate) fn run(&mut self) -> ExecState {
        while self.state == ExecState::Running {
            if self.ip >= self.chunk.len() {
                self.state = ExecState::HaltedNormal;
                break;
            }
            self.steps += 1;
            if self.steps > self.max_steps {
                self.report(RuntimeError::StepBudgetExceeded(self.max_steps));
                break;
            }
            if let Err(err) = self.step() {
                self.report(err);
            }
        }
        self.state
    }

    fn report(&mut self, err: RuntimeError) {
        error!(chunk = %self.chunk.name(), "script error: {err}");
        self.state = ExecState::HaltedError;
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        let at = self.ip;
        let byte = self.read_byte("opcode")?;
        let op = OpCode::try_from(byte).map_err(RuntimeError::UnknownOpcode)?;
        if self.trace_execution {
            trace!(chunk = %self.chunk.name(), ip = at, op = op.mnemonic(), "step");
        }
        match op {
            OpCode::PushConstant => {
                let index = self.read_byte("push_constant")?;
                let value = self
                    .chunk
                    .get_number_constant(index)
                    .ok_or(RuntimeError::BadConstantIndex(index))?;
                self.stack.push(ZephyrValue::Number(value));
            }
            OpCode::PushBool => {
                let operand = self.read_byte("push_bool")?;
                self.stack.push(ZephyrValue::Bool(operand != 0));
            }
            OpCode::PushString => {
                let text = self.read_inline_string()?;
                self.stack.push(ZephyrValue::Str(text));
            }
            OpCode::PushVec2 => {
                let x_index = self.read_byte("push_vec2")?;
                let y_index = self.read_byte("push_vec2")?;
                let x = self
                    .chunk
                    .get_number_constant(x_index)
                    .ok_or(RuntimeError::BadConstantIndex(x_index))?;
                let y = self
                    .chunk
                    .get_number_constant(y_index)
                    .ok_or(RuntimeError::BadConstantIndex(y_index))?;
                self.stack.push(ZephyrValue::Vec2(Vec2::new(x, y)));
            }
            OpCode::LoadVariable => {
                let access = self.pop_chain("load_variable")?;
                match self.load_chain(&access) {
                    Ok(value) => self.stack.push(value),
                    Err(err) => {
                        // A failed load leaves the sentinel behind; the
                        // report below ends the call anyway.
                        self.stack.push(ZephyrValue::Error);
                        return Err(err);
                    }
                }
            }
            OpCode::StoreVariable => {
                let value = self.pop("store_variable")?;
                let access = self.pop_chain("store_variable")?;
                self.store_chain(&access, value)?;
            }
            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::Less
            | OpCode::LessEqual => {
                let rhs = self.pop("operator")?;
                let lhs = self.pop("operator")?;
                let result = match op {
                    OpCode::Add => lhs.add(&rhs)?,
                    OpCode::Subtract => lhs.subtract(&rhs)?,
                    OpCode::Multiply => lhs.multiply(&rhs)?,
                    OpCode::Divide => lhs.divide(&rhs)?,
                    OpCode::Equal => ZephyrValue::Bool(lhs.equals(&rhs)),
                    OpCode::NotEqual => ZephyrValue::Bool(!lhs.equals(&rhs)),
                    OpCode::Greater => lhs.compare(">", &rhs)?,
                    OpCode::GreaterEqual => lhs.compare(">=", &rhs)?,
                    OpCode::Less => lhs.compare("<", &rhs)?,
                    OpCode::LessEqual => lhs.compare("<=", &rhs)?,
                    _ => return Err(RuntimeError::UnknownOpcode(op as u8)),
                };
                self.stack.push(result);
            }
            OpCode::FireEvent => {
                let arg_count = self.read_byte("fire_event")?;
                let mut pairs = Vec::with_capacity(arg_count as usize);
                for _ in 0..arg_count {
                    let value = self.pop("fire_event argument")?;
                    let name = self.pop_string("fire_event argument")?;
                    pairs.push((name, value));
                }
                let event = self.pop_string("fire_event")?;
                let target = self.pop_chain("fire_event")?;
                let mut args = EventArgs::new();
                for (name, value) in pairs.into_iter().rev() {
                    args.set(name, value);
                }
                let target_id = self.entity_chain_target(&target)?;
                let host = self.host.as_deref_mut().ok_or(RuntimeError::NoHost)?;
                let entity = host
                    .resolve_entity(&target_id)
                    .ok_or_else(|| RuntimeError::UnknownEntity(target_id.clone()))?;
                // Fire and forget: nothing comes back onto the stack.
                entity.handle_event(&event, &mut args);
            }
        }
        Ok(())
    }

    // --- byte stream decoding -------------------------------------------

    fn read_byte(&mut self, context: &'static str) -> Result<u8, RuntimeError> {
        let byte = self
            .chunk
            .get_byte(self.ip)
            .ok_or(RuntimeError::TruncatedOperand(context))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_inline_string(&mut self) -> Result<String, RuntimeError> {
        let low = self.read_byte("push_string")?;
        let high = self.read_byte("push_string")?;
        let len = u16::from_le_bytes([low, high]) as usize;
        let end = self.ip + len;
        let bytes = self
            .chunk
            .bytes()
            .get(self.ip..end)
            .ok_or(RuntimeError::TruncatedOperand("push_string"))?;
        // The emitter writes valid UTF-8; lossy decoding keeps a corrupted
        // chunk fail-soft instead of fatal.
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.ip = end;
        Ok(text)
    }

    // --- stack helpers ---------------------------------------------------

    fn pop(&mut self, context: &'static str) -> Result<ZephyrValue, RuntimeError> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow(context))
    }

    fn pop_string(&mut self, context: &'static str) -> Result<String, RuntimeError> {
        match self.pop(context)? {
            ZephyrValue::Str(text) => Ok(text),
            other => Err(RuntimeError::NotAnIdentifier {
                context,
                found: other.type_name(),
            }),
        }
    }

    fn pop_chain(&mut self, context: &'static str) -> Result<MemberAccess, RuntimeError> {
        let text = self.pop_string(context)?;
        match MemberAccess::parse(&text) {
            Some(access) => Ok(access),
            None => Err(RuntimeError::BadIdentifier(text)),
        }
    }

    // --- scope resolution ------------------------------------------------
    // Lookup order is always event, then state, then global. Never the
    // reverse.

    fn load_scoped(&self, name: &str) -> Option<ZephyrValue> {
        if let Some(value) = self.event_vars.get(name) {
            return Some(value.clone());
        }
        if let Some(state) = &self.state_vars {
            if let Some(value) = state.borrow().get(name) {
                return Some(value.clone());
            }
        }
        self.global_vars.borrow().get(name).cloned()
    }

    fn store_scoped(&mut self, name: &str, value: ZephyrValue) {
        if self.event_vars.contains_key(name) {
            self.event_vars.insert(name.to_string(), value);
            return;
        }
        if let Some(state) = &self.state_vars {
            let mut state = state.borrow_mut();
            if state.contains_key(name) {
                state.insert(name.to_string(), value);
                return;
            }
        }
        {
            let mut globals = self.global_vars.borrow_mut();
            if globals.contains_key(name) {
                globals.insert(name.to_string(), value);
                return;
            }
        }
        // Unknown names come to life in the innermost persistent scope: the
        // state map when the chunk has one, otherwise the entity globals.
        match &self.state_vars {
            Some(state) => {
                state.borrow_mut().insert(name.to_string(), value);
            }
            None => {
                self.global_vars.borrow_mut().insert(name.to_string(), value);
            }
        }
    }

    // --- identifier chains -----------------------------------------------
    //
    // The head either names a scoped variable (vec2 member access, or a
    // string holding an entity id) or is an entity id itself. Every hop
    // after that re-resolves through the host, so a dead entity fails the
    // access instead of dereferencing stale data.

    fn load_chain(&mut self, access: &MemberAccess) -> Result<ZephyrValue, RuntimeError> {
        if access.is_plain() {
            return self
                .load_scoped(access.head())
                .ok_or_else(|| RuntimeError::UndefinedVariable(access.head().to_string()));
        }
        let segments = access.segments();
        if let Some(base) = self.load_scoped(access.head()) {
            return match base {
                ZephyrValue::Vec2(v) if segments.len() == 2 && segments[1] == "x" => {
                    Ok(ZephyrValue::Number(v.x))
                }
                ZephyrValue::Vec2(v) if segments.len() == 2 && segments[1] == "y" => {
                    Ok(ZephyrValue::Number(v.y))
                }
                ZephyrValue::Str(id) => self.load_from_entity(&id, &segments[1..], access),
                other => Err(RuntimeError::NoSuchMember {
                    chain: access.to_string(),
                    type_name: other.type_name(),
                    member: segments[1].clone(),
                }),
            };
        }
        self.load_from_entity(access.head(), &segments[1..], access)
    }

    fn store_chain(
        &mut self,
        access: &MemberAccess,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        if access.is_plain() {
            self.store_scoped(access.head(), value);
            return Ok(());
        }
        let segments = access.segments();
        if let Some(base) = self.load_scoped(access.head()) {
            return match base {
                ZephyrValue::Vec2(_) if segments.len() == 2 && (segments[1] == "x" || segments[1] == "y") => {
                    self.store_scoped_component(access, value)
                }
                ZephyrValue::Str(id) => self.store_to_entity(&id, &segments[1..], access, value),
                other => Err(RuntimeError::NoSuchMember {
                    chain: access.to_string(),
                    type_name: other.type_name(),
                    member: segments[1].clone(),
                }),
            };
        }
        self.store_to_entity(access.head(), &segments[1..], access, value)
    }

    /// Mutate one component of a scoped vec2, leaving the other untouched,
    /// in whichever scope the variable lives.
    fn store_scoped_component(
        &mut self,
        access: &MemberAccess,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let ZephyrValue::Number(n) = value else {
            return Err(RuntimeError::TypeMismatch {
                op: "=",
                lhs: "number",
                rhs: value.type_name(),
            });
        };
        let name = access.head();
        let component = access.segments()[1].as_str();
        let write = |slot: &mut ZephyrValue| {
            if let ZephyrValue::Vec2(v) = slot {
                if component == "x" {
                    v.x = n;
                } else {
                    v.y = n;
                }
            }
        };
        if let Some(slot) = self.event_vars.get_mut(name) {
            write(slot);
            return Ok(());
        }
        if let Some(state) = &self.state_vars {
            let mut map = state.borrow_mut();
            if let Some(slot) = map.get_mut(name) {
                write(slot);
                return Ok(());
            }
        }
        let mut globals = self.global_vars.borrow_mut();
        if let Some(slot) = globals.get_mut(name) {
            write(slot);
            return Ok(());
        }
        Err(RuntimeError::UndefinedVariable(name.to_string()))
    }

    fn load_from_entity(
        &mut self,
        start_id: &str,
        rest: &[String],
        access: &MemberAccess,
    ) -> Result<ZephyrValue, RuntimeError> {
        let (variable, hops) = rest
            .split_last()
            .ok_or_else(|| RuntimeError::BadIdentifier(access.to_string()))?;
        let vars = self.walk_hops(start_id, hops, access)?;
        let value = vars.borrow().get(variable.as_str()).cloned();
        value.ok_or_else(|| RuntimeError::UndefinedVariable(access.to_string()))
    }

    /// Cross-entity assignment only lands on variables that already exist;
    /// implicit creation is a local-scope affordance.
    fn store_to_entity(
        &mut self,
        start_id: &str,
        rest: &[String],
        access: &MemberAccess,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let (variable, hops) = rest
            .split_last()
            .ok_or_else(|| RuntimeError::BadIdentifier(access.to_string()))?;
        let vars = self.walk_hops(start_id, hops, access)?;
        let mut map = vars.borrow_mut();
        if !map.contains_key(variable.as_str()) {
            return Err(RuntimeError::UndefinedAssignTarget(access.to_string()));
        }
        map.insert(variable.clone(), value);
        Ok(())
    }

    /// Follow entity hops left to right, returning the variable map of the
    /// final entity. Each hop is a live lookup.
    fn walk_hops(
        &mut self,
        start_id: &str,
        hops: &[String],
        access: &MemberAccess,
    ) -> Result<SharedValueMap, RuntimeError> {
        let mut vars = self.resolve_entity_vars(start_id)?;
        for segment in hops {
            let next_id = {
                let map = vars.borrow();
                match map.get(segment.as_str()) {
                    Some(ZephyrValue::Str(id)) => id.clone(),
                    Some(_) => {
                        return Err(RuntimeError::NotAnEntityRef {
                            chain: access.to_string(),
                            segment: segment.clone(),
                        })
                    }
                    None => {
                        return Err(RuntimeError::UndefinedVariable(format!(
                            "{} (in '{}')",
                            segment, access
                        )))
                    }
                }
            };
            vars = self.resolve_entity_vars(&next_id)?;
        }
        Ok(vars)
    }

    fn resolve_entity_vars(&mut self, id: &str) -> Result<SharedValueMap, RuntimeError> {
        let host = self.host.as_deref_mut().ok_or(RuntimeError::NoHost)?;
        let entity = host
            .resolve_entity(id)
            .ok_or_else(|| RuntimeError::UnknownEntity(id.to_string()))?;
        Ok(entity.variables())
    }

    /// Resolve a fire-event target chain all the way to an entity id.
    fn entity_chain_target(&mut self, access: &MemberAccess) -> Result<String, RuntimeError> {
        let mut id = match self.load_scoped(access.head()) {
            Some(ZephyrValue::Str(id)) => id,
            Some(_) => {
                return Err(RuntimeError::NotAnEntityRef {
                    chain: access.to_string(),
                    segment: access.head().to_string(),
                })
            }
            None => access.head().to_string(),
        };
        for segment in &access.segments()[1..] {
            let vars = self.resolve_entity_vars(&id)?;
            let next_id = {
                let map = vars.borrow();
                match map.get(segment.as_str()) {
                    Some(ZephyrValue::Str(next)) => next.clone(),
                    Some(_) => {
                        return Err(RuntimeError::NotAnEntityRef {
                            chain: access.to_string(),
                            segment: segment.clone(),
                        })
                    }
                    None => {
                        return Err(RuntimeError::UndefinedVariable(format!(
                            "{} (in '{}')",
                            segment, access
                        )))
                    }
                }
            };
            id = next_id;
        }
        Ok(id)
    }
}
