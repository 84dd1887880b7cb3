use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// A runtime value. Every variable and stack slot holds one of these.
///
/// There is no heap object model behind this: values are plain data, cloned
/// freely, with no reference semantics beyond what member-access chains
/// provide. `Error` is the sentinel a failed load leaves on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZephyrValue {
    Number(f32),
    Bool(bool),
    Str(String),
    Vec2(Vec2),
    Error,
}

/// Variables for one scope, keyed by name.
pub type ValueMap = HashMap<String, ZephyrValue>;

/// A scope owned by the calling entity and mutated in place by the VM.
///
/// The game loop is single threaded, so interior mutability is enough for a
/// chunk to reach back into the maps of the entity that invoked it.
pub type SharedValueMap = Rc<RefCell<ValueMap>>;

/// Wrap a plain map for sharing with the interpreter.
pub fn shared_map(map: ValueMap) -> SharedValueMap {
    Rc::new(RefCell::new(map))
}

impl ZephyrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ZephyrValue::Number(_) => "number",
            ZephyrValue::Bool(_) => "bool",
            ZephyrValue::Str(_) => "string",
            ZephyrValue::Vec2(_) => "vec2",
            ZephyrValue::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ZephyrValue::Error)
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            ZephyrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ZephyrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `+` adds numbers and concatenates strings. Everything else is a type
    /// error.
    pub fn add(&self, other: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
        match (self, other) {
            (ZephyrValue::Number(a), ZephyrValue::Number(b)) => Ok(ZephyrValue::Number(a + b)),
            (ZephyrValue::Str(a), ZephyrValue::Str(b)) => {
                Ok(ZephyrValue::Str(format!("{}{}", a, b)))
            }
            _ => Err(self.mismatch("+", other)),
        }
    }

    pub fn subtract(&self, other: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
        self.numeric_op("-", other, |a, b| a - b)
    }

    pub fn multiply(&self, other: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
        self.numeric_op("*", other, |a, b| a * b)
    }

    pub fn divide(&self, other: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
        self.numeric_op("/", other, |a, b| a / b)
    }

    /// Ordering comparisons are defined for numbers only.
    pub fn compare(
        &self,
        op: &'static str,
        other: &ZephyrValue,
    ) -> Result<ZephyrValue, RuntimeError> {
        match (self, other) {
            (ZephyrValue::Number(a), ZephyrValue::Number(b)) => {
                let result = match op {
                    ">" => a > b,
                    ">=" => a >= b,
                    "<" => a < b,
                    "<=" => a <= b,
                    _ => return Err(self.mismatch(op, other)),
                };
                Ok(ZephyrValue::Bool(result))
            }
            _ => Err(self.mismatch(op, other)),
        }
    }

    /// Equality is defined for all same-type pairs; values of different types
    /// are simply unequal, never an error. Numeric equality is exact.
    pub fn equals(&self, other: &ZephyrValue) -> bool {
        self == other
    }

    fn numeric_op(
        &self,
        op: &'static str,
        other: &ZephyrValue,
        f: fn(f32, f32) -> f32,
    ) -> Result<ZephyrValue, RuntimeError> {
        match (self, other) {
            (ZephyrValue::Number(a), ZephyrValue::Number(b)) => Ok(ZephyrValue::Number(f(*a, *b))),
            _ => Err(self.mismatch(op, other)),
        }
    }

    fn mismatch(&self, op: &'static str, other: &ZephyrValue) -> RuntimeError {
        RuntimeError::TypeMismatch {
            op,
            lhs: self.type_name(),
            rhs: other.type_name(),
        }
    }
}

impl fmt::Display for ZephyrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZephyrValue::Number(n) => write!(f, "{}", n),
            ZephyrValue::Bool(b) => write!(f, "{}", b),
            ZephyrValue::Str(s) => write!(f, "{}", s),
            ZephyrValue::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            ZephyrValue::Error => write!(f, "<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_numbers_and_concat_strings() {
        let seven = ZephyrValue::Number(3.0)
            .add(&ZephyrValue::Number(4.0))
            .unwrap();
        assert_eq!(seven, ZephyrValue::Number(7.0));

        let joined = ZephyrValue::Str("door_".into())
            .add(&ZephyrValue::Str("open".into()))
            .unwrap();
        assert_eq!(joined, ZephyrValue::Str("door_open".into()));
    }

    #[test]
    fn mixed_add_is_a_type_error() {
        let err = ZephyrValue::Str("abc".into())
            .add(&ZephyrValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { op: "+", .. }));
    }

    #[test]
    fn comparisons_are_numeric_only() {
        let result = ZephyrValue::Number(2.0)
            .compare(">", &ZephyrValue::Number(1.0))
            .unwrap();
        assert_eq!(result, ZephyrValue::Bool(true));

        let err = ZephyrValue::Str("abc".into())
            .compare(">", &ZephyrValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn equality_across_types_is_false_not_an_error() {
        assert!(!ZephyrValue::Number(1.0).equals(&ZephyrValue::Bool(true)));
        assert!(!ZephyrValue::Str("1".into()).equals(&ZephyrValue::Number(1.0)));
        assert!(ZephyrValue::Vec2(Vec2::new(1.0, 2.0)).equals(&ZephyrValue::Vec2(Vec2::new(1.0, 2.0))));
        assert!(ZephyrValue::Error.equals(&ZephyrValue::Error));
    }

    #[test]
    fn numeric_equality_is_exact() {
        // No epsilon tolerance: one ulp apart means unequal.
        assert!(!ZephyrValue::Number(1.0).equals(&ZephyrValue::Number(1.0 + f32::EPSILON)));
        assert!(ZephyrValue::Number(7.0).equals(&ZephyrValue::Number(7.0)));
    }
}
