use serde::{Deserialize, Serialize};

/// One-byte instruction tags consumed by the dispatch loop.
///
/// The encoding is a private contract between the compiler's emitter and the
/// VM: one opcode byte followed by the operand bytes declared in
/// [`OpCode::operand_width`]. The dispatch loop and the disassembler both
/// read that declaration, so they cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    PushConstant = 0, // Push a number from the constant pool (operand: pool index)
    PushBool = 1,     // Push a boolean (operand: 0 or 1)
    PushString = 2,   // Push an inline string (operand: u16 length + UTF-8 bytes)
    PushVec2 = 3,     // Push a vector (operands: pool indices for x and y)
    LoadVariable = 4, // Pop an identifier chain, resolve it, push the value
    StoreVariable = 5, // Pop a value and an identifier chain, store the value
    Add = 6,
    Subtract = 7,
    Multiply = 8,
    Divide = 9,
    Equal = 10,
    NotEqual = 11,
    Greater = 12,
    GreaterEqual = 13,
    Less = 14,
    LessEqual = 15,
    FireEvent = 16, // Dispatch an event to an entity (operand: argument count)
}

/// Operand bytes that follow an opcode in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    /// No operand bytes.
    None,
    /// One operand byte.
    Byte,
    /// Two operand bytes.
    TwoBytes,
    /// A u16 little-endian length followed by that many UTF-8 bytes.
    InlineString,
}

impl OpCode {
    /// Every opcode, in discriminant order. Used by the tests that keep the
    /// decoder and the disassembler honest.
    pub const ALL: [OpCode; 17] = [
        OpCode::PushConstant,
        OpCode::PushBool,
        OpCode::PushString,
        OpCode::PushVec2,
        OpCode::LoadVariable,
        OpCode::StoreVariable,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Greater,
        OpCode::GreaterEqual,
        OpCode::Less,
        OpCode::LessEqual,
        OpCode::FireEvent,
    ];

    pub fn operand_width(self) -> OperandWidth {
        match self {
            OpCode::PushConstant => OperandWidth::Byte,
            OpCode::PushBool => OperandWidth::Byte,
            OpCode::PushString => OperandWidth::InlineString,
            OpCode::PushVec2 => OperandWidth::TwoBytes,
            OpCode::FireEvent => OperandWidth::Byte,
            OpCode::LoadVariable
            | OpCode::StoreVariable
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::Less
            | OpCode::LessEqual => OperandWidth::None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::PushConstant => "push_constant",
            OpCode::PushBool => "push_bool",
            OpCode::PushString => "push_string",
            OpCode::PushVec2 => "push_vec2",
            OpCode::LoadVariable => "load_variable",
            OpCode::StoreVariable => "store_variable",
            OpCode::Add => "add",
            OpCode::Subtract => "subtract",
            OpCode::Multiply => "multiply",
            OpCode::Divide => "divide",
            OpCode::Equal => "equal",
            OpCode::NotEqual => "not_equal",
            OpCode::Greater => "greater",
            OpCode::GreaterEqual => "greater_equal",
            OpCode::Less => "less",
            OpCode::LessEqual => "less_equal",
            OpCode::FireEvent => "fire_event",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(OpCode::PushConstant),
            1 => Ok(OpCode::PushBool),
            2 => Ok(OpCode::PushString),
            3 => Ok(OpCode::PushVec2),
            4 => Ok(OpCode::LoadVariable),
            5 => Ok(OpCode::StoreVariable),
            6 => Ok(OpCode::Add),
            7 => Ok(OpCode::Subtract),
            8 => Ok(OpCode::Multiply),
            9 => Ok(OpCode::Divide),
            10 => Ok(OpCode::Equal),
            11 => Ok(OpCode::NotEqual),
            12 => Ok(OpCode::Greater),
            13 => Ok(OpCode::GreaterEqual),
            14 => Ok(OpCode::Less),
            15 => Ok(OpCode::LessEqual),
            16 => Ok(OpCode::FireEvent),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_byte() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::try_from(op as u8), Ok(op));
        }
    }

    #[test]
    fn bytes_outside_the_instruction_set_are_rejected() {
        assert_eq!(OpCode::try_from(17), Err(17));
        assert_eq!(OpCode::try_from(0xff), Err(0xff));
    }

    #[test]
    fn operand_widths_cover_the_literal_forms() {
        assert_eq!(OpCode::PushConstant.operand_width(), OperandWidth::Byte);
        assert_eq!(OpCode::PushString.operand_width(), OperandWidth::InlineString);
        assert_eq!(OpCode::PushVec2.operand_width(), OperandWidth::TwoBytes);
        assert_eq!(OpCode::Add.operand_width(), OperandWidth::None);
    }
}
