use thiserror::Error;

/// Failures raised while a chunk is being interpreted.
///
/// None of these escape an interpretation call: the VM reports the error to
/// the log sink, tags it with the chunk name, and halts the current call.
/// A broken script must never take the game frame down with it.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("'{segment}' in '{chain}' does not name an entity")]
    NotAnEntityRef { chain: String, segment: String },

    #[error("cannot assign to '{0}': target variable does not exist")]
    UndefinedAssignTarget(String),

    #[error("type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("invalid identifier chain '{0}'")]
    BadIdentifier(String),

    #[error("'{chain}': {type_name} has no member '{member}'")]
    NoSuchMember {
        chain: String,
        type_name: &'static str,
        member: String,
    },

    #[error("{context} expects an identifier string, found {found}")]
    NotAnIdentifier {
        context: &'static str,
        found: &'static str,
    },

    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("truncated operand for {0}")]
    TruncatedOperand(&'static str),

    #[error("constant index {0} out of range")]
    BadConstantIndex(u8),

    #[error("stack underflow on {0}")]
    StackUnderflow(&'static str),

    #[error("no entity host bound to this script")]
    NoHost,

    #[error("step budget of {0} exceeded")]
    StepBudgetExceeded(usize),
}
