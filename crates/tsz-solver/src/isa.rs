//! The bytecode instruction set.
//!
//! Every opcode is a single byte followed by a fixed number of immediate
//! operand bytes. The operand width of an opcode never depends on its
//! operands (no variable-length encodings), so a decoder only needs to know
//! the opcode to know how many bytes to skip. [`Op::operand_len`] is that
//! single source of truth; the compiler, the optimizer, and the VM all use
//! it instead of hard-coding widths at each call site.

/// A single bytecode opcode.
///
/// `repr(u8)` so a [`Module`](crate::module::Module)'s bytecode buffer can be
/// decoded with a plain `u8 -> Op` cast through [`Op::from_byte`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Halt = 0,
    Noop,

    // Atomic type constructors: push a fresh Type of the given kind.
    Any,
    Unknown,
    Never,
    Null,
    Undefined,
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    True,
    False,

    // Literal type constructors: `u32 a` is a storage address.
    StringLiteral,
    NumberLiteral,
    BigIntLiteral,

    // Frame/call control.
    Frame,
    Return,
    /// `u32 addr, u16 argc`
    TailCall,
    /// `u32 addr, u16 argc`
    Call,
    /// `i32 rel`
    Jump,
    /// `i32 falseRel, i32 trueRel`
    JumpCondition,

    Extends,
    /// `u16 slotIdx, u32 endRel`
    Distribute,

    // Compound constructors: `u16 n` members consumed from the current frame.
    Union,
    Tuple,
    ObjectLiteral,
    TemplateLiteral,

    // Shape operators: act on the type currently on top of the stack.
    TupleMember,
    PropertySignature,
    Array,
    Rest,
    RestReuse,
    Parameter,
    Optional,
    Readonly,
    Initializer,
    Length,
    IndexAccess,

    TypeArgument,
    /// `u32 addr` of the default-value subroutine.
    TypeArgumentDefault,

    /// `u16 frameUp, u16 idx`
    Loads,
    /// `u16 n`
    Instantiate,
    /// `u16 n`
    CallExpression,

    Assign,
    /// `u32 addr` of the subroutine whose `narrowed` cache is overwritten.
    Set,
    /// `u16 n`
    Slots,
    Widen,
    /// `u16 code`
    Error,

    // Header-only pseudo-instructions; never reached by the fetch loop.
    /// `u32 size` — introduces the source-map region.
    SourceMap,
    /// `u32 nameAddr, u32 bodyAddr, u8 flags`
    Subroutine,
    Main,
}

impl Op {
    /// Number of bytes occupied by this opcode's immediate operands
    /// (not counting the opcode byte itself).
    #[must_use]
    pub const fn operand_len(self) -> usize {
        match self {
            Op::Halt
            | Op::Noop
            | Op::Any
            | Op::Unknown
            | Op::Never
            | Op::Null
            | Op::Undefined
            | Op::String
            | Op::Number
            | Op::Boolean
            | Op::BigInt
            | Op::Symbol
            | Op::True
            | Op::False
            | Op::Frame
            | Op::Return
            | Op::Extends
            | Op::TupleMember
            | Op::PropertySignature
            | Op::Array
            | Op::Rest
            | Op::RestReuse
            | Op::Parameter
            | Op::Optional
            | Op::Readonly
            | Op::Initializer
            | Op::Length
            | Op::IndexAccess
            | Op::TypeArgument
            | Op::Assign
            | Op::Widen
            | Op::Main => 0,

            Op::Union | Op::Tuple | Op::ObjectLiteral | Op::TemplateLiteral => 2,
            Op::Instantiate | Op::CallExpression | Op::Slots | Op::Error => 2,

            Op::StringLiteral | Op::NumberLiteral | Op::BigIntLiteral => 4,
            Op::TypeArgumentDefault | Op::Set | Op::SourceMap => 4,
            Op::Jump => 4,

            Op::Loads => 4, // u16 + u16
            Op::Distribute => 6, // u16 + u32

            Op::TailCall | Op::Call => 6, // u32 + u16
            Op::JumpCondition => 8, // i32 + i32

            Op::Subroutine => 9, // u32 + u32 + u8
        }
    }

    /// Total instruction length, opcode byte included.
    #[must_use]
    pub const fn len(self) -> usize {
        1 + self.operand_len()
    }

    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Op> {
        // SAFETY-free table lookup: keep this list in lockstep with the enum
        // above. A byte that doesn't match any entry is malformed bytecode,
        // not a panic -- callers surface it as `VmError::UnknownOpcode`.
        const TABLE: &[Op] = &[
            Op::Halt,
            Op::Noop,
            Op::Any,
            Op::Unknown,
            Op::Never,
            Op::Null,
            Op::Undefined,
            Op::String,
            Op::Number,
            Op::Boolean,
            Op::BigInt,
            Op::Symbol,
            Op::True,
            Op::False,
            Op::StringLiteral,
            Op::NumberLiteral,
            Op::BigIntLiteral,
            Op::Frame,
            Op::Return,
            Op::TailCall,
            Op::Call,
            Op::Jump,
            Op::JumpCondition,
            Op::Extends,
            Op::Distribute,
            Op::Union,
            Op::Tuple,
            Op::ObjectLiteral,
            Op::TemplateLiteral,
            Op::TupleMember,
            Op::PropertySignature,
            Op::Array,
            Op::Rest,
            Op::RestReuse,
            Op::Parameter,
            Op::Optional,
            Op::Readonly,
            Op::Initializer,
            Op::Length,
            Op::IndexAccess,
            Op::TypeArgument,
            Op::TypeArgumentDefault,
            Op::Loads,
            Op::Instantiate,
            Op::CallExpression,
            Op::Assign,
            Op::Set,
            Op::Slots,
            Op::Widen,
            Op::Error,
            Op::SourceMap,
            Op::Subroutine,
            Op::Main,
        ];
        TABLE.get(byte as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode_byte() {
        for (i, op) in [
            Op::Halt,
            Op::Call,
            Op::TailCall,
            Op::Distribute,
            Op::JumpCondition,
            Op::Subroutine,
            Op::Main,
        ]
        .into_iter()
        .enumerate()
        {
            // Not a positional check -- just confirms from_byte/operand_len
            // don't desync for opcodes with nontrivial operand widths.
            let _ = i;
            assert_eq!(Op::from_byte(op as u8), Some(op));
        }
    }

    #[test]
    fn call_and_tail_call_share_operand_width() {
        assert_eq!(Op::Call.operand_len(), Op::TailCall.operand_len());
    }
}
