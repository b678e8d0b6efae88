//! The two invariant-violation taxonomies (spec §7): errors raised
//! synchronously by the compiler and by the VM. User-facing assignability
//! failures are *not* represented here -- those are [`crate::diagnostic::Diagnostic`]s
//! appended to the running module, never a `Result::Err`.

use thiserror::Error;

/// Raised synchronously while lowering an AST into a [`crate::module::Module`].
/// No partial module is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unsupported AST node: {0}")]
    UnsupportedNode(String),

    #[error("binary expression operator not implemented: {0}")]
    UnsupportedOperator(String),

    #[error("symbol `{0}` referenced outside of any subroutine")]
    SymbolWithoutRoutine(String),

    #[error("symbol `{0}` declared more than once in the same scope")]
    DuplicateSymbol(String),

    #[error("type argument default subroutine could not be registered for `{0}`")]
    InvalidTypeArgumentDefault(String),
}

/// Raised synchronously during execution: malformed bytecode or a violated
/// VM invariant. Terminates the run; the arena must be cleared before any
/// retry (spec §7, taxonomy 3).
#[derive(Debug, Error)]
pub enum VmError {
    #[error("unknown opcode byte {0:#04x} at ip {1}")]
    UnknownOpcode(u8, u32),

    #[error("operand stack underflow at ip {0}")]
    StackUnderflow(u32),

    #[error("frame stack underflow at ip {0}")]
    FrameUnderflow(u32),

    #[error("active-subroutine stack underflow at ip {0}")]
    ActiveSubroutineUnderflow(u32),

    #[error("loop stack underflow at ip {0}")]
    LoopUnderflow(u32),

    #[error("call to unresolved subroutine address {0}")]
    UnresolvedSubroutine(u32),

    #[error("frame offset {levels} levels above the current frame exceeds the active stack depth")]
    FrameOffsetOutOfRange { levels: u16 },

    #[error("attempted to steal or mutate a Stored type in place")]
    StolenStoredType,

    #[error("storage pool read at address {0} is out of bounds")]
    StorageOutOfBounds(u32),

    #[error("active-subroutine stack exceeded its depth bound at ip {0}")]
    CallDepthExceeded(u32),

    #[error("extends recursion exceeded its depth bound")]
    ExtendsDepthExceeded,
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type VmResult<T> = Result<T, VmError>;
