//! Assembler error types.
//!
//! Mirrors the target-facing error taxonomy: invalid instructions, register
//! class mismatches, out-of-range PC-relative references, section size
//! violations and resource failures. Every variant carries a stable numeric
//! `code()` so a caller can rethrow without re-deriving it from the message.

use thiserror::Error;

/// Assembler error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// No instruction encoding matches the given mnemonic/argument shape.
    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    /// An argument failed its type predicate (range, multiple-of, register class).
    #[error("wrong argument at {context}: {detail}")]
    WrongArgument { context: String, detail: String },

    /// A PC-relative reference is out of range and no wider variant exists.
    #[error("relative offset out of range for {0}")]
    RelOutOfRange(String),

    /// A section's computed size/address violates its alignment invariant.
    #[error("wrong section size: {0}")]
    WrongSectionSize(String),

    /// Bit-template rendering failed (field widths don't sum to 16/32, or a
    /// field overflows its declared width).
    #[error("bad template `{template}`: {detail}")]
    BadTemplate { template: String, detail: String },

    /// Expression could not be evaluated (unknown symbol, malformed postfix, ...).
    #[error("evaluation error at line {line}: {detail}")]
    Eval { line: u32, detail: String },

    /// Malformed assembly syntax.
    #[error("syntax error at line {line}: {detail}")]
    Syntax { line: u32, detail: String },

    /// Unknown I/O device or device command.
    #[error("unknown device/command: {0}")]
    UnknownDevice(String),

    /// Source or output file could not be opened/read.
    #[error("file open failed: {0}")]
    FileOpen(String),

    /// Output file could not be written.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Internal invariant violation (miscompilation guard).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AsmError {
    /// Stable numeric code, matching the exit-code families in §6.2/§7.
    pub fn code(&self) -> u32 {
        match self {
            AsmError::InvalidInstruction(_) => 1,
            AsmError::WrongArgument { .. } => 2,
            AsmError::RelOutOfRange(_) => 3,
            AsmError::WrongSectionSize(_) => 4,
            AsmError::BadTemplate { .. } => 5,
            AsmError::Eval { .. } => 6,
            AsmError::Syntax { .. } => 7,
            AsmError::UnknownDevice(_) => 8,
            AsmError::FileOpen(_) => 9,
            AsmError::WriteFailed(_) => 10,
            AsmError::Internal(_) => 99,
        }
    }
}

pub type AsmResult<T> = Result<T, AsmError>;
