//! Compiler error and warning types.
//!
//! Spans the BASIC front-end and IR optimizer so a caller can rethrow
//! without translating between module-local error enums.

use thiserror::Error;

/// Compiler error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("syntax error at line {line}: {detail}")]
    Syntax { line: u32, detail: String },

    #[error("type mismatch at line {line}: {detail}")]
    TypeMismatch { line: u32, detail: String },

    #[error("unknown identifier `{name}` at line {line}")]
    UnknownIdentifier { line: u32, name: String },

    #[error("identifier `{name}` already in use at line {line}")]
    AlreadyDeclared { line: u32, name: String },

    #[error("redefining `{name}` with a different type/dimensions at line {line}")]
    Redefinition { line: u32, name: String },

    #[error("invalid number `{text}` at line {line}")]
    InvalidNumber { line: u32, text: String },

    #[error("numeric overflow at line {line}: {detail}")]
    NumericOverflow { line: u32, detail: String },

    #[error("`NEXT` without matching `FOR` at line {line}")]
    NextWithoutFor { line: u32 },

    #[error("`WEND` without matching `WHILE` at line {line}")]
    WendWithoutWhile { line: u32 },

    #[error("`ELSE`/`ELSEIF` without matching `IF` at line {line}")]
    ElseWithoutIf { line: u32 },

    #[error("CONST `{name}` at line {line}: {detail}")]
    ConstError { line: u32, name: String, detail: String },

    #[error("incompatible option across files: {0}")]
    IncompatibleOption(String),

    #[error("file open failed: {0}")]
    FileOpen(String),

    #[error("file write failed: {0}")]
    WriteFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Stable numeric code, matching the exit-code families in §6.1/§7.
    pub fn code(&self) -> u32 {
        match self {
            CompileError::Syntax { .. } => 3,
            CompileError::TypeMismatch { .. }
            | CompileError::UnknownIdentifier { .. }
            | CompileError::AlreadyDeclared { .. }
            | CompileError::Redefinition { .. }
            | CompileError::NextWithoutFor { .. }
            | CompileError::WendWithoutWhile { .. }
            | CompileError::ElseWithoutIf { .. }
            | CompileError::ConstError { .. } => 4,
            CompileError::InvalidNumber { .. } | CompileError::NumericOverflow { .. } => 5,
            CompileError::IncompatibleOption(_) => 6,
            CompileError::FileOpen(_) => 2,
            CompileError::WriteFailed(_) => 7,
            CompileError::Internal(_) => 7,
        }
    }
}

/// A non-fatal diagnostic, accumulated per line and emitted at program exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    MultipleEnd,
    OptionEnabledAcrossFiles(String),
    UnknownMcu(String),
    StaticNonSubscripted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub line: u32,
    pub kind: WarningKind,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::MultipleEnd => write!(f, "line {}: multiple END statements", self.line),
            WarningKind::OptionEnabledAcrossFiles(opt) => {
                write!(f, "line {}: option `{opt}` enabled inconsistently across files", self.line)
            }
            WarningKind::UnknownMcu(mcu) => write!(f, "line {}: unknown MCU `{mcu}`", self.line),
            WarningKind::StaticNonSubscripted(name) => {
                write!(f, "line {}: STATIC has no effect on non-subscripted `{name}`", self.line)
            }
        }
    }
}

/// Warnings accumulated during compilation, keyed by source line so the
/// CLI layer can flush them in line order at program exit.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub by_line: std::collections::BTreeMap<u32, Vec<Warning>>,
}

impl Diagnostics {
    pub fn push(&mut self, line: u32, kind: WarningKind) {
        self.by_line.entry(line).or_default().push(Warning { line, kind });
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.by_line.values().flatten()
    }
}
