//! Single-pass compiler for a small Pascal-like teaching language.
//!
//! Parsing, name resolution, type checking and code emission happen together
//! in one recursive-descent pass over the token stream; no syntax tree is
//! built. The output is assembly text for a word-addressed accumulator/stack
//! machine, which the `machine` module can assemble and run.

pub mod backend;
pub mod driver;
pub mod frontend;
pub mod machine;
pub mod semantic;
pub mod xref;

use frontend::LexicalError;
use semantic::Symbol;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),

    #[error("SyntaxError (line {line}) - {message}")]
    Syntax { line: usize, message: String },

    #[error("SemanticError:{kind} (line {line}) - {message}")]
    Semantic {
        kind: SemanticErrorKind,
        line: usize,
        message: String,
    },
}

impl CompileError {
    /// Source line of the diagnostic (1-based).
    pub fn line(&self) -> usize {
        match self {
            CompileError::Lexical(err) => err.line,
            CompileError::Syntax { line, .. } | CompileError::Semantic { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    TypeMismatch,
    RecursiveCall,
    BreakOutsideLoop,
    NotAnArray,
    MissingIndex,
    ProcedureAsValue,
    NotAProcedure,
    ArgumentCountMismatch,
    DuplicateProcedure,
    NestedProcedure,
    InvalidArraySize,
}

impl std::fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticErrorKind::TypeMismatch => write!(f, "TypeMismatch"),
            SemanticErrorKind::RecursiveCall => write!(f, "RecursiveCall"),
            SemanticErrorKind::BreakOutsideLoop => write!(f, "BreakOutsideLoop"),
            SemanticErrorKind::NotAnArray => write!(f, "NotAnArray"),
            SemanticErrorKind::MissingIndex => write!(f, "MissingIndex"),
            SemanticErrorKind::ProcedureAsValue => write!(f, "ProcedureAsValue"),
            SemanticErrorKind::NotAProcedure => write!(f, "NotAProcedure"),
            SemanticErrorKind::ArgumentCountMismatch => write!(f, "ArgumentCountMismatch"),
            SemanticErrorKind::DuplicateProcedure => write!(f, "DuplicateProcedure"),
            SemanticErrorKind::NestedProcedure => write!(f, "NestedProcedure"),
            SemanticErrorKind::InvalidArraySize => write!(f, "InvalidArraySize"),
        }
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub assembly: String,
    /// Every declared name, sorted for the cross-reference listing.
    pub symbols: Vec<Symbol>,
}

/// Compile source text to assembly in a single pass.
///
/// Stops at the first lexical, syntax or semantic error; that error is the
/// only diagnostic reported.
pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    driver::Compiler::new(source).run()
}
