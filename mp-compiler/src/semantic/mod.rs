//! Names and types: the two-level symbol table and the type rules used by
//! the driver while it parses.

pub mod symbol_table;
pub mod types;

pub use symbol_table::{AlreadyDeclared, ScopeKey, Symbol, SymbolTable};
pub use types::{compatible, TypeValue};
