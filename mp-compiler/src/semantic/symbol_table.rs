use super::types::TypeValue;
use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

/// Identity of a declared name: globals (and every procedure) have no owning
/// procedure, locals and parameters carry the procedure they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    pub name: String,
    pub procedure: Option<String>,
}

impl ScopeKey {
    pub fn global(name: &str) -> Self {
        Self {
            name: name.to_string(),
            procedure: None,
        }
    }

    pub fn local(name: &str, procedure: &str) -> Self {
        Self {
            name: name.to_string(),
            procedure: Some(procedure.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub owning_procedure: Option<String>,
    pub ty: TypeValue,
    pub definition_line: usize,
    pub reference_lines: Vec<usize>,
    pub is_parameter: bool,
}

impl Symbol {
    pub fn key(&self) -> ScopeKey {
        ScopeKey {
            name: self.name.clone(),
            procedure: self.owning_procedure.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{name}' is already declared on line {line}")]
pub struct AlreadyDeclared {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<ScopeKey, Symbol>,
    /// The procedure whose body is being compiled, if any.
    current_procedure: Option<String>,
    frozen: bool,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter procedure scope
    pub fn enter_procedure(&mut self, name: &str) {
        debug_assert!(self.current_procedure.is_none(), "procedures do not nest");
        self.current_procedure = Some(name.to_string());
    }

    /// Exit procedure scope
    pub fn exit_procedure(&mut self) {
        self.current_procedure = None;
    }

    pub fn current_procedure(&self) -> Option<&str> {
        self.current_procedure.as_deref()
    }

    /// Stop accepting definitions and references (after the first error).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Declare a name in the current scope. Procedures always go to the
    /// global scope. An existing entry for the same key is kept unchanged.
    pub fn declare(&mut self, name: &str, ty: TypeValue, line: usize) -> Result<(), AlreadyDeclared> {
        self.insert(name, ty, line, false)
    }

    /// Declare a formal parameter of the open procedure and append its type
    /// to the procedure's parameter list.
    pub fn declare_parameter(
        &mut self,
        name: &str,
        ty: TypeValue,
        line: usize,
    ) -> Result<(), AlreadyDeclared> {
        self.insert(name, ty.clone(), line, true)?;
        self.add_parameter_type(ty);
        Ok(())
    }

    fn insert(
        &mut self,
        name: &str,
        ty: TypeValue,
        line: usize,
        is_parameter: bool,
    ) -> Result<(), AlreadyDeclared> {
        if self.frozen {
            return Ok(());
        }
        let owning_procedure = match &self.current_procedure {
            Some(procedure) if !ty.is_procedure() => Some(procedure.clone()),
            _ => None,
        };
        let key = ScopeKey {
            name: name.to_string(),
            procedure: owning_procedure.clone(),
        };
        if let Some(existing) = self.symbols.get(&key) {
            return Err(AlreadyDeclared {
                name: name.to_string(),
                line: existing.definition_line,
            });
        }
        debug!("declare {name} : {ty} (line {line})");
        self.symbols.insert(
            key,
            Symbol {
                name: name.to_string(),
                owning_procedure,
                ty,
                definition_line: line,
                reference_lines: Vec::new(),
                is_parameter,
            },
        );
        Ok(())
    }

    /// Append a parameter type to the open procedure's `Procedure` type.
    pub fn add_parameter_type(&mut self, ty: TypeValue) {
        if self.frozen {
            return;
        }
        let Some(procedure) = &self.current_procedure else {
            return;
        };
        if let Some(Symbol {
            ty: TypeValue::Procedure { params },
            ..
        }) = self.symbols.get_mut(&ScopeKey::global(procedure))
        {
            params.push(ty);
        }
    }

    /// Resolve a name: the open procedure's scope first, then the global scope.
    pub fn resolve_key(&self, name: &str) -> Option<ScopeKey> {
        if let Some(procedure) = &self.current_procedure {
            let scoped = ScopeKey::local(name, procedure);
            if self.symbols.contains_key(&scoped) {
                return Some(scoped);
            }
        }
        let global = ScopeKey::global(name);
        self.symbols.contains_key(&global).then_some(global)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let key = self.resolve_key(name)?;
        self.symbols.get(&key)
    }

    pub fn get(&self, key: &ScopeKey) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    /// Resolve a name and record a use of it on `line`. Unknown names only
    /// produce a warning.
    pub fn reference(&mut self, name: &str, line: usize) -> Option<&Symbol> {
        let Some(key) = self.resolve_key(name) else {
            if !self.frozen {
                warn!("line {line}: '{name}' is not declared; reference ignored");
            }
            return None;
        };
        let frozen = self.frozen;
        let symbol = self.symbols.get_mut(&key)?;
        if !frozen && symbol.reference_lines.last() != Some(&line) {
            symbol.reference_lines.push(line);
        }
        Some(symbol)
    }

    /// Snapshot for reporting: sorted by name, reference lines ascending.
    pub fn all_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.symbols.values().cloned().collect();
        for symbol in &mut symbols {
            symbol.reference_lines.sort_unstable();
        }
        symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
