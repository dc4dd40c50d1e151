//! The single-pass driver: recursive-descent parsing fused with name
//! resolution, type checking and code emission.
//!
//! Module layout:
//! - `abort` — first-error-wins controller
//! - `decl`  — program, declarations and procedure sections
//! - `stmt`  — statements
//! - `expr`  — expressions, variable access, argument passing

mod abort;
mod decl;
mod expr;
mod stmt;

pub use abort::{AbortController, Phase};

use crate::backend::{Emitter, Label};
use crate::frontend::{Token, TokenKind, TokenStream};
use crate::semantic::SymbolTable;
use crate::{Compilation, CompileError, SemanticErrorKind};
use log::debug;

/// State of one compilation run. Every driver function takes it as `&mut self`.
pub struct Compiler<'src> {
    tokens: TokenStream<'src>,
    /// Lookahead token.
    current: Token,
    /// The two most recently consumed tokens, newest first.
    recent: [Option<Token>; 2],
    symbols: SymbolTable,
    emitter: Emitter,
    errors: AbortController,
    /// Exit labels of the enclosing `while` loops; the depth is the nesting count.
    loop_exits: Vec<Label>,
    /// Target of `return`: the exit of the body being compiled.
    exit_label: Option<Label>,
}

impl<'src> Compiler<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            tokens: TokenStream::new(source),
            current: Token::new(TokenKind::Eof, 1),
            recent: [None, None],
            symbols: SymbolTable::new(),
            emitter: Emitter::new(),
            errors: AbortController::new(),
            loop_exits: Vec::new(),
            exit_label: None,
        }
    }

    /// Compile the whole source. On error nothing is finalised and the
    /// symbol listing is not produced.
    pub fn run(mut self) -> Result<Compilation, CompileError> {
        match self.program() {
            Ok(()) => {
                let symbols = self.symbols.all_symbols();
                debug!("compiled {} symbol(s)", symbols.len());
                Ok(Compilation {
                    assembly: self.emitter.finish(),
                    symbols,
                })
            }
            Err(err) => {
                self.errors.abort();
                debug!("compilation aborted at line {}", err.line());
                Err(err)
            }
        }
    }

    // ── Token handling ──────────────────────────────────────────────────

    fn fetch(&mut self) -> Result<Token, CompileError> {
        match self.tokens.next_token() {
            Ok(token) => Ok(token),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Consume the lookahead token and return it.
    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = self.fetch()?;
        let consumed = std::mem::replace(&mut self.current, next);
        self.recent[1] = self.recent[0].take();
        self.recent[0] = Some(consumed.clone());
        Ok(consumed)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn accept(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            return self.advance();
        }
        let message = match &self.recent[0] {
            Some(previous) => format!("expected {kind} after {previous}, found {}", self.current),
            None => format!("expected {kind}, found {}", self.current),
        };
        Err(self.syntax_error(message))
    }

    fn expect_name(&mut self) -> Result<(String, usize), CompileError> {
        let token = self.expect(TokenKind::Name)?;
        let name = token.name().map(str::to_string).unwrap_or_default();
        Ok((name, token.line))
    }

    // ── Errors ──────────────────────────────────────────────────────────

    /// Route an error through the abort controller. The first error also
    /// freezes the token stream, symbol table and emitter.
    fn fail(&mut self, err: CompileError) -> CompileError {
        if !self.errors.is_erroring() {
            self.tokens.signal_error();
            self.symbols.freeze();
            self.emitter.freeze();
            let context: Vec<String> = self
                .recent
                .iter()
                .rev()
                .flatten()
                .map(|token| token.to_string())
                .collect();
            debug!("error context: {} >{}<", context.join(" "), self.current);
        }
        self.errors.raise(err)
    }

    fn syntax_error(&mut self, message: impl Into<String>) -> CompileError {
        let line = self.current.line;
        self.fail(CompileError::Syntax {
            line,
            message: message.into(),
        })
    }

    fn semantic_error(
        &mut self,
        kind: SemanticErrorKind,
        line: usize,
        message: impl Into<String>,
    ) -> CompileError {
        self.fail(CompileError::Semantic {
            kind,
            line,
            message: message.into(),
        })
    }
}
