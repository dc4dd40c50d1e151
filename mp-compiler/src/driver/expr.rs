//! Expressions. Every routine leaves its value in A; the left operand of a
//! binary operator waits on the operand stack while the right one is computed.

use super::Compiler;
use crate::backend::{storage_label, ArithOp, Opcode, Operand, Register, Relation};
use crate::frontend::TokenKind;
use crate::semantic::{compatible, TypeValue};
use crate::{CompileError, SemanticErrorKind};

/// A variable resolved for loading, storing or passing by address.
#[derive(Debug, Clone)]
pub(super) struct Place {
    pub name: String,
    pub label: String,
    pub ty: TypeValue,
    /// The cell holds the address of the variable (a parameter).
    pub by_reference: bool,
    /// False for undeclared names, which are accepted with a warning and
    /// treated as global integers.
    pub declared: bool,
}

fn relation(kind: TokenKind) -> Option<Relation> {
    match kind {
        TokenKind::Eq => Some(Relation::Eq),
        TokenKind::Neq => Some(Relation::Neq),
        TokenKind::Lt => Some(Relation::Lt),
        TokenKind::Le => Some(Relation::Le),
        TokenKind::Gt => Some(Relation::Gt),
        TokenKind::Ge => Some(Relation::Ge),
        _ => None,
    }
}

fn adding_operator(kind: TokenKind) -> Option<ArithOp> {
    match kind {
        TokenKind::Plus => Some(ArithOp::Add),
        TokenKind::Minus => Some(ArithOp::Sub),
        TokenKind::Or => Some(ArithOp::Or),
        _ => None,
    }
}

fn multiplying_operator(kind: TokenKind) -> Option<ArithOp> {
    match kind {
        TokenKind::Star => Some(ArithOp::Mul),
        TokenKind::Div => Some(ArithOp::Div),
        TokenKind::Mod => Some(ArithOp::Mod),
        TokenKind::And => Some(ArithOp::And),
        _ => None,
    }
}

impl<'src> Compiler<'src> {
    // ── Grammar ─────────────────────────────────────────────────────────

    /// `Expression → SimpleExpression { RelOp SimpleExpression }`
    pub(super) fn expression(&mut self) -> Result<TypeValue, CompileError> {
        let left = self.simple_expression()?;
        self.expression_rest(left)
    }

    fn expression_rest(&mut self, mut left: TypeValue) -> Result<TypeValue, CompileError> {
        while let Some(rel) = relation(self.current.kind) {
            let line = self.advance()?.line;
            self.emitter.emit_push(Register::A);
            let right = self.simple_expression()?;
            if !left.is_scalar() || !right.is_scalar() {
                return Err(self.semantic_error(
                    SemanticErrorKind::TypeMismatch,
                    line,
                    format!("cannot compare {left} with {right}"),
                ));
            }
            self.emitter.emit_relation(rel);
            left = TypeValue::Boolean;
        }
        Ok(left)
    }

    /// `SimpleExpression → [ "+" | "-" ] Term { ("+" | "-" | "or") Term }`
    fn simple_expression(&mut self) -> Result<TypeValue, CompileError> {
        let sign = self.current.kind;
        if !matches!(sign, TokenKind::Plus | TokenKind::Minus) {
            let left = self.term()?;
            return self.simple_rest(left);
        }
        let line = self.advance()?.line;
        let operand = self.term()?;
        self.require(&TypeValue::Integer, &operand, line, "operand of a sign")?;
        if sign == TokenKind::Minus {
            self.emitter.emit_negate();
        }
        self.simple_rest(TypeValue::Integer)
    }

    fn simple_rest(&mut self, mut left: TypeValue) -> Result<TypeValue, CompileError> {
        while let Some(op) = adding_operator(self.current.kind) {
            let line = self.advance()?.line;
            self.logical_operand(op, &left);
            self.emitter.emit_push(Register::A);
            let right = self.term()?;
            self.logical_operand(op, &right);
            left = self.binary(op, &left, &right, line)?;
        }
        Ok(left)
    }

    /// `Term → Factor { ("*" | "div" | "mod" | "and") Factor }`
    fn term(&mut self) -> Result<TypeValue, CompileError> {
        let left = self.factor()?;
        self.term_rest(left)
    }

    fn term_rest(&mut self, mut left: TypeValue) -> Result<TypeValue, CompileError> {
        while let Some(op) = multiplying_operator(self.current.kind) {
            let line = self.advance()?.line;
            self.logical_operand(op, &left);
            self.emitter.emit_push(Register::A);
            let right = self.factor()?;
            self.logical_operand(op, &right);
            left = self.binary(op, &left, &right, line)?;
        }
        Ok(left)
    }

    /// Finish an expression whose first factor is already in A.
    fn expression_after_factor(&mut self, first: TypeValue) -> Result<TypeValue, CompileError> {
        let term = self.term_rest(first)?;
        let simple = self.simple_rest(term)?;
        self.expression_rest(simple)
    }

    /// `and`/`or` combine bitwise, so an operand that is not already a
    /// boolean is mapped to 0 or 1 first.
    fn logical_operand(&mut self, op: ArithOp, ty: &TypeValue) {
        if op.is_logical() && ty.is_scalar() && *ty != TypeValue::Boolean {
            self.emitter.emit_normalize_boolean();
        }
    }

    fn binary(
        &mut self,
        op: ArithOp,
        left: &TypeValue,
        right: &TypeValue,
        line: usize,
    ) -> Result<TypeValue, CompileError> {
        let result = if op.is_logical() {
            TypeValue::Boolean
        } else {
            TypeValue::Integer
        };
        if !compatible(&result, left) || !compatible(&result, right) {
            return Err(self.semantic_error(
                SemanticErrorKind::TypeMismatch,
                line,
                format!(
                    "operands of '{}' must be {result}, found {left} and {right}",
                    op.symbol()
                ),
            ));
        }
        self.emitter.emit_arith(op);
        Ok(result)
    }

    fn factor(&mut self) -> Result<TypeValue, CompileError> {
        let token = self.current.clone();
        match token.kind {
            TokenKind::Number => {
                self.advance()?;
                let value = token.number().unwrap_or(0);
                self.emitter.emit(Opcode::Lda, Operand::immediate(value));
                Ok(TypeValue::Integer)
            }
            TokenKind::Literal => {
                self.advance()?;
                let text = token.literal().unwrap_or_default();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        self.emitter.emit(Opcode::Lda, Operand::immediate(c as i64));
                        Ok(TypeValue::Char)
                    }
                    _ => Err(self.semantic_error(
                        SemanticErrorKind::TypeMismatch,
                        token.line,
                        format!("string {token} is not a value; only one-character strings are"),
                    )),
                }
            }
            TokenKind::True => {
                self.advance()?;
                self.emitter.emit(Opcode::Lda, Operand::immediate(1));
                Ok(TypeValue::Boolean)
            }
            TokenKind::False => {
                self.advance()?;
                self.emitter.emit(Opcode::Clear, Operand::Register(Register::A));
                Ok(TypeValue::Boolean)
            }
            TokenKind::LParen => {
                self.advance()?;
                let ty = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(ty)
            }
            TokenKind::Not => {
                self.advance()?;
                let operand = self.factor()?;
                self.require(&TypeValue::Boolean, &operand, token.line, "operand of 'not'")?;
                self.emitter.emit_not();
                Ok(TypeValue::Boolean)
            }
            TokenKind::Minus => {
                self.advance()?;
                let operand = self.factor()?;
                self.require(&TypeValue::Integer, &operand, token.line, "operand of '-'")?;
                self.emitter.emit_negate();
                Ok(TypeValue::Integer)
            }
            TokenKind::Integer | TokenKind::Boolean | TokenKind::Char => self.cast(),
            TokenKind::Name => {
                let (name, line) = self.expect_name()?;
                let place = self.value_place(&name, line)?;
                if self.check(TokenKind::LBracket) {
                    let element = self.element_index(&place)?;
                    self.load_element(&place);
                    return Ok(element);
                }
                self.require_whole_value(&place, line)?;
                self.load_value(&place);
                Ok(place.ty)
            }
            _ => {
                let message = format!("expected an expression, found {token}");
                Err(self.syntax_error(message))
            }
        }
    }

    /// `StandardType "(" Expression ")"`
    fn cast(&mut self) -> Result<TypeValue, CompileError> {
        let line = self.current.line;
        let target = self.standard_type()?;
        self.expect(TokenKind::LParen)?;
        let source = self.expression()?;
        if !source.is_scalar() {
            return Err(self.semantic_error(
                SemanticErrorKind::TypeMismatch,
                line,
                format!("cannot convert {source} to {target}"),
            ));
        }
        self.expect(TokenKind::RParen)?;
        self.emit_coercion(&target, &source);
        Ok(target)
    }

    // ── Call arguments ──────────────────────────────────────────────────

    /// Compile one call argument and push its address. A bare variable or
    /// an array element passes its own address; any other expression is
    /// stored in a fresh temporary whose address is passed instead.
    pub(super) fn argument(&mut self) -> Result<TypeValue, CompileError> {
        if !self.check(TokenKind::Name) {
            let ty = self.expression()?;
            return Ok(self.push_temporary(ty));
        }
        let (name, line) = self.expect_name()?;
        let place = self.value_place(&name, line)?;

        if self.check(TokenKind::LBracket) {
            let element = self.element_index(&place)?;
            if self.at_argument_end() {
                self.add_base_address(&place);
                self.emitter.emit_push(Register::A);
                return Ok(element);
            }
            self.load_element(&place);
            let ty = self.expression_after_factor(element)?;
            return Ok(self.push_temporary(ty));
        }
        if self.at_argument_end() {
            self.load_address(&place);
            self.emitter.emit_push(Register::A);
            return Ok(place.ty);
        }
        self.require_whole_value(&place, line)?;
        self.load_value(&place);
        let ty = self.expression_after_factor(place.ty)?;
        Ok(self.push_temporary(ty))
    }

    fn at_argument_end(&self) -> bool {
        self.check(TokenKind::Comma) || self.check(TokenKind::RParen)
    }

    fn push_temporary(&mut self, ty: TypeValue) -> TypeValue {
        let temp = self.emitter.new_temp();
        self.emitter.emit(Opcode::Sta, Operand::direct(temp.as_str()));
        self.emitter.emit(Opcode::Lda, Operand::immediate(temp));
        self.emitter.emit_push(Register::A);
        ty
    }

    // ── Variables ───────────────────────────────────────────────────────

    /// Resolve a name and record the reference. Undeclared names only warn.
    pub(super) fn place(&mut self, name: &str, line: usize) -> Place {
        match self.symbols.reference(name, line) {
            Some(symbol) => Place {
                name: name.to_string(),
                label: storage_label(name, symbol.owning_procedure.as_deref()),
                ty: symbol.ty.clone(),
                by_reference: symbol.is_parameter,
                declared: true,
            },
            None => Place {
                name: name.to_string(),
                label: storage_label(name, None),
                ty: TypeValue::Integer,
                by_reference: false,
                declared: false,
            },
        }
    }

    /// As `place`, rejecting procedure names.
    pub(super) fn value_place(&mut self, name: &str, line: usize) -> Result<Place, CompileError> {
        let place = self.place(name, line);
        if place.ty.is_procedure() {
            return Err(self.semantic_error(
                SemanticErrorKind::ProcedureAsValue,
                line,
                format!("procedure '{name}' cannot be used as a variable"),
            ));
        }
        Ok(place)
    }

    pub(super) fn require_whole_value(&mut self, place: &Place, line: usize) -> Result<(), CompileError> {
        if place.ty.is_array() {
            return Err(self.semantic_error(
                SemanticErrorKind::MissingIndex,
                line,
                format!("array '{}' needs an index here", place.name),
            ));
        }
        Ok(())
    }

    /// `"[" Expression "]"`: leaves the checked index in A and returns the
    /// element type.
    pub(super) fn element_index(&mut self, place: &Place) -> Result<TypeValue, CompileError> {
        let bracket = self.expect(TokenKind::LBracket)?;
        if place.declared && !place.ty.is_array() {
            return Err(self.semantic_error(
                SemanticErrorKind::NotAnArray,
                bracket.line,
                format!("'{}' is {}, not an array", place.name, place.ty),
            ));
        }
        let index = self.expression()?;
        self.require(&TypeValue::Integer, &index, bracket.line, "array index")?;
        self.expect(TokenKind::RBracket)?;
        match &place.ty {
            TypeValue::Array { element, size } => {
                self.emitter.emit_bounds_check(*size);
                Ok((**element).clone())
            }
            _ => Ok(TypeValue::Integer),
        }
    }

    fn load(&mut self, place: &Place) {
        let operand = if place.by_reference {
            Operand::indirect(place.label.as_str())
        } else {
            Operand::direct(place.label.as_str())
        };
        self.emitter.emit(Opcode::Lda, operand);
    }

    /// Load a whole scalar as a value of its declared type. A parameter
    /// may be bound to a variable of another scalar type, so its value is
    /// converted on the way in.
    fn load_value(&mut self, place: &Place) {
        self.load(place);
        if place.by_reference {
            self.emit_coercion(&place.ty, &TypeValue::Integer);
        }
    }

    pub(super) fn store(&mut self, place: &Place) {
        let operand = if place.by_reference {
            Operand::indirect(place.label.as_str())
        } else {
            Operand::direct(place.label.as_str())
        };
        self.emitter.emit(Opcode::Sta, operand);
    }

    fn load_address(&mut self, place: &Place) {
        let operand = if place.by_reference {
            Operand::direct(place.label.as_str())
        } else {
            Operand::immediate(place.label.as_str())
        };
        self.emitter.emit(Opcode::Lda, operand);
    }

    /// Index in A becomes the element's address.
    fn add_base_address(&mut self, place: &Place) {
        let operand = if place.by_reference {
            Operand::direct(place.label.as_str())
        } else {
            Operand::immediate(place.label.as_str())
        };
        self.emitter.emit(Opcode::Add, operand);
    }

    fn element_operand(place: &Place) -> Operand {
        if place.by_reference {
            Operand::indirect_indexed(place.label.as_str())
        } else {
            Operand::indexed(place.label.as_str())
        }
    }

    /// Index in A becomes the element's value.
    pub(super) fn load_element(&mut self, place: &Place) {
        self.emitter.emit(Opcode::Rmo, Operand::pair(Register::A, Register::X));
        self.emitter.emit(Opcode::Lda, Self::element_operand(place));
    }

    /// Store A into the element whose index is in X.
    pub(super) fn store_element(&mut self, place: &Place) {
        self.emitter.emit(Opcode::Sta, Self::element_operand(place));
    }

    // ── Types ───────────────────────────────────────────────────────────

    pub(super) fn require(
        &mut self,
        expected: &TypeValue,
        found: &TypeValue,
        line: usize,
        what: &str,
    ) -> Result<(), CompileError> {
        if compatible(expected, found) {
            return Ok(());
        }
        Err(self.semantic_error(
            SemanticErrorKind::TypeMismatch,
            line,
            format!("{what} must be {expected}, found {found}"),
        ))
    }

    /// Convert the scalar in A from `source` to `target`.
    pub(super) fn emit_coercion(&mut self, target: &TypeValue, source: &TypeValue) {
        if target == source {
            return;
        }
        match target {
            TypeValue::Char => self.emitter.emit_mask_char(),
            TypeValue::Boolean => self.emitter.emit_normalize_boolean(),
            _ => {}
        }
    }
}
