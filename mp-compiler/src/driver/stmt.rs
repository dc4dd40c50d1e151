use super::Compiler;
use crate::backend::{storage_label, Label, Opcode, Operand, Register, RuntimeRoutine};
use crate::frontend::TokenKind;
use crate::semantic::{compatible, TypeValue};
use crate::{CompileError, SemanticErrorKind};

impl<'src> Compiler<'src> {
    /// `"begin" Statement { ";" Statement } "end"`
    pub(super) fn compound_statement(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Begin)?;
        self.statement()?;
        while self.accept(TokenKind::Semicolon)? {
            self.statement()?;
        }
        if self.check(TokenKind::End) {
            self.advance()?;
            return Ok(());
        }
        let message = match (&self.recent[0], self.current.kind) {
            (Some(previous), TokenKind::Else) if previous.kind == TokenKind::Semicolon => {
                "';' before 'else' ends the 'if' statement".to_string()
            }
            _ => format!("expected ';' or 'end', found {}", self.current),
        };
        Err(self.syntax_error(message))
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        match self.current.kind {
            TokenKind::Name => self.assignment(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Call => self.call_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Read | TokenKind::Readln => self.read_statement(),
            TokenKind::Write | TokenKind::Writeln => self.write_statement(),
            TokenKind::Begin => self.compound_statement(),
            // empty statement
            TokenKind::Semicolon | TokenKind::End | TokenKind::Else => Ok(()),
            _ => {
                let message = format!("expected a statement, found {}", self.current);
                Err(self.syntax_error(message))
            }
        }
    }

    /// `Name [ "[" Expression "]" ] ":=" Expression`
    fn assignment(&mut self) -> Result<(), CompileError> {
        let (name, line) = self.expect_name()?;
        let target = self.place(&name, line);
        if target.ty.is_procedure() {
            return Err(self.semantic_error(
                SemanticErrorKind::ProcedureAsValue,
                line,
                format!("cannot assign to procedure '{name}'; use 'call {name}'"),
            ));
        }

        if self.check(TokenKind::LBracket) {
            let element = self.element_index(&target)?;
            self.emitter.emit_push(Register::A);
            let assign = self.expect(TokenKind::Assign)?;
            let value = self.expression()?;
            self.check_assignable(&element, &value, assign.line)?;
            self.emit_coercion(&element, &value);
            self.emitter.emit_pop(Register::X);
            self.store_element(&target);
            return Ok(());
        }

        self.require_whole_value(&target, line)?;
        let assign = self.expect(TokenKind::Assign)?;
        let value = self.expression()?;
        self.check_assignable(&target.ty, &value, assign.line)?;
        self.emit_coercion(&target.ty, &value);
        self.store(&target);
        Ok(())
    }

    fn check_assignable(
        &mut self,
        target: &TypeValue,
        value: &TypeValue,
        line: usize,
    ) -> Result<(), CompileError> {
        if compatible(target, value) {
            return Ok(());
        }
        Err(self.semantic_error(
            SemanticErrorKind::TypeMismatch,
            line,
            format!("cannot assign {value} to {target}"),
        ))
    }

    /// Compile a condition and jump to `target` when it is false.
    fn condition(&mut self, target: Label) -> Result<(), CompileError> {
        let line = self.current.line;
        let ty = self.expression()?;
        self.require(&TypeValue::Boolean, &ty, line, "condition")?;
        self.emitter.emit_condition_test(target);
        Ok(())
    }

    /// `"if" Expression "then" Statement [ "else" Statement ]`
    fn if_statement(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::If)?;
        let skip_then = self.emitter.new_label();
        self.condition(skip_then)?;
        self.expect(TokenKind::Then)?;
        self.statement()?;
        if self.accept(TokenKind::Else)? {
            let done = self.emitter.new_label();
            self.emitter.emit_jump(Opcode::J, done);
            self.emitter.emit_label(skip_then);
            self.statement()?;
            self.emitter.emit_label(done);
        } else {
            self.emitter.emit_label(skip_then);
        }
        Ok(())
    }

    /// `"while" Expression "do" Statement`
    fn while_statement(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::While)?;
        let head = self.emitter.new_label();
        let exit = self.emitter.new_label();
        self.emitter.emit_label(head);
        self.condition(exit)?;
        self.expect(TokenKind::Do)?;
        self.loop_exits.push(exit);
        let body = self.statement();
        self.loop_exits.pop();
        body?;
        self.emitter.emit_jump(Opcode::J, head);
        self.emitter.emit_label(exit);
        Ok(())
    }

    fn break_statement(&mut self) -> Result<(), CompileError> {
        let keyword = self.expect(TokenKind::Break)?;
        match self.loop_exits.last().copied() {
            Some(exit) => {
                self.emitter.emit_jump(Opcode::J, exit);
                Ok(())
            }
            None => Err(self.semantic_error(
                SemanticErrorKind::BreakOutsideLoop,
                keyword.line,
                "'break' outside of a 'while' loop",
            )),
        }
    }

    fn return_statement(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Return)?;
        if let Some(exit) = self.exit_label {
            self.emitter.emit_jump(Opcode::J, exit);
        }
        Ok(())
    }

    /// `"call" Name [ "(" Argument { "," Argument } ")" ]`
    fn call_statement(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Call)?;
        let (name, line) = self.expect_name()?;
        if self.symbols.current_procedure() == Some(name.as_str()) {
            return Err(self.semantic_error(
                SemanticErrorKind::RecursiveCall,
                line,
                format!("procedure '{name}' cannot call itself"),
            ));
        }
        let params = match self.symbols.reference(&name, line).map(|s| s.ty.clone()) {
            Some(TypeValue::Procedure { params }) => Some(params),
            Some(other) => {
                return Err(self.semantic_error(
                    SemanticErrorKind::NotAProcedure,
                    line,
                    format!("'{name}' is {other}, not a procedure"),
                ))
            }
            None => None,
        };

        let mut count = 0;
        if self.accept(TokenKind::LParen)? {
            loop {
                let arg_line = self.current.line;
                let ty = self.argument()?;
                if let Some(param) = params.as_ref().and_then(|p| p.get(count)) {
                    if !compatible(param, &ty) {
                        let message = format!(
                            "argument {} of '{name}' must be {param}, found {ty}",
                            count + 1
                        );
                        return Err(self.semantic_error(
                            SemanticErrorKind::TypeMismatch,
                            arg_line,
                            message,
                        ));
                    }
                }
                count += 1;
                if !self.accept(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        if let Some(params) = &params {
            if params.len() != count {
                let message = format!(
                    "'{name}' takes {} argument(s), found {count}",
                    params.len()
                );
                return Err(self.semantic_error(
                    SemanticErrorKind::ArgumentCountMismatch,
                    line,
                    message,
                ));
            }
        }
        self.emitter.emit_jump(Opcode::Jsub, storage_label(&name, None));
        Ok(())
    }

    /// `("read" | "readln") [ "(" Designator { "," Designator } ")" ]`
    fn read_statement(&mut self) -> Result<(), CompileError> {
        let keyword = self.advance()?;
        let newline = keyword.kind == TokenKind::Readln;
        let has_list = if newline {
            self.accept(TokenKind::LParen)?
        } else {
            self.expect(TokenKind::LParen)?;
            true
        };
        if has_list {
            loop {
                self.read_target()?;
                if !self.accept(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        if newline {
            self.emitter.emit_call(RuntimeRoutine::RdLn);
        }
        Ok(())
    }

    fn read_target(&mut self) -> Result<(), CompileError> {
        let (name, line) = self.expect_name()?;
        let place = self.value_place(&name, line)?;
        if self.check(TokenKind::LBracket) {
            let element = self.element_index(&place)?;
            self.emitter.emit_push(Register::A);
            self.read_value(&element);
            self.emitter.emit_pop(Register::X);
            self.store_element(&place);
            return Ok(());
        }
        self.require_whole_value(&place, line)?;
        self.read_value(&place.ty);
        self.store(&place);
        Ok(())
    }

    fn read_value(&mut self, ty: &TypeValue) {
        match ty {
            TypeValue::Char => self.emitter.emit_call(RuntimeRoutine::RdChr),
            TypeValue::Boolean => {
                self.emitter.emit_call(RuntimeRoutine::RdInt);
                self.emitter.emit_normalize_boolean();
            }
            _ => self.emitter.emit_call(RuntimeRoutine::RdInt),
        }
    }

    /// `("write" | "writeln") [ "(" WriteArg { "," WriteArg } ")" ]`
    fn write_statement(&mut self) -> Result<(), CompileError> {
        let keyword = self.advance()?;
        let newline = keyword.kind == TokenKind::Writeln;
        let has_list = if newline {
            self.accept(TokenKind::LParen)?
        } else {
            self.expect(TokenKind::LParen)?;
            true
        };
        if has_list {
            loop {
                self.write_argument()?;
                if !self.accept(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        if newline {
            self.emitter.emit_call(RuntimeRoutine::WrLn);
        }
        Ok(())
    }

    /// `String | Expression [ ":" Expression ]`
    fn write_argument(&mut self) -> Result<(), CompileError> {
        if self.check(TokenKind::Literal) {
            let text = self.current.literal().unwrap_or_default().to_string();
            let length = text.chars().count();
            if length != 1 {
                self.advance()?;
                let label = self.emitter.string_literal(&text);
                self.emitter.emit(Opcode::Lda, Operand::immediate(label));
                self.emitter.emit(Opcode::Ldt, Operand::immediate(length as i64));
                self.emitter.emit_call(RuntimeRoutine::WrStr);
                return Ok(());
            }
        }

        let line = self.current.line;
        let ty = self.expression()?;
        if self.accept(TokenKind::Colon)? {
            self.emitter.emit_push(Register::A);
            let width_line = self.current.line;
            let width = self.expression()?;
            self.require(&TypeValue::Integer, &width, width_line, "field width")?;
            self.emitter.emit(Opcode::Rmo, Operand::pair(Register::A, Register::T));
            self.emitter.emit_pop(Register::A);
        } else {
            self.emitter.emit(Opcode::Clear, Operand::Register(Register::T));
        }
        let routine = match ty {
            TypeValue::Char => RuntimeRoutine::WrChr,
            TypeValue::Boolean => RuntimeRoutine::WrBool,
            TypeValue::Integer => RuntimeRoutine::WrInt,
            other => {
                return Err(self.semantic_error(
                    SemanticErrorKind::TypeMismatch,
                    line,
                    format!("cannot write a value of type {other}"),
                ))
            }
        };
        self.emitter.emit_call(routine);
        Ok(())
    }
}
