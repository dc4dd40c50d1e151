use super::Compiler;
use crate::backend::storage_label;
use crate::frontend::TokenKind;
use crate::semantic::TypeValue;
use crate::{CompileError, SemanticErrorKind};
use log::{debug, warn};

impl<'src> Compiler<'src> {
    /// `Program → "program" Name ";" Block "."`
    pub(super) fn program(&mut self) -> Result<(), CompileError> {
        self.current = self.fetch()?;
        self.expect(TokenKind::Program)?;
        let (name, _) = self.expect_name()?;
        self.expect(TokenKind::Semicolon)?;
        debug!("compiling program '{name}'");

        let frame = self.emitter.emit_program_prologue(&name);
        self.exit_label = Some(frame.exit);
        self.declarations()?;
        self.emitter.emit_label(frame.entry);
        self.compound_statement()?;
        self.expect(TokenKind::Period)?;
        self.expect(TokenKind::Eof)?;
        self.emitter.emit_program_epilogue(&name, &frame);
        Ok(())
    }

    /// `{ VarDeclSection | ProcedureDecl }` at the head of a block.
    fn declarations(&mut self) -> Result<(), CompileError> {
        loop {
            match self.current.kind {
                TokenKind::Var => self.var_section()?,
                TokenKind::Procedure => self.procedure_declaration()?,
                _ => return Ok(()),
            }
        }
    }

    fn var_section(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Var)?;
        loop {
            let names = self.name_list()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.type_spec()?;
            self.expect(TokenKind::Semicolon)?;
            for (name, line) in names {
                self.declare_variable(&name, &ty, line);
            }
            if !self.check(TokenKind::Name) {
                return Ok(());
            }
        }
    }

    /// `Name { "," Name }`
    fn name_list(&mut self) -> Result<Vec<(String, usize)>, CompileError> {
        let mut names = vec![self.expect_name()?];
        while self.accept(TokenKind::Comma)? {
            names.push(self.expect_name()?);
        }
        Ok(names)
    }

    fn declare_variable(&mut self, name: &str, ty: &TypeValue, line: usize) {
        match self.symbols.declare(name, ty.clone(), line) {
            Ok(()) => {
                let label = storage_label(name, self.symbols.current_procedure());
                self.emitter.reserve_storage(&label, ty.storage_words());
            }
            Err(existing) => warn!("line {line}: {existing}; keeping the first declaration"),
        }
    }

    fn type_spec(&mut self) -> Result<TypeValue, CompileError> {
        if !self.accept(TokenKind::Array)? {
            return self.standard_type();
        }
        self.expect(TokenKind::LBracket)?;
        let size = self.expect(TokenKind::Number)?;
        let count = size.number().unwrap_or(0);
        if count <= 0 {
            return Err(self.semantic_error(
                SemanticErrorKind::InvalidArraySize,
                size.line,
                format!("array size must be at least 1, found {count}"),
            ));
        }
        self.expect(TokenKind::RBracket)?;
        self.expect(TokenKind::Of)?;
        let element = self.standard_type()?;
        Ok(TypeValue::array(element, count as usize))
    }

    pub(super) fn standard_type(&mut self) -> Result<TypeValue, CompileError> {
        let ty = match self.current.kind {
            TokenKind::Integer => TypeValue::Integer,
            TokenKind::Boolean => TypeValue::Boolean,
            TokenKind::Char => TypeValue::Char,
            _ => {
                let message = format!("expected a type, found {}", self.current);
                return Err(self.syntax_error(message));
            }
        };
        self.advance()?;
        Ok(ty)
    }

    /// `"procedure" Name [ "(" ParamGroup { ";" ParamGroup } ")" ] ";" Block ";"`
    fn procedure_declaration(&mut self) -> Result<(), CompileError> {
        let keyword = self.expect(TokenKind::Procedure)?;
        if let Some(outer) = self.symbols.current_procedure() {
            let message = format!("procedures cannot be declared inside procedure '{outer}'");
            return Err(self.semantic_error(
                SemanticErrorKind::NestedProcedure,
                keyword.line,
                message,
            ));
        }
        let (name, line) = self.expect_name()?;
        if let Err(existing) = self.symbols.declare(&name, TypeValue::procedure(), line) {
            return Err(self.semantic_error(
                SemanticErrorKind::DuplicateProcedure,
                line,
                format!("cannot declare procedure: {existing}"),
            ));
        }

        let label = storage_label(&name, None);
        let frame = self.emitter.emit_procedure_prologue(&label);
        self.symbols.enter_procedure(&name);

        let mut cells = Vec::new();
        if self.accept(TokenKind::LParen)? {
            loop {
                self.parameter_group(&mut cells)?;
                if !self.accept(TokenKind::Semicolon)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Semicolon)?;
        debug!("procedure '{name}' takes {} parameter(s)", cells.len());

        self.declarations()?;
        self.emitter.emit_procedure_entry(&frame, &cells);
        let outer_exit = self.exit_label.replace(frame.exit);
        self.compound_statement()?;
        self.exit_label = outer_exit;
        self.expect(TokenKind::Semicolon)?;

        self.emitter.emit_procedure_epilogue(&label, &frame);
        self.symbols.exit_procedure();
        Ok(())
    }

    /// Declare one group of formal parameters; each gets a one-word cell that
    /// will hold the address of the actual argument.
    fn parameter_group(&mut self, cells: &mut Vec<String>) -> Result<(), CompileError> {
        let names = self.name_list()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.type_spec()?;
        for (name, line) in names {
            match self.symbols.declare_parameter(&name, ty.clone(), line) {
                Ok(()) => {
                    let label = storage_label(&name, self.symbols.current_procedure());
                    self.emitter.reserve_storage(&label, 1);
                    cells.push(label);
                }
                Err(existing) => warn!("line {line}: {existing}; keeping the first declaration"),
            }
        }
        Ok(())
    }
}
