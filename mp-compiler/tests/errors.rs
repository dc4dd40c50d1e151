use mp_compiler::frontend::LexicalErrorKind;
use mp_compiler::{compile, Compilation, CompileError, SemanticErrorKind};

// ── Semantic error detection ─────────────────────────────────────────────
// Each test verifies that an invalid program produces the correct error kind.

#[test]
fn multi_character_string_is_not_a_value() {
    let source = "program t; var c: char; begin c := 'ab' end.";
    assert_semantic_error(compile(source), SemanticErrorKind::TypeMismatch);
}

#[test]
fn argument_type_mismatch() {
    let source = r#"
        program t;
        var a: integer;
        procedure p(v: array[3] of integer);
        begin
        end;
        begin
          call p(a)
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::TypeMismatch);
}

#[test]
fn array_sizes_must_match() {
    let source = r#"
        program t;
        var a: array[4] of integer;
        procedure p(v: array[3] of integer);
        begin
        end;
        begin
          call p(a)
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::TypeMismatch);
}

#[test]
fn direct_recursion() {
    let source = r#"
        program t;
        procedure p;
        begin
          call p
        end;
        begin
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::RecursiveCall);
}

#[test]
fn break_outside_loop() {
    let source = "program t; begin break end.";
    assert_semantic_error(compile(source), SemanticErrorKind::BreakOutsideLoop);
}

#[test]
fn break_in_procedure_called_from_loop() {
    // The loop counter is lexical: a loop around the call does not count.
    let source = r#"
        program t;
        procedure p;
        begin
          break
        end;
        begin
          while true do call p
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::BreakOutsideLoop);
}

#[test]
fn break_after_loop() {
    let source = r#"
        program t;
        begin
          while false do begin end;
          break
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::BreakOutsideLoop);
}

#[test]
fn index_on_scalar() {
    let source = "program t; var a: integer; begin a[1] := 2 end.";
    assert_semantic_error(compile(source), SemanticErrorKind::NotAnArray);
}

#[test]
fn whole_array_assignment() {
    let source = "program t; var a, b: array[3] of integer; begin a := b end.";
    assert_semantic_error(compile(source), SemanticErrorKind::MissingIndex);
}

#[test]
fn whole_array_in_expression() {
    let source = "program t; var a: array[3] of integer; i: integer; begin i := a + 1 end.";
    assert_semantic_error(compile(source), SemanticErrorKind::MissingIndex);
}

#[test]
fn procedure_used_as_value() {
    let source = r#"
        program t;
        var a: integer;
        procedure p;
        begin
        end;
        begin
          a := p
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::ProcedureAsValue);
}

#[test]
fn call_on_variable() {
    let source = "program t; var a: integer; begin call a end.";
    assert_semantic_error(compile(source), SemanticErrorKind::NotAProcedure);
}

#[test]
fn too_many_arguments() {
    let source = r#"
        program t;
        procedure add(a, b: integer);
        begin
        end;
        begin
          call add(1, 2, 3)
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::ArgumentCountMismatch);
}

#[test]
fn too_few_arguments() {
    let source = r#"
        program t;
        procedure add(a, b: integer);
        begin
        end;
        begin
          call add(1)
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::ArgumentCountMismatch);
}

#[test]
fn procedure_declared_twice() {
    let source = r#"
        program t;
        procedure p;
        begin
        end;
        procedure p;
        begin
        end;
        begin
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::DuplicateProcedure);
}

#[test]
fn nested_procedure() {
    let source = r#"
        program t;
        procedure outer;
        procedure inner;
        begin
        end;
        begin
        end;
        begin
        end.
    "#;
    assert_semantic_error(compile(source), SemanticErrorKind::NestedProcedure);
}

#[test]
fn empty_array() {
    let source = "program t; var a: array[0] of integer; begin end.";
    assert_semantic_error(compile(source), SemanticErrorKind::InvalidArraySize);
}

// ── Syntax and lexical errors ────────────────────────────────────────────

#[test]
fn missing_period_reports_last_line() {
    let source = "program t;\nvar a: integer;\nbegin\n  a := 1\nend\n\n";
    match compile(source) {
        Err(CompileError::Syntax { line, message }) => {
            assert_eq!(line, 5, "error should be on the last non-blank line");
            assert!(message.contains("'.'"), "unexpected message: {message}");
        }
        other => panic!("Expected syntax error, got: {other:?}"),
    }
}

#[test]
fn semicolon_before_else() {
    let source = r#"program t;
var a: integer;
begin
  if a = 1 then a := 2;
  else a := 3
end."#;
    match compile(source) {
        Err(CompileError::Syntax { line, message }) => {
            assert_eq!(line, 5);
            assert!(message.contains("before 'else'"), "unexpected message: {message}");
        }
        other => panic!("Expected syntax error, got: {other:?}"),
    }
}

#[test]
fn statement_expected() {
    let source = "program t;\nbegin\n  :=\nend.";
    let err = compile(source).unwrap_err();
    assert!(matches!(err, CompileError::Syntax { line: 3, .. }), "got {err:?}");
}

#[test]
fn invalid_character() {
    let source = "program t;\nbegin\n  #\nend.";
    match compile(source) {
        Err(CompileError::Lexical(err)) => {
            assert_eq!(err.line, 3);
            assert_eq!(err.kind, LexicalErrorKind::InvalidCharacter('#'));
        }
        other => panic!("Expected lexical error, got: {other:?}"),
    }
}

#[test]
fn number_out_of_range() {
    let source = "program t; var a: integer; begin a := 40000 end.";
    match compile(source) {
        Err(CompileError::Lexical(err)) => {
            assert!(matches!(err.kind, LexicalErrorKind::NumberOutOfRange(_)));
        }
        other => panic!("Expected lexical error, got: {other:?}"),
    }
}

#[test]
fn unterminated_string() {
    let source = "program t;\nbegin\n  write('abc\nend.";
    let err = compile(source).unwrap_err();
    assert_eq!(err.line(), 3);
    assert!(matches!(
        err,
        CompileError::Lexical(ref e) if e.kind == LexicalErrorKind::UnterminatedString
    ));
}

// ── Error reporting ──────────────────────────────────────────────────────

#[test]
fn only_the_first_error_is_reported() {
    let source = "program t;\nbegin\n  break;\n  call 5;\n  x[1] := \nend.";
    let err = compile(source).unwrap_err();
    assert_eq!(err.line(), 3);
}

#[test]
fn diagnostic_text() {
    let source = "program t;\nbegin\n  break\nend.";
    let err = compile(source).unwrap_err();
    assert_eq!(
        err.to_string(),
        "SemanticError:BreakOutsideLoop (line 3) - 'break' outside of a 'while' loop"
    );

    let err = compile("program t;\nbegin\nend").unwrap_err();
    assert!(err.to_string().starts_with("SyntaxError (line 3) - "));

    let err = compile("program t;\nbegin ? end.").unwrap_err();
    assert!(err.to_string().starts_with("LexicalError (line 2) - "));
}

#[test]
fn undeclared_names_are_not_fatal() {
    let source = "program t; begin zz := 1; call q end.";
    let compilation = compile(source).expect("undeclared names only warn");
    assert!(compilation.assembly.contains("STA     _zz"));
    assert!(compilation.assembly.contains("JSUB    _q"));
    assert!(compilation.symbols.is_empty());
}

// ── Helper ───────────────────────────────────────────────────────────────

fn assert_semantic_error(result: Result<Compilation, CompileError>, expected: SemanticErrorKind) {
    match result {
        Ok(_) => panic!("Expected {:?} error, but compilation succeeded", expected),
        Err(CompileError::Semantic { kind, .. }) => {
            assert_eq!(kind, expected);
        }
        Err(other) => panic!("Expected {:?} semantic error, got: {:?}", expected, other),
    }
}
