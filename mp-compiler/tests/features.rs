use mp_compiler::semantic::{Symbol, TypeValue};
use mp_compiler::{compile, xref};

// ── Scoping ──────────────────────────────────────────────────────────────

#[test]
fn locals_shadow_globals() {
    let source = r#"program t;
var x: integer;
procedure p(y: char);
var x: boolean;
begin
  x := true;
  y := 'a'
end;
begin
  x := 1
end."#;
    let compilation = compile(source).unwrap();
    let global = symbol(&compilation.symbols, "x", None);
    assert_eq!(global.ty, TypeValue::Integer);
    assert_eq!(global.reference_lines, vec![10]);

    let local = symbol(&compilation.symbols, "x", Some("p"));
    assert_eq!(local.ty, TypeValue::Boolean);
    assert_eq!(local.definition_line, 4);
    assert_eq!(local.reference_lines, vec![6]);

    let param = symbol(&compilation.symbols, "y", Some("p"));
    assert!(param.is_parameter);

    let asm = &compilation.assembly;
    assert!(asm.contains("STA     _p_x"));
    assert!(asm.contains("STA     @_p_y"));
    assert!(asm.contains("STA     _x"));
}

#[test]
fn procedure_bodies_see_globals() {
    let source = r#"program t;
var g: integer;
procedure p;
begin
  g := g + 1
end;
begin
  call p
end."#;
    let compilation = compile(source).unwrap();
    let g = symbol(&compilation.symbols, "g", None);
    assert_eq!(g.reference_lines, vec![5]);
    assert!(compilation.assembly.contains("STA     _g"));
}

#[test]
fn procedures_are_global_and_record_parameter_types() {
    let source = r#"program t;
procedure p(a: integer; v: array[3] of boolean; c, d: char);
begin
end;
begin
end."#;
    let compilation = compile(source).unwrap();
    let p = symbol(&compilation.symbols, "p", None);
    assert_eq!(
        p.ty,
        TypeValue::Procedure {
            params: vec![
                TypeValue::Integer,
                TypeValue::array(TypeValue::Boolean, 3),
                TypeValue::Char,
                TypeValue::Char,
            ]
        }
    );
    assert_eq!(
        p.ty.describe(),
        "procedure(integer,array[3]ofboolean,char,char)"
    );
}

#[test]
fn later_procedures_may_call_earlier_ones() {
    let source = r#"program t;
procedure a;
begin
end;
procedure b;
begin
  call a
end;
begin
  call b
end."#;
    let compilation = compile(source).unwrap();
    assert_eq!(symbol(&compilation.symbols, "a", None).reference_lines, vec![7]);
    assert_eq!(symbol(&compilation.symbols, "b", None).reference_lines, vec![10]);
}

// ── Declarations ─────────────────────────────────────────────────────────

#[test]
fn first_declaration_wins() {
    let source = "program t;\nvar a: integer;\n    a: char;\nbegin\n  a := 65\nend.";
    let compilation = compile(source).unwrap();
    assert_eq!(compilation.symbols.len(), 1);
    let a = &compilation.symbols[0];
    assert_eq!(a.ty, TypeValue::Integer);
    assert_eq!(a.definition_line, 2);
    assert_eq!(compilation.assembly.matches("_a       RESW").count(), 1);
}

#[test]
fn duplicate_parameter_keeps_the_first() {
    let source = "program t;\nprocedure p(a: integer; a: char);\nbegin\nend;\nbegin\n  call p(1)\nend.";
    let compilation = compile(source).unwrap();
    let p = symbol(&compilation.symbols, "p", None);
    assert_eq!(p.ty, TypeValue::Procedure { params: vec![TypeValue::Integer] });
}

#[test]
fn large_name_list() {
    let names: Vec<String> = (0..300).map(|i| format!("v{i}")).collect();
    let source = format!(
        "program t;\nvar {}: integer;\nbegin\n  v299 := v0\nend.",
        names.join(", ")
    );
    let compilation = compile(&source).unwrap();
    assert_eq!(compilation.symbols.len(), 300);
    assert_eq!(compilation.assembly.matches("RESW    1").count(), 300);
    assert_eq!(symbol(&compilation.symbols, "v0", None).reference_lines, vec![4]);
}

#[test]
fn array_storage_is_sized_by_element_count() {
    let source = "program t; var a: array[12] of char; b: boolean; begin end.";
    let asm = compile(source).unwrap().assembly;
    assert!(asm.contains("_a       RESW    12"));
    assert!(asm.contains("_b       RESW    1"));
}

// ── References ───────────────────────────────────────────────────────────

#[test]
fn references_are_recorded_once_per_line() {
    let source = "program t;\nvar a: integer;\nbegin\n  a := a + a;\n  a := 0\nend.";
    let compilation = compile(source).unwrap();
    assert_eq!(compilation.symbols[0].reference_lines, vec![4, 5]);
}

#[test]
fn comments_do_not_disturb_line_numbers() {
    let source = "program t;\n{ one\n  two }\nvar a: integer;\n/* three\n*/ begin\n  a := 1 // four\nend.";
    let compilation = compile(source).unwrap();
    let a = &compilation.symbols[0];
    assert_eq!(a.definition_line, 4);
    assert_eq!(a.reference_lines, vec![7]);
}

// ── Type rules ───────────────────────────────────────────────────────────

#[test]
fn scalars_convert_on_assignment() {
    let source = r#"program t;
var i: integer; c: char; b: boolean;
begin
  c := i;
  b := c;
  i := b
end."#;
    let asm = compile(source).unwrap().assembly;
    assert!(asm.contains("AND     #255"), "integer to char keeps the low byte");
}

#[test]
fn relations_accept_any_scalars() {
    let source = "program t; var b: boolean; begin b := 'a' < 5; b := true = 1 end.";
    assert!(compile(source).is_ok());
}

#[test]
fn conversion_functions() {
    let source = "program t; var i: integer; c: char; begin c := char(i + 64); i := integer(c) end.";
    assert!(compile(source).is_ok());
}

// ── Cross-reference listing ──────────────────────────────────────────────

#[test]
fn xref_lists_every_symbol() {
    let source = r#"program t;
var b, a: integer;
procedure p(n: integer);
begin
end;
begin
  a := 1;
  call p(a);
  b := a
end."#;
    let compilation = compile(source).unwrap();
    let table = xref::render(&compilation.symbols);
    let rows: Vec<&str> = table.lines().skip(2).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].starts_with("a ") && rows[0].ends_with("7, 8, 9"));
    assert!(rows[1].starts_with("b "));
    assert!(rows[2].starts_with("n ") && rows[2].contains("param"));
    assert!(rows[3].starts_with("p ") && rows[3].contains("procedure(integer)"));
}

// ── Helper ───────────────────────────────────────────────────────────────

fn symbol<'a>(symbols: &'a [Symbol], name: &str, procedure: Option<&str>) -> &'a Symbol {
    symbols
        .iter()
        .find(|s| s.name == name && s.owning_procedure.as_deref() == procedure)
        .unwrap_or_else(|| panic!("no symbol {name} in scope {procedure:?}"))
}
