use mp_compiler::semantic::TypeValue;
use mp_compiler::{compile, Compilation};

// ── Sample program compilation ───────────────────────────────────────────
// Every program under samples/ must compile to one START/END pair per
// program and procedure.

#[test]
fn compile_hello_pas() {
    let asm = compile_sample("hello").assembly;
    assert_eq!(asm.lines().next(), Some("hello    START   0"));
    assert_eq!(asm.lines().last(), Some("         END     hello"));
    assert!(asm.contains("JSUB    WRSTR"));
}

#[test]
fn compile_gcd_pas() {
    let asm = compile_sample("gcd").assembly;
    assert!(asm.contains("JEQ     DIVERR"), "mod must check for a zero divisor");
    assert!(asm.contains("JSUB    RDINT"));
}

#[test]
fn compile_sort_pas() {
    let compilation = compile_sample("sort");
    let asm = &compilation.assembly;
    assert_eq!(count(asm, "START"), 3);
    assert_eq!(count(asm, "END"), 3);
    assert!(asm.contains("_bubble_a RESW    1"), "parameter cells hold one address");
    assert!(asm.contains("LDA     @_bubble_a,X"), "array parameter is read through its address");
    assert!(asm.contains("JSUB    _swap"));
}

#[test]
fn compile_params_pas() {
    let asm = compile_sample("params").assembly;
    assert!(asm.contains("JSUB    _addto"));
    assert!(asm.contains("JSUB    _classify"));
    assert!(asm.contains("JSUB    WRBOOL"));
}

#[test]
fn compile_primes_pas() {
    let asm = compile_sample("primes").assembly;
    assert!(asm.contains("_sieve   RESW    100"));
    assert!(asm.contains("JGT     BNDERR"));
}

// ── Program layout ───────────────────────────────────────────────────────

#[test]
fn assignment_round_trip() {
    let compilation =
        compile("program T; var a,b:integer; begin a:=1; b:=a+2; write(b); end.").unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();

    assert_eq!(lines[0], "T        START   0");
    assert!(lines[1].starts_with("         EXTREF  ERRPRT,DIVERR,OVFERR,BNDERR,"));
    assert_eq!(lines[2], "         PUSH    L");
    assert_eq!(lines[3], "         J       L0001");
    assert_eq!(lines[4], "_a       RESW    1");
    assert_eq!(lines[5], "_b       RESW    1");
    assert_eq!(lines[6], "L0001    LDA     #1");
    assert_eq!(lines[7], "         STA     _a");
    assert_eq!(lines.last(), Some(&"         END     T"));

    let add = position(&lines, "         ADDR    S,A");
    let store = position(&lines, "         STA     _b");
    assert!(add < store, "the sum is computed before it is stored");

    let exit = position(&lines, "L0002    POP     L");
    assert_eq!(lines[exit + 1], "         RSUB");

    assert_eq!(compilation.symbols.len(), 2);
    for symbol in &compilation.symbols {
        assert_eq!(symbol.ty, TypeValue::Integer);
        assert_eq!(symbol.reference_lines, vec![1]);
        assert_eq!(symbol.owning_procedure, None);
    }
}

#[test]
fn binary_operator_protocol() {
    let compilation = compile(
        "program t;
         var a, b: integer;
         begin
           a := b - 3
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let start = position(&lines, "L0001    LDA     _b");
    assert_eq!(
        &lines[start + 1..start + 6],
        &[
            "         PUSH    A",
            "         LDA     #3",
            "         POP     S",
            "         SUBR    A,S",
            "         RMO     S,A",
        ]
    );
    assert_eq!(lines[start + 6], "         COMP    #32767");
    assert_eq!(lines[start + 7], "         JGT     OVFERR");
    assert_eq!(lines[start + 10], "         STA     _a");
}

#[test]
fn constant_operands_are_still_checked() {
    let compilation = compile(
        "program t;
         var a, x: integer;
         begin
           a := 30000 + 30000;
           a := x div 5
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let add = position(&lines, "         ADDR    S,A");
    assert_eq!(lines[add + 1], "         COMP    #32767");
    assert_eq!(lines[add + 2], "         JGT     OVFERR");

    let divide = position(&lines, "         DIVR    A,S");
    assert_eq!(lines[divide - 2], "         COMP    #0");
    assert_eq!(lines[divide - 1], "         JEQ     DIVERR");
}

#[test]
fn logical_operands_are_normalized() {
    let compilation = compile(
        "program t;
         var i: integer; b: boolean;
         begin
           b := i and b
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let start = position(&lines, "L0001    LDA     _i");
    assert_eq!(
        &lines[start + 1..start + 6],
        &[
            "         COMP    #0",
            "         LDA     #0",
            "         JEQ     L0003",
            "         LDA     #1",
            "L0003    PUSH    A",
        ]
    );
    let and = position(&lines, "         ANDR    S,A");
    assert_eq!(lines[and - 2], "         LDA     _b");
}

#[test]
fn procedure_section_layout() {
    let compilation = compile(
        "program t;
         procedure p(x: integer);
         begin
           x := 1
         end;
         begin
           call p(5)
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let start = position(&lines, "_p       START   0");
    assert_eq!(
        &lines[start..start + 10],
        &[
            "_p       START   0",
            "         J       L0003",
            "_p_x     RESW    1",
            "L0003    POP     T",
            "         STT     _p_x",
            "         PUSH    L",
            "         LDA     #1",
            "         STA     @_p_x",
            "L0004    POP     L",
            "         RSUB",
        ]
    );
    assert_eq!(lines[start + 10], "         END     _p");
}

#[test]
fn expression_arguments_go_through_temporaries() {
    let compilation = compile(
        "program t;
         var a: integer;
         procedure p(x: integer);
         begin
         end;
         begin
           call p(a + 1);
           call p(a)
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let temp = position(&lines, "         STA     T0001");
    assert_eq!(lines[temp + 1], "         LDA     #T0001");
    assert_eq!(lines[temp + 2], "         PUSH    A");
    assert_eq!(lines[temp + 3], "         JSUB    _p");
    // a bare variable passes its own address
    assert_eq!(lines[temp + 4], "         LDA     #_a");
    assert!(lines.contains(&"T0001    RESW    1"));
}

#[test]
fn string_constants_live_in_the_literal_pool() {
    let compilation = compile(
        "program t;
         begin
           write('it''s')
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let pool = position(&lines, "L0003    BYTE    C'it''s'");
    assert!(pool > position(&lines, "         RSUB"));
    assert!(lines.contains(&"         LDA     #L0003"));
    assert!(lines.contains(&"         LDT     #4"));
}

#[test]
fn element_access_checks_bounds_first() {
    let compilation = compile(
        "program t;
         var v: array[5] of char;
             i: integer;
         begin
           v[i] := 'x'
         end.",
    )
    .unwrap();
    let lines: Vec<&str> = compilation.assembly.lines().collect();
    let start = position(&lines, "L0001    LDA     _i");
    assert_eq!(
        &lines[start + 1..start + 9],
        &[
            "         COMP    #0",
            "         JLT     BNDERR",
            "         COMP    #4",
            "         JGT     BNDERR",
            "         PUSH    A",
            "         LDA     #120",
            "         POP     X",
            "         STA     _v,X",
        ]
    );
}

#[test]
fn labels_are_never_reused() {
    let compilation = compile_sample("primes");
    let mut labels: Vec<&str> = compilation
        .assembly
        .lines()
        .filter(|line| line.starts_with('L'))
        .map(|line| line.split_whitespace().next().unwrap_or(""))
        .collect();
    let total = labels.len();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), total);
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn compile_sample(name: &str) -> Compilation {
    let path = format!("../samples/{name}.pas");
    let source =
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {path}: {e}"));
    compile(&source).unwrap_or_else(|e| panic!("{name}.pas should compile: {e}"))
}

fn count(asm: &str, mnemonic: &str) -> usize {
    asm.lines()
        .filter(|line| line.split_whitespace().any(|word| word == mnemonic))
        .count()
}

fn position(lines: &[&str], wanted: &str) -> usize {
    lines
        .iter()
        .position(|line| *line == wanted)
        .unwrap_or_else(|| panic!("missing line {wanted:?}"))
}
