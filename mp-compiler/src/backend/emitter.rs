use super::abi::{Register, RuntimeRoutine, INT_MAX, INT_MIN};
use super::instruction::{Disp, Instr, Line, Opcode, Operand};
use log::trace;
use std::fmt;

/// A generated code label, printed as `L0001`, `L0002`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{:04}", self.0)
    }
}

impl From<Label> for Disp {
    fn from(label: Label) -> Self {
        Disp::Label(label.to_string())
    }
}

impl From<RuntimeRoutine> for Disp {
    fn from(routine: RuntimeRoutine) -> Self {
        Disp::Label(routine.name().to_string())
    }
}

/// Entry and exit labels of the program body or of one procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub entry: Label,
    pub exit: Label,
}

/// Assembly label of a user variable or procedure: `_name` for globals and
/// procedures, `_proc_name` for locals and parameters. Source names cannot
/// contain `_`, so these never collide with each other or with generated labels.
pub fn storage_label(name: &str, procedure: Option<&str>) -> String {
    match procedure {
        Some(procedure) => format!("_{procedure}_{name}"),
        None => format!("_{name}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
            ArithOp::And => "and",
            ArithOp::Or => "or",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, ArithOp::And | ArithOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// (value loaded first, jump that keeps it, value loaded otherwise)
    fn sequence(&self) -> (i32, Opcode, i32) {
        match self {
            Relation::Eq => (1, Opcode::Jeq, 0),
            Relation::Neq => (0, Opcode::Jeq, 1),
            Relation::Lt => (1, Opcode::Jlt, 0),
            Relation::Gt => (1, Opcode::Jgt, 0),
            Relation::Le => (0, Opcode::Jgt, 1),
            Relation::Ge => (0, Opcode::Jlt, 1),
        }
    }
}

/// Append-only writer of the output assembly.
///
/// A label is held back until the next instruction so that it shares that
/// instruction's line. Temporaries and string constants go to a literal
/// pool that is written out at the end of the program section.
#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<Line>,
    pool: Vec<Line>,
    pending: Option<String>,
    label_counter: u32,
    temp_counter: u32,
    frozen: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore every later write (after the first error).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn new_label(&mut self) -> Label {
        self.label_counter += 1;
        Label(self.label_counter)
    }

    /// Allocate a one-word temporary in the literal pool.
    pub fn new_temp(&mut self) -> String {
        self.temp_counter += 1;
        let name = format!("T{:04}", self.temp_counter);
        if !self.frozen {
            self.pool.push(Line {
                label: Some(name.clone()),
                instr: Some(Instr::new(Opcode::Resw, Operand::direct(1))),
            });
        }
        name
    }

    /// Place a string constant in the literal pool and return its label.
    pub fn string_literal(&mut self, text: &str) -> Label {
        let label = self.new_label();
        if !self.frozen {
            self.pool.push(Line {
                label: Some(label.to_string()),
                instr: Some(Instr::new(Opcode::Byte, Operand::Chars(text.to_string()))),
            });
        }
        label
    }

    fn push(&mut self, line: Line) {
        trace!("{line}");
        self.lines.push(line);
    }

    fn flush_pending(&mut self) {
        if let Some(label) = self.pending.take() {
            self.push(Line::label_only(label));
        }
    }

    pub fn emit_label(&mut self, label: impl fmt::Display) {
        if self.frozen {
            return;
        }
        self.flush_pending();
        self.pending = Some(label.to_string());
    }

    pub fn emit(&mut self, op: Opcode, operand: Operand) {
        if self.frozen {
            return;
        }
        let label = self.pending.take();
        self.push(Line {
            label,
            instr: Some(Instr::new(op, operand)),
        });
    }

    /// Emit a line that carries its own label (section starts, storage).
    fn emit_named(&mut self, name: &str, op: Opcode, operand: Operand) {
        if self.frozen {
            return;
        }
        self.flush_pending();
        self.push(Line {
            label: Some(name.to_string()),
            instr: Some(Instr::new(op, operand)),
        });
    }

    pub fn emit_push(&mut self, reg: Register) {
        self.emit(Opcode::Push, Operand::Register(reg));
    }

    pub fn emit_pop(&mut self, reg: Register) {
        self.emit(Opcode::Pop, Operand::Register(reg));
    }

    pub fn emit_jump(&mut self, op: Opcode, target: impl Into<Disp>) {
        self.emit(op, Operand::direct(target));
    }

    pub fn emit_call(&mut self, routine: RuntimeRoutine) {
        self.emit_jump(Opcode::Jsub, routine);
    }

    pub fn reserve_storage(&mut self, label: &str, words: usize) {
        self.emit_named(label, Opcode::Resw, Operand::direct(words as i64));
    }

    // ── Program and procedure sections ──────────────────────────────────

    pub fn emit_program_prologue(&mut self, name: &str) -> Frame {
        let frame = Frame {
            entry: self.new_label(),
            exit: self.new_label(),
        };
        self.emit_named(name, Opcode::Start, Operand::direct(0));
        let routines = RuntimeRoutine::ALL.iter().map(|r| r.name().to_string()).collect();
        self.emit(Opcode::Extref, Operand::Labels(routines));
        self.emit_push(Register::LINK);
        self.emit_jump(Opcode::J, frame.entry);
        frame
    }

    /// Close the program body, then write the literal pool and `END`.
    pub fn emit_program_epilogue(&mut self, name: &str, frame: &Frame) {
        self.emit_label(frame.exit);
        self.emit_pop(Register::LINK);
        self.emit(Opcode::Rsub, Operand::None);
        if self.frozen {
            return;
        }
        for line in std::mem::take(&mut self.pool) {
            self.push(line);
        }
        self.emit(Opcode::End, Operand::direct(name));
    }

    pub fn emit_procedure_prologue(&mut self, label: &str) -> Frame {
        let frame = Frame {
            entry: self.new_label(),
            exit: self.new_label(),
        };
        self.emit_named(label, Opcode::Start, Operand::direct(0));
        self.emit_jump(Opcode::J, frame.entry);
        frame
    }

    /// Pop the argument addresses (last argument first) into the parameter
    /// cells, then save the return address.
    pub fn emit_procedure_entry(&mut self, frame: &Frame, params: &[String]) {
        self.emit_label(frame.entry);
        for param in params.iter().rev() {
            self.emit_pop(Register::SCRATCH);
            self.emit(Opcode::Stt, Operand::direct(param.as_str()));
        }
        self.emit_push(Register::LINK);
    }

    pub fn emit_procedure_epilogue(&mut self, label: &str, frame: &Frame) {
        self.emit_label(frame.exit);
        self.emit_pop(Register::LINK);
        self.emit(Opcode::Rsub, Operand::None);
        self.emit(Opcode::End, Operand::direct(label));
    }

    // ── Runtime checks ──────────────────────────────────────────────────

    /// Index in A must lie in `0..size`.
    pub fn emit_bounds_check(&mut self, size: usize) {
        self.emit(Opcode::Comp, Operand::immediate(0));
        self.emit_jump(Opcode::Jlt, RuntimeRoutine::BndErr);
        self.emit(Opcode::Comp, Operand::immediate(size as i64 - 1));
        self.emit_jump(Opcode::Jgt, RuntimeRoutine::BndErr);
    }

    pub fn emit_overflow_check(&mut self) {
        self.emit(Opcode::Comp, Operand::immediate(INT_MAX));
        self.emit_jump(Opcode::Jgt, RuntimeRoutine::OvfErr);
        self.emit(Opcode::Comp, Operand::immediate(INT_MIN));
        self.emit_jump(Opcode::Jlt, RuntimeRoutine::OvfErr);
    }

    pub fn emit_zero_check(&mut self) {
        self.emit(Opcode::Comp, Operand::immediate(0));
        self.emit_jump(Opcode::Jeq, RuntimeRoutine::DivErr);
    }

    /// Jump to `target` when A is false (zero).
    pub fn emit_condition_test(&mut self, target: Label) {
        self.emit(Opcode::Comp, Operand::immediate(0));
        self.emit_jump(Opcode::Jeq, target);
    }

    // ── Operators ───────────────────────────────────────────────────────

    /// Pop the left operand into S and combine it with the right operand
    /// in A. The result is left in A.
    pub fn emit_arith(&mut self, op: ArithOp) {
        use Register::{A, S, T};
        self.emit_pop(S);
        match op {
            ArithOp::Add => self.emit(Opcode::Addr, Operand::pair(S, A)),
            ArithOp::Sub => {
                self.emit(Opcode::Subr, Operand::pair(A, S));
                self.emit(Opcode::Rmo, Operand::pair(S, A));
            }
            ArithOp::Mul => self.emit(Opcode::Mulr, Operand::pair(S, A)),
            ArithOp::Div => {
                self.emit_zero_check();
                self.emit(Opcode::Divr, Operand::pair(A, S));
                self.emit(Opcode::Rmo, Operand::pair(S, A));
            }
            ArithOp::Mod => {
                self.emit_zero_check();
                self.emit(Opcode::Rmo, Operand::pair(S, T));
                self.emit(Opcode::Divr, Operand::pair(A, T));
                self.emit(Opcode::Mulr, Operand::pair(A, T));
                self.emit(Opcode::Subr, Operand::pair(T, S));
                self.emit(Opcode::Rmo, Operand::pair(S, A));
            }
            ArithOp::And => self.emit(Opcode::Andr, Operand::pair(S, A)),
            ArithOp::Or => self.emit(Opcode::Orr, Operand::pair(S, A)),
        }
        if matches!(op, ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div) {
            self.emit_overflow_check();
        }
    }

    /// Pop the left operand into S, compare it with A and leave 1 or 0 in A.
    pub fn emit_relation(&mut self, rel: Relation) {
        self.emit_pop(Register::S);
        self.emit(Opcode::Compr, Operand::pair(Register::S, Register::A));
        let (first, jump, second) = rel.sequence();
        self.emit_select(first, jump, second);
    }

    fn emit_select(&mut self, first: i32, jump: Opcode, second: i32) {
        let done = self.new_label();
        self.emit(Opcode::Lda, Operand::immediate(first));
        self.emit_jump(jump, done);
        if second == 0 {
            self.emit(Opcode::Clear, Operand::Register(Register::A));
        } else {
            self.emit(Opcode::Lda, Operand::immediate(second));
        }
        self.emit_label(done);
    }

    pub fn emit_negate(&mut self) {
        self.emit(Opcode::Rmo, Operand::pair(Register::A, Register::S));
        self.emit(Opcode::Clear, Operand::Register(Register::A));
        self.emit(Opcode::Subr, Operand::pair(Register::S, Register::A));
        self.emit_overflow_check();
    }

    pub fn emit_not(&mut self) {
        self.emit(Opcode::Comp, Operand::immediate(0));
        self.emit_select(1, Opcode::Jeq, 0);
    }

    /// Map A to 0 or 1.
    pub fn emit_normalize_boolean(&mut self) {
        self.emit(Opcode::Comp, Operand::immediate(0));
        self.emit_select(0, Opcode::Jeq, 1);
    }

    pub fn emit_mask_char(&mut self) {
        self.emit(Opcode::And, Operand::immediate(255));
    }

    /// Render the program text. Consumes the emitter.
    pub fn finish(mut self) -> String {
        self.flush_pending();
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }
}
