//! Register state and the fetch/execute loop.
use super::assembler::{Arg, Cell, Decoded, Image, Mode};
use super::{MachineError, DEFAULT_STACK_LIMIT, DEFAULT_STEP_LIMIT, LOADER_RETURN, ROUTINE_BASE};
use crate::backend::{Opcode, Register, RuntimeRoutine, INT_MAX, INT_MIN};
use log::{debug, trace};
use std::cmp::Ordering;
use std::fmt;

/// Widest field the write routines will pad to.
const MAX_FIELD_WIDTH: i32 = 255;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: i32,
    pub x: i32,
    pub l: i32,
    pub s: i32,
    pub t: i32,
}

impl Registers {
    pub fn get(&self, reg: Register) -> i32 {
        match reg {
            Register::A => self.a,
            Register::X => self.x,
            Register::L => self.l,
            Register::S => self.s,
            Register::T => self.t,
        }
    }

    pub fn set(&mut self, reg: Register, value: i32) {
        match reg {
            Register::A => self.a = value,
            Register::X => self.x = value,
            Register::L => self.l = value,
            Register::S => self.s = value,
            Register::T => self.t = value,
        }
    }
}

/// Errors the compiled program detects and reports through the runtime
/// routines. The discriminant is the code `ERRPRT` expects in A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    DivisionByZero = 1,
    Overflow = 2,
    Bounds = 3,
}

impl RuntimeError {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RuntimeError::DivisionByZero),
            2 => Some(RuntimeError::Overflow),
            3 => Some(RuntimeError::Bounds),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RuntimeError::DivisionByZero => "division by zero",
            RuntimeError::Overflow => "arithmetic overflow",
            RuntimeError::Bounds => "array index out of bounds",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The program returned to the loader.
    Halted,
    Trapped(RuntimeError),
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub output: String,
    pub status: Status,
    pub registers: Registers,
    pub steps: u64,
}

/// Core state of the simulator.
pub struct Machine {
    // ------------------------------------------------------------------------
    // Registers
    registers: Registers,
    /// Address of the next instruction.
    pc: i64,
    /// Condition code, set only by `COMP` and `COMPR`.
    cc: Ordering,

    // ------------------------------------------------------------------------
    // Memory
    memory: Vec<Cell>,
    /// Operand stack used by `PUSH` and `POP`.
    stack: Vec<i32>,

    // ------------------------------------------------------------------------
    // I/O
    input: Vec<char>,
    cursor: usize,
    output: String,

    // ------------------------------------------------------------------------
    // Control
    steps: u64,
    step_limit: u64,
    stack_limit: usize,
}

impl Machine {
    pub fn new(image: Image, input: &str) -> Self {
        Self {
            registers: Registers {
                l: LOADER_RETURN,
                ..Registers::default()
            },
            pc: image.entry as i64,
            cc: Ordering::Equal,
            memory: image.memory,
            stack: Vec::new(),
            input: input.chars().collect(),
            cursor: 0,
            output: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            stack_limit: DEFAULT_STACK_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.stack_limit = limit;
        self
    }

    /// Run until the program returns to the loader or a runtime routine
    /// reports an error.
    pub fn run(mut self) -> Result<Outcome, MachineError> {
        let status = loop {
            if self.pc == LOADER_RETURN as i64 {
                break Status::Halted;
            }
            if self.steps >= self.step_limit {
                return Err(MachineError::StepLimit(self.step_limit));
            }
            self.steps += 1;

            if self.pc >= ROUTINE_BASE as i64 {
                if let Some(error) = self.call_routine()? {
                    break Status::Trapped(error);
                }
                self.pc = self.registers.l as i64;
                continue;
            }

            let decoded = self.fetch()?;
            self.pc += 1;
            self.execute(decoded)?;
        };
        debug!("machine stopped after {} step(s): {status:?}", self.steps);
        Ok(Outcome {
            output: self.output,
            status,
            registers: self.registers,
            steps: self.steps,
        })
    }

    fn fetch(&self) -> Result<Decoded, MachineError> {
        match self.cell(self.pc)? {
            Cell::Instr(decoded) => Ok(*decoded),
            Cell::Word(_) => Err(MachineError::NotAnInstruction(self.pc)),
        }
    }

    fn cell(&self, address: i64) -> Result<&Cell, MachineError> {
        usize::try_from(address)
            .ok()
            .and_then(|i| self.memory.get(i))
            .ok_or(MachineError::BadAddress(address))
    }

    fn load(&self, address: i64) -> Result<i32, MachineError> {
        match self.cell(address)? {
            Cell::Word(value) => Ok(*value),
            Cell::Instr(_) => Err(MachineError::NotData(address)),
        }
    }

    fn store(&mut self, address: i64, value: i32) -> Result<(), MachineError> {
        let slot = usize::try_from(address)
            .ok()
            .and_then(|i| self.memory.get_mut(i))
            .ok_or(MachineError::BadAddress(address))?;
        *slot = Cell::Word(value);
        Ok(())
    }

    fn bad_operand(&self, op: Opcode) -> MachineError {
        MachineError::BadOperand {
            op: op.mnemonic().to_string(),
            pc: self.pc - 1,
        }
    }

    // ========================================================================
    // Operands
    // ========================================================================

    /// Address a memory operand refers to. Immediate operands have none.
    fn effective_address(&self, mode: Mode, value: i32) -> Result<Option<i64>, MachineError> {
        let x = self.registers.x as i64;
        Ok(match mode {
            Mode::Immediate => None,
            Mode::Direct => Some(value as i64),
            Mode::Indexed => Some(value as i64 + x),
            Mode::Indirect => Some(self.load(value as i64)? as i64),
            Mode::IndirectIndexed => Some(self.load(value as i64)? as i64 + x),
        })
    }

    fn operand_value(&self, op: Opcode, arg: Arg) -> Result<i32, MachineError> {
        let Arg::Memory { mode, value } = arg else {
            return Err(self.bad_operand(op));
        };
        match self.effective_address(mode, value)? {
            Some(address) => self.load(address),
            None => Ok(value),
        }
    }

    fn operand_address(&self, op: Opcode, arg: Arg) -> Result<i64, MachineError> {
        match arg {
            Arg::Memory { mode, value } => self
                .effective_address(mode, value)?
                .ok_or_else(|| self.bad_operand(op)),
            _ => Err(self.bad_operand(op)),
        }
    }

    fn push(&mut self, value: i32) -> Result<(), MachineError> {
        if self.stack.len() >= self.stack_limit {
            return Err(MachineError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, MachineError> {
        self.stack.pop().ok_or(MachineError::StackUnderflow)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    fn execute(&mut self, decoded: Decoded) -> Result<(), MachineError> {
        let Decoded { op, arg } = decoded;
        trace!("{:>6}  {} {:?}", self.pc - 1, op, arg);
        match op {
            // ── Loads and stores ────────────────────────────────────────
            Opcode::Lda | Opcode::Lds | Opcode::Ldt | Opcode::Ldx | Opcode::Ldl => {
                let value = self.operand_value(op, arg)?;
                self.registers.set(loaded_register(op), value);
            }
            Opcode::Sta | Opcode::Sts | Opcode::Stt | Opcode::Stx | Opcode::Stl => {
                let address = self.operand_address(op, arg)?;
                let value = self.registers.get(loaded_register(op));
                self.store(address, value)?;
            }

            // ── Accumulator arithmetic ──────────────────────────────────
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::And | Opcode::Or => {
                let value = self.operand_value(op, arg)?;
                let a = self.registers.a;
                self.registers.a = self.combine(op, a, value)?;
            }
            Opcode::Comp => {
                let value = self.operand_value(op, arg)?;
                self.cc = self.registers.a.cmp(&value);
            }

            // ── Jumps ───────────────────────────────────────────────────
            Opcode::J | Opcode::Jeq | Opcode::Jgt | Opcode::Jlt | Opcode::Jsub => {
                let target = self.operand_address(op, arg)?;
                let taken = match op {
                    Opcode::Jeq => self.cc == Ordering::Equal,
                    Opcode::Jgt => self.cc == Ordering::Greater,
                    Opcode::Jlt => self.cc == Ordering::Less,
                    _ => true,
                };
                if op == Opcode::Jsub {
                    self.registers.l = self.pc as i32;
                }
                if taken {
                    self.pc = target;
                }
            }
            Opcode::Rsub => self.pc = self.registers.l as i64,

            // ── Register operations ─────────────────────────────────────
            Opcode::Addr | Opcode::Subr | Opcode::Mulr | Opcode::Divr | Opcode::Andr | Opcode::Orr => {
                let Arg::Pair(r1, r2) = arg else {
                    return Err(self.bad_operand(op));
                };
                let lhs = self.registers.get(r2);
                let rhs = self.registers.get(r1);
                let result = self.combine(op, lhs, rhs)?;
                self.registers.set(r2, result);
            }
            Opcode::Compr => {
                let Arg::Pair(r1, r2) = arg else {
                    return Err(self.bad_operand(op));
                };
                self.cc = self.registers.get(r1).cmp(&self.registers.get(r2));
            }
            Opcode::Rmo => {
                let Arg::Pair(r1, r2) = arg else {
                    return Err(self.bad_operand(op));
                };
                self.registers.set(r2, self.registers.get(r1));
            }
            Opcode::Clear | Opcode::Push | Opcode::Pop => {
                let Arg::Register(reg) = arg else {
                    return Err(self.bad_operand(op));
                };
                match op {
                    Opcode::Clear => self.registers.set(reg, 0),
                    Opcode::Push => self.push(self.registers.get(reg))?,
                    _ => {
                        let value = self.pop()?;
                        self.registers.set(reg, value);
                    }
                }
            }

            Opcode::Start | Opcode::End | Opcode::Extref | Opcode::Resw | Opcode::Word | Opcode::Byte => {
                return Err(MachineError::NotAnInstruction(self.pc - 1));
            }
        }
        Ok(())
    }

    /// `lhs op rhs` in 32-bit wrapping arithmetic. Range checks on the
    /// 16-bit language values are the compiled code's job.
    fn combine(&self, op: Opcode, lhs: i32, rhs: i32) -> Result<i32, MachineError> {
        Ok(match op {
            Opcode::Add | Opcode::Addr => lhs.wrapping_add(rhs),
            Opcode::Sub | Opcode::Subr => lhs.wrapping_sub(rhs),
            Opcode::Mul | Opcode::Mulr => lhs.wrapping_mul(rhs),
            Opcode::Div | Opcode::Divr => {
                if rhs == 0 {
                    return Err(MachineError::DivideByZero(self.pc - 1));
                }
                lhs.wrapping_div(rhs)
            }
            Opcode::And | Opcode::Andr => lhs & rhs,
            Opcode::Or | Opcode::Orr => lhs | rhs,
            _ => return Err(self.bad_operand(op)),
        })
    }

    // ========================================================================
    // Runtime-support routines
    // ========================================================================

    fn call_routine(&mut self) -> Result<Option<RuntimeError>, MachineError> {
        let index = (self.pc - ROUTINE_BASE as i64) as usize;
        let routine = RuntimeRoutine::ALL
            .get(index)
            .copied()
            .ok_or(MachineError::BadAddress(self.pc))?;
        trace!("runtime routine {routine}");

        let width = self.registers.t.clamp(0, MAX_FIELD_WIDTH) as usize;
        match routine {
            RuntimeRoutine::ErrPrt => {
                let a = self.registers.a;
                let error = RuntimeError::from_code(a)
                    .ok_or_else(|| MachineError::BadInput(format!("error code {a}")))?;
                return Ok(Some(self.report(error)));
            }
            RuntimeRoutine::DivErr => return Ok(Some(self.report(RuntimeError::DivisionByZero))),
            RuntimeRoutine::OvfErr => return Ok(Some(self.report(RuntimeError::Overflow))),
            RuntimeRoutine::BndErr => return Ok(Some(self.report(RuntimeError::Bounds))),
            RuntimeRoutine::RdInt => self.registers.a = self.read_int()?,
            RuntimeRoutine::RdChr => {
                let c = self.input.get(self.cursor).copied().ok_or(MachineError::InputExhausted)?;
                self.cursor += 1;
                self.registers.a = c as i32;
            }
            RuntimeRoutine::RdLn => {
                while let Some(c) = self.input.get(self.cursor) {
                    self.cursor += 1;
                    if *c == '\n' {
                        break;
                    }
                }
            }
            RuntimeRoutine::WrInt => {
                let text = self.registers.a.to_string();
                self.write_field(&text, width);
            }
            RuntimeRoutine::WrChr => {
                let c = char::from((self.registers.a & 0xFF) as u8);
                self.write_field(&c.to_string(), width);
            }
            RuntimeRoutine::WrBool => {
                let text = if self.registers.a != 0 { "true" } else { "false" };
                self.write_field(text, width);
            }
            RuntimeRoutine::WrStr => {
                let start = self.registers.a as i64;
                for offset in 0..self.registers.t.max(0) as i64 {
                    let word = self.load(start + offset)?;
                    self.output.push(char::from((word & 0xFF) as u8));
                }
            }
            RuntimeRoutine::WrLn => self.output.push('\n'),
        }
        Ok(None)
    }

    fn write_field(&mut self, text: &str, width: usize) {
        self.output.push_str(&format!("{text:>width$}"));
    }

    fn report(&mut self, error: RuntimeError) -> RuntimeError {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output.push_str(&format!("*** runtime error: {error}\n"));
        error
    }

    /// Skip blanks, then read an optionally signed decimal integer.
    fn read_int(&mut self) -> Result<i32, MachineError> {
        while self.input.get(self.cursor).is_some_and(|c| c.is_whitespace()) {
            self.cursor += 1;
        }
        let start = self.cursor;
        if matches!(self.input.get(self.cursor), Some('+' | '-')) {
            self.cursor += 1;
        }
        while self.input.get(self.cursor).is_some_and(|c| c.is_ascii_digit()) {
            self.cursor += 1;
        }
        if self.cursor == start && start == self.input.len() {
            return Err(MachineError::InputExhausted);
        }
        if !self.input[start..self.cursor].iter().any(char::is_ascii_digit) {
            let word: String = self.input[start..]
                .iter()
                .take_while(|c| !c.is_whitespace())
                .collect();
            return Err(MachineError::BadInput(word));
        }
        let text: String = self.input[start..self.cursor].iter().collect();
        text.parse::<i32>()
            .ok()
            .filter(|n| (INT_MIN..=INT_MAX).contains(n))
            .ok_or(MachineError::BadInput(text))
    }
}

/// Register a load or store opcode moves.
fn loaded_register(op: Opcode) -> Register {
    match op {
        Opcode::Lds | Opcode::Sts => Register::S,
        Opcode::Ldt | Opcode::Stt => Register::T,
        Opcode::Ldx | Opcode::Stx => Register::X,
        Opcode::Ldl | Opcode::Stl => Register::L,
        _ => Register::A,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{assemble, run};

    fn program(body: &str) -> String {
        format!(
            "\
demo     START   0
         EXTREF  ERRPRT,DIVERR,OVFERR,BNDERR,RDINT,RDCHR,RDLN,WRINT,WRCHR,WRBOOL,WRSTR,WRLN
         PUSH    L
{body}
         POP     L
         RSUB
         END     demo
"
        )
    }

    #[test]
    fn writes_integers_in_a_field() {
        let asm = program(
            "         LDA     #42
         LDT     #5
         JSUB    WRINT
         JSUB    WRLN",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.status, Status::Halted);
        assert_eq!(outcome.output, "   42\n");
    }

    #[test]
    fn register_ops_put_the_result_in_the_second_register() {
        let asm = program(
            "         LDA     #3
         LDS     #10
         SUBR    A,S
         RMO     S,A",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.registers.a, 7);
    }

    #[test]
    fn indirect_indexed_addressing() {
        let asm = program(
            "         J       L0001
_a       RESW    3
_p       WORD    0
L0001    LDA     #_a
         STA     _p
         LDA     #9
         LDX     #2
         STA     @_p,X
         LDA     _a,X",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.registers.a, 9);
    }

    #[test]
    fn strings_and_characters() {
        let asm = program(
            "         J       L0001
L0002    BYTE    C'hi '
L0001    LDA     #L0002
         LDT     #3
         JSUB    WRSTR
         LDA     #65
         CLEAR   T
         JSUB    WRCHR
         LDA     #1
         JSUB    WRBOOL",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.output, "hi Atrue");
    }

    #[test]
    fn reads_integers_and_characters() {
        let asm = program(
            "         JSUB    RDINT
         RMO     A,S
         JSUB    RDLN
         JSUB    RDCHR",
        );
        let outcome = run(&asm, "  -17 rest\nxyz").unwrap();
        assert_eq!(outcome.registers.s, -17);
        assert_eq!(outcome.registers.a, 'x' as i32);
    }

    #[test]
    fn malformed_input_is_a_machine_error() {
        let asm = program("         JSUB    RDINT");
        assert_eq!(run(&asm, "  ").unwrap_err(), MachineError::InputExhausted);
        assert_eq!(run(&asm, "abc").unwrap_err(), MachineError::BadInput("abc".into()));
        assert_eq!(
            run(&asm, "99999").unwrap_err(),
            MachineError::BadInput("99999".into())
        );
    }

    #[test]
    fn conditional_jump_to_handler_traps() {
        let asm = program(
            "         LDA     #5
         COMP    #3
         JGT     BNDERR",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.status, Status::Trapped(RuntimeError::Bounds));
        assert_eq!(outcome.output, "*** runtime error: array index out of bounds\n");
    }

    #[test]
    fn errprt_takes_the_code_in_a() {
        let asm = program(
            "         LDA     #2
         JSUB    ERRPRT",
        );
        let outcome = run(&asm, "").unwrap();
        assert_eq!(outcome.status, Status::Trapped(RuntimeError::Overflow));
    }

    #[test]
    fn machine_faults() {
        let asm = program("         POP     A");
        assert_eq!(run(&asm, "").unwrap_err(), MachineError::StackUnderflow);

        let asm = program(
            "L0001    J       L0001",
        );
        let image = assemble(&asm).unwrap();
        let err = Machine::new(image, "").with_step_limit(100).run().unwrap_err();
        assert_eq!(err, MachineError::StepLimit(100));

        let asm = program(
            "         CLEAR   S
         LDA     #1
         DIVR    S,A",
        );
        assert!(matches!(run(&asm, "").unwrap_err(), MachineError::DivideByZero(_)));
    }
}
