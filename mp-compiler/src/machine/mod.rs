//! Simulator for the target machine, used to run compiled programs.
//!
//! Module layout:
//! - `assembler` — two-pass assembler from emitted text to a memory image
//! - `cpu`       — interpreter loop and the native runtime-support routines

pub mod assembler;
pub mod cpu;

pub use assembler::{assemble, Image};
pub use cpu::{Machine, Outcome, Registers, RuntimeError, Status};

use thiserror::Error;

/// Address the loader leaves in L: returning to it halts the machine.
pub const LOADER_RETURN: i32 = -1;
/// Runtime-support routine `i` lives at `ROUTINE_BASE + i`, outside memory.
pub const ROUTINE_BASE: i32 = 1 << 24;
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;
pub const DEFAULT_STACK_LIMIT: usize = 65_536;

/// A fault of the machine itself, as opposed to a runtime error the
/// compiled program detects and reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: label '{label}' is already defined")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: unknown runtime routine '{name}'")]
    UnknownRoutine { line: usize, name: String },

    #[error("address {0} is outside memory")]
    BadAddress(i64),

    #[error("address {0} does not hold an instruction")]
    NotAnInstruction(i64),

    #[error("address {0} holds an instruction, not data")]
    NotData(i64),

    #[error("invalid operand for {op} at address {pc}")]
    BadOperand { op: String, pc: i64 },

    #[error("operand stack overflow")]
    StackOverflow,

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("division by zero at address {0}")]
    DivideByZero(i64),

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("input exhausted")]
    InputExhausted,

    #[error("malformed integer input '{0}'")]
    BadInput(String),
}

/// Assemble `asm` and run it with `input` as standard input.
pub fn run(asm: &str, input: &str) -> Result<Outcome, MachineError> {
    let image = assemble(asm)?;
    Machine::new(image, input).run()
}
