//! Code generation for the accumulator/stack target machine.
//!
//! Module layout:
//! - `abi`         — registers, runtime-support routines, integer range
//! - `instruction` — typed instructions and the text form of an assembly line
//! - `emitter`     — append-only assembly writer used by the driver

pub mod abi;
pub mod emitter;
pub mod instruction;

pub use abi::{Register, RuntimeRoutine, INT_MAX, INT_MIN};
pub use emitter::{storage_label, ArithOp, Emitter, Frame, Label, Relation};
pub use instruction::{Disp, Instr, Line, Opcode, Operand};
