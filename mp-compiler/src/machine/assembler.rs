use super::{MachineError, ROUTINE_BASE};
use crate::backend::{Disp, Line, Opcode, Operand, Register, RuntimeRoutine};
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Immediate,
    Direct,
    Indexed,
    Indirect,
    IndirectIndexed,
}

/// Operand with every label replaced by its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    None,
    Memory { mode: Mode, value: i32 },
    Register(Register),
    Pair(Register, Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub op: Opcode,
    pub arg: Arg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Word(i32),
    Instr(Decoded),
}

/// Loaded program: one cell per word, plus the symbol table for inspection.
#[derive(Debug, Clone)]
pub struct Image {
    pub memory: Vec<Cell>,
    pub entry: usize,
    pub symbols: HashMap<String, i32>,
}

impl Image {
    /// Address of `label`, for tests and debugging.
    pub fn address_of(&self, label: &str) -> Option<i32> {
        self.symbols.get(label).copied()
    }
}

/// Words a line occupies.
fn size_of(line: &Line) -> usize {
    let Some(instr) = &line.instr else {
        return 0;
    };
    match (&instr.op, &instr.operand) {
        (Opcode::Resw, Operand::Direct(Disp::Num(n))) => (*n).max(0) as usize,
        (Opcode::Byte, Operand::Chars(text)) => text.chars().count(),
        (Opcode::Start | Opcode::End | Opcode::Extref, _) => 0,
        _ => 1,
    }
}

/// Two passes: assign addresses to labels, then build the memory image.
pub fn assemble(source: &str) -> Result<Image, MachineError> {
    let mut lines = Vec::new();
    for (i, text) in source.lines().enumerate() {
        let number = i + 1;
        match Line::parse(text) {
            Ok(Some(line)) => lines.push((number, line)),
            Ok(None) => {}
            Err(message) => return Err(MachineError::Syntax { line: number, message }),
        }
    }

    // Pass 1: labels
    let mut symbols: HashMap<String, i32> = HashMap::new();
    let mut location = 0usize;
    let mut entry = None;
    for (number, line) in &lines {
        if let Some(label) = &line.label {
            if symbols.insert(label.clone(), location as i32).is_some() {
                return Err(MachineError::DuplicateLabel {
                    line: *number,
                    label: label.clone(),
                });
            }
        }
        if let Some(instr) = &line.instr {
            match (&instr.op, &instr.operand) {
                (Opcode::Start, _) if entry.is_none() => entry = Some(location),
                (Opcode::Extref, Operand::Labels(names)) => {
                    for name in names {
                        let routine = RuntimeRoutine::ALL
                            .iter()
                            .position(|r| r.name() == name.as_str())
                            .ok_or_else(|| MachineError::UnknownRoutine {
                                line: *number,
                                name: name.clone(),
                            })?;
                        symbols.insert(name.clone(), ROUTINE_BASE + routine as i32);
                    }
                }
                _ => {}
            }
        }
        location += size_of(line);
    }

    // Pass 2: cells
    let mut memory = Vec::with_capacity(location);
    for (number, line) in &lines {
        let Some(instr) = &line.instr else {
            continue;
        };
        let resolve = |disp: &Disp| -> Result<i32, MachineError> {
            match disp {
                Disp::Num(n) => Ok(*n as i32),
                Disp::Label(label) => {
                    symbols
                        .get(label)
                        .copied()
                        .ok_or_else(|| MachineError::UndefinedLabel {
                            line: *number,
                            label: label.clone(),
                        })
                }
            }
        };
        match (&instr.op, &instr.operand) {
            (Opcode::Start | Opcode::End | Opcode::Extref, _) => {}
            (Opcode::Resw, _) => memory.extend(std::iter::repeat(Cell::Word(0)).take(size_of(line))),
            (Opcode::Word, Operand::Direct(disp)) => memory.push(Cell::Word(resolve(disp)?)),
            (Opcode::Byte, Operand::Chars(text)) => {
                memory.extend(text.chars().map(|c| Cell::Word(c as i32)));
            }
            (op, operand) => {
                let arg = match operand {
                    Operand::None => Arg::None,
                    Operand::Direct(d) => Arg::Memory { mode: Mode::Direct, value: resolve(d)? },
                    Operand::Indexed(d) => Arg::Memory { mode: Mode::Indexed, value: resolve(d)? },
                    Operand::Immediate(d) => Arg::Memory { mode: Mode::Immediate, value: resolve(d)? },
                    Operand::Indirect(d) => Arg::Memory { mode: Mode::Indirect, value: resolve(d)? },
                    Operand::IndirectIndexed(d) => Arg::Memory {
                        mode: Mode::IndirectIndexed,
                        value: resolve(d)?,
                    },
                    Operand::Register(r) => Arg::Register(*r),
                    Operand::RegisterPair(r1, r2) => Arg::Pair(*r1, *r2),
                    Operand::Labels(_) | Operand::Chars(_) => {
                        return Err(MachineError::Syntax {
                            line: *number,
                            message: format!("{op} cannot take operand {operand}"),
                        })
                    }
                };
                memory.push(Cell::Instr(Decoded { op: *op, arg }));
            }
        }
    }

    debug!("assembled {} word(s), {} symbol(s)", memory.len(), symbols.len());
    Ok(Image {
        memory,
        entry: entry.unwrap_or(0),
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "\
demo     START   0
         EXTREF  WRINT,WRLN
         PUSH    L
         J       L0001
_a       RESW    3
L0002    BYTE    C'ok'
L0001    LDA     _a,X
         POP     L
         RSUB
         END     demo
";

    #[test]
    fn labels_get_word_addresses() {
        let image = assemble(PROGRAM).unwrap();
        assert_eq!(image.entry, 0);
        assert_eq!(image.address_of("demo"), Some(0));
        assert_eq!(image.address_of("_a"), Some(2));
        assert_eq!(image.address_of("L0002"), Some(5));
        assert_eq!(image.address_of("L0001"), Some(7));
        assert_eq!(image.address_of("WRLN"), Some(ROUTINE_BASE + 11));
        assert_eq!(image.memory.len(), 10);
        assert_eq!(image.memory[5], Cell::Word('o' as i32));
    }

    #[test]
    fn operands_are_resolved() {
        let image = assemble(PROGRAM).unwrap();
        assert_eq!(
            image.memory[1],
            Cell::Instr(Decoded {
                op: Opcode::J,
                arg: Arg::Memory { mode: Mode::Direct, value: 7 },
            })
        );
        assert_eq!(
            image.memory[7],
            Cell::Instr(Decoded {
                op: Opcode::Lda,
                arg: Arg::Memory { mode: Mode::Indexed, value: 2 },
            })
        );
    }

    #[test]
    fn undefined_and_duplicate_labels_fail() {
        let err = assemble("         J       nowhere\n").unwrap_err();
        assert_eq!(
            err,
            MachineError::UndefinedLabel {
                line: 1,
                label: "nowhere".into()
            }
        );
        let err = assemble("x        RESW    1\nx        RESW    1\n").unwrap_err();
        assert!(matches!(err, MachineError::DuplicateLabel { line: 2, .. }));
    }

    #[test]
    fn unknown_routines_fail() {
        let err = assemble("         EXTREF  PRINTF\n").unwrap_err();
        assert!(matches!(err, MachineError::UnknownRoutine { .. }));
    }
}
