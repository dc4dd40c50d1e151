//! Typed instructions and the text form of one assembly line.
//!
//! The emitter builds `Line`s and prints them with `Display`; the simulator's
//! assembler reads the same text back with `Line::parse`, so the two always
//! agree on the syntax.

use super::abi::Register;
use std::fmt;

// ============================================================================
// Displacement (address operand)
// ============================================================================

/// An address or constant in a memory operand.
///
/// Can be a numeric constant (`0`, `-32768`) or a symbolic label (`_x`,
/// `L0003`, `WRINT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disp {
    Num(i64),
    Label(String),
}

impl Disp {
    fn parse(text: &str) -> Result<Self, String> {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Disp::Num(n));
        }
        let valid = text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Disp::Label(text.to_string()))
        } else {
            Err(format!("invalid address '{text}'"))
        }
    }
}

impl fmt::Display for Disp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disp::Num(n) => write!(f, "{n}"),
            Disp::Label(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Disp {
    fn from(label: &str) -> Self {
        Disp::Label(label.to_string())
    }
}

impl From<String> for Disp {
    fn from(label: String) -> Self {
        Disp::Label(label)
    }
}

impl From<i64> for Disp {
    fn from(n: i64) -> Self {
        Disp::Num(n)
    }
}

impl From<i32> for Disp {
    fn from(n: i32) -> Self {
        Disp::Num(n as i64)
    }
}

// ============================================================================
// Opcodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ── Memory format ───────────────────────────────────────────────────
    Lda,
    Lds,
    Ldt,
    Ldx,
    Ldl,
    Sta,
    Sts,
    Stt,
    Stx,
    Stl,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Comp,
    J,
    Jeq,
    Jgt,
    Jlt,
    Jsub,

    // ── Register format ─────────────────────────────────────────────────
    Addr,
    Subr,
    Mulr,
    Divr,
    Andr,
    Orr,
    Compr,
    Rmo,
    Clear,
    Push,
    Pop,
    Rsub,

    // ── Directives ──────────────────────────────────────────────────────
    Start,
    End,
    Extref,
    Resw,
    Word,
    Byte,
}

/// Operand shape an opcode takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Memory,
    RegisterPair,
    Register,
    NoOperand,
    /// `START n`, `RESW n`, `WORD n`
    Number,
    /// `END label`
    Label,
    /// `EXTREF a,b,...`
    LabelList,
    /// `BYTE C'text'`
    Chars,
}

impl Opcode {
    const ALL: [Opcode; 40] = [
        Opcode::Lda,
        Opcode::Lds,
        Opcode::Ldt,
        Opcode::Ldx,
        Opcode::Ldl,
        Opcode::Sta,
        Opcode::Sts,
        Opcode::Stt,
        Opcode::Stx,
        Opcode::Stl,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::And,
        Opcode::Or,
        Opcode::Comp,
        Opcode::J,
        Opcode::Jeq,
        Opcode::Jgt,
        Opcode::Jlt,
        Opcode::Jsub,
        Opcode::Addr,
        Opcode::Subr,
        Opcode::Mulr,
        Opcode::Divr,
        Opcode::Andr,
        Opcode::Orr,
        Opcode::Compr,
        Opcode::Rmo,
        Opcode::Clear,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Rsub,
        Opcode::Start,
        Opcode::End,
        Opcode::Extref,
        Opcode::Resw,
        Opcode::Word,
        Opcode::Byte,
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Lda => "LDA",
            Opcode::Lds => "LDS",
            Opcode::Ldt => "LDT",
            Opcode::Ldx => "LDX",
            Opcode::Ldl => "LDL",
            Opcode::Sta => "STA",
            Opcode::Sts => "STS",
            Opcode::Stt => "STT",
            Opcode::Stx => "STX",
            Opcode::Stl => "STL",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Comp => "COMP",
            Opcode::J => "J",
            Opcode::Jeq => "JEQ",
            Opcode::Jgt => "JGT",
            Opcode::Jlt => "JLT",
            Opcode::Jsub => "JSUB",
            Opcode::Addr => "ADDR",
            Opcode::Subr => "SUBR",
            Opcode::Mulr => "MULR",
            Opcode::Divr => "DIVR",
            Opcode::Andr => "ANDR",
            Opcode::Orr => "ORR",
            Opcode::Compr => "COMPR",
            Opcode::Rmo => "RMO",
            Opcode::Clear => "CLEAR",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Rsub => "RSUB",
            Opcode::Start => "START",
            Opcode::End => "END",
            Opcode::Extref => "EXTREF",
            Opcode::Resw => "RESW",
            Opcode::Word => "WORD",
            Opcode::Byte => "BYTE",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    pub fn format(&self) -> Format {
        match self {
            Opcode::Addr
            | Opcode::Subr
            | Opcode::Mulr
            | Opcode::Divr
            | Opcode::Andr
            | Opcode::Orr
            | Opcode::Compr
            | Opcode::Rmo => Format::RegisterPair,
            Opcode::Clear | Opcode::Push | Opcode::Pop => Format::Register,
            Opcode::Rsub => Format::NoOperand,
            Opcode::Start | Opcode::Resw | Opcode::Word => Format::Number,
            Opcode::End => Format::Label,
            Opcode::Extref => Format::LabelList,
            Opcode::Byte => Format::Chars,
            _ => Format::Memory,
        }
    }

    pub fn is_directive(&self) -> bool {
        matches!(
            self,
            Opcode::Start | Opcode::End | Opcode::Extref | Opcode::Resw | Opcode::Word | Opcode::Byte
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ============================================================================
// Operands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    /// `label` or `n`
    Direct(Disp),
    /// `label,X`
    Indexed(Disp),
    /// `#label` (its address) or `#n`
    Immediate(Disp),
    /// `@label`: the word at `label` holds the address.
    Indirect(Disp),
    /// `@label,X`
    IndirectIndexed(Disp),
    Register(Register),
    /// `r1,r2`
    RegisterPair(Register, Register),
    Labels(Vec<String>),
    Chars(String),
}

impl Operand {
    pub fn direct(disp: impl Into<Disp>) -> Self {
        Operand::Direct(disp.into())
    }

    pub fn indexed(disp: impl Into<Disp>) -> Self {
        Operand::Indexed(disp.into())
    }

    pub fn immediate(disp: impl Into<Disp>) -> Self {
        Operand::Immediate(disp.into())
    }

    pub fn indirect(disp: impl Into<Disp>) -> Self {
        Operand::Indirect(disp.into())
    }

    pub fn indirect_indexed(disp: impl Into<Disp>) -> Self {
        Operand::IndirectIndexed(disp.into())
    }

    pub fn pair(r1: Register, r2: Register) -> Self {
        Operand::RegisterPair(r1, r2)
    }

    /// Parse the operand field of an instruction with opcode `op`.
    pub fn parse(op: Opcode, text: &str) -> Result<Self, String> {
        let text = text.trim();
        match op.format() {
            Format::NoOperand => {
                if text.is_empty() {
                    Ok(Operand::None)
                } else {
                    Err(format!("{op} takes no operand"))
                }
            }
            Format::Register => parse_register(text).map(Operand::Register),
            Format::RegisterPair => {
                let (r1, r2) = text
                    .split_once(',')
                    .ok_or_else(|| format!("{op} needs two registers"))?;
                Ok(Operand::RegisterPair(parse_register(r1)?, parse_register(r2)?))
            }
            Format::Number => text
                .parse::<i64>()
                .map(|n| Operand::Direct(Disp::Num(n)))
                .map_err(|_| format!("{op} needs a number, found '{text}'")),
            Format::Label => {
                if text.is_empty() {
                    Ok(Operand::None)
                } else {
                    Disp::parse(text).map(Operand::Direct)
                }
            }
            Format::LabelList => {
                let labels = text
                    .split(',')
                    .map(|name| match Disp::parse(name.trim())? {
                        Disp::Label(label) => Ok(label),
                        Disp::Num(n) => Err(format!("expected a label, found {n}")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operand::Labels(labels))
            }
            Format::Chars => text
                .strip_prefix("C'")
                .and_then(|rest| rest.strip_suffix('\''))
                .map(|body| Operand::Chars(body.replace("''", "'")))
                .ok_or_else(|| format!("malformed character constant {text}")),
            Format::Memory => parse_memory(text),
        }
    }
}

fn parse_register(text: &str) -> Result<Register, String> {
    Register::from_str(text.trim()).ok_or_else(|| format!("unknown register '{}'", text.trim()))
}

fn parse_memory(text: &str) -> Result<Operand, String> {
    if text.is_empty() {
        return Err("missing address".to_string());
    }
    if let Some(rest) = text.strip_prefix('#') {
        return Disp::parse(rest).map(Operand::Immediate);
    }
    let (indirect, rest) = match text.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (addr, indexed) = match rest.split_once(',') {
        Some((addr, "X")) => (addr, true),
        Some((_, other)) => return Err(format!("only X can index, found '{other}'")),
        None => (rest, false),
    };
    let disp = Disp::parse(addr)?;
    Ok(match (indirect, indexed) {
        (false, false) => Operand::Direct(disp),
        (false, true) => Operand::Indexed(disp),
        (true, false) => Operand::Indirect(disp),
        (true, true) => Operand::IndirectIndexed(disp),
    })
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Direct(d) => write!(f, "{d}"),
            Operand::Indexed(d) => write!(f, "{d},X"),
            Operand::Immediate(d) => write!(f, "#{d}"),
            Operand::Indirect(d) => write!(f, "@{d}"),
            Operand::IndirectIndexed(d) => write!(f, "@{d},X"),
            Operand::Register(r) => write!(f, "{r}"),
            Operand::RegisterPair(r1, r2) => write!(f, "{r1},{r2}"),
            Operand::Labels(labels) => write!(f, "{}", labels.join(",")),
            Operand::Chars(text) => write!(f, "C'{}'", text.replace('\'', "''")),
        }
    }
}

// ============================================================================
// Assembly lines
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub operand: Operand,
}

impl Instr {
    pub fn new(op: Opcode, operand: Operand) -> Self {
        Self { op, operand }
    }
}

/// One line of assembly: an optional label and an optional instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub label: Option<String>,
    pub instr: Option<Instr>,
}

impl Line {
    pub fn label_only(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            instr: None,
        }
    }

    /// Parse one line of assembly text. Blank lines and `.` comment lines
    /// yield `None`. A line that does not start with whitespace begins with
    /// a label.
    pub fn parse(text: &str) -> Result<Option<Line>, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('.') {
            return Ok(None);
        }
        let starts_with_label = !text.starts_with(char::is_whitespace);
        let (label, rest) = if starts_with_label {
            match trimmed.split_once(char::is_whitespace) {
                Some((label, rest)) => (Some(label.to_string()), rest.trim_start()),
                None => (Some(trimmed.to_string()), ""),
            }
        } else {
            (None, trimmed)
        };
        if let Some(label) = &label {
            if !matches!(Disp::parse(label), Ok(Disp::Label(_))) {
                return Err(format!("invalid label '{label}'"));
            }
        }
        if rest.is_empty() {
            return Ok(Some(Line { label, instr: None }));
        }
        let (mnemonic, operand) = match rest.split_once(char::is_whitespace) {
            Some((mnemonic, operand)) => (mnemonic, operand),
            None => (rest, ""),
        };
        let op = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| format!("unknown mnemonic '{mnemonic}'"))?;
        let operand = Operand::parse(op, operand)?;
        Ok(Some(Line {
            label,
            instr: Some(Instr { op, operand }),
        }))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label.as_deref().unwrap_or("");
        match &self.instr {
            None => f.write_str(label),
            Some(instr) => {
                let text = format!("{label:<8} {:<7} {}", instr.op.mnemonic(), instr.operand);
                f.write_str(text.trim_end())
            }
        }
    }
}
