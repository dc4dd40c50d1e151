use std::fmt;

/// Smallest value of the language's 16-bit integers.
pub const INT_MIN: i32 = -32768;
/// Largest value of the language's 16-bit integers.
pub const INT_MAX: i32 = 32767;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Accumulator: always holds the value just computed.
    A,
    X,
    L,
    S,
    T,
}

impl Register {
    pub const LINK: Register = Register::L;
    /// Scratch register; also carries the field width for the write routines.
    pub const SCRATCH: Register = Register::T;

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Register::A),
            "X" => Some(Register::X),
            "L" => Some(Register::L),
            "S" => Some(Register::S),
            "T" => Some(Register::T),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::L => "L",
            Register::S => "S",
            Register::T => "T",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime-support routines. The compiled code imports all of them with
/// `EXTREF`; the simulator implements them natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeRoutine {
    /// Print the runtime error whose code is in A, then stop.
    ErrPrt,
    DivErr,
    OvfErr,
    BndErr,
    RdInt,
    RdChr,
    RdLn,
    /// Write A as an integer, right-justified in a field of T characters.
    WrInt,
    WrChr,
    WrBool,
    /// Write T characters starting at the address in A.
    WrStr,
    WrLn,
}

impl RuntimeRoutine {
    pub const ALL: [RuntimeRoutine; 12] = [
        RuntimeRoutine::ErrPrt,
        RuntimeRoutine::DivErr,
        RuntimeRoutine::OvfErr,
        RuntimeRoutine::BndErr,
        RuntimeRoutine::RdInt,
        RuntimeRoutine::RdChr,
        RuntimeRoutine::RdLn,
        RuntimeRoutine::WrInt,
        RuntimeRoutine::WrChr,
        RuntimeRoutine::WrBool,
        RuntimeRoutine::WrStr,
        RuntimeRoutine::WrLn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RuntimeRoutine::ErrPrt => "ERRPRT",
            RuntimeRoutine::DivErr => "DIVERR",
            RuntimeRoutine::OvfErr => "OVFERR",
            RuntimeRoutine::BndErr => "BNDERR",
            RuntimeRoutine::RdInt => "RDINT",
            RuntimeRoutine::RdChr => "RDCHR",
            RuntimeRoutine::RdLn => "RDLN",
            RuntimeRoutine::WrInt => "WRINT",
            RuntimeRoutine::WrChr => "WRCHR",
            RuntimeRoutine::WrBool => "WRBOOL",
            RuntimeRoutine::WrStr => "WRSTR",
            RuntimeRoutine::WrLn => "WRLN",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|routine| routine.name() == name)
    }
}

impl fmt::Display for RuntimeRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
