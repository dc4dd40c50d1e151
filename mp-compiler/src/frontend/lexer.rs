use logos::{Lexer, Logos};
use std::fmt;
use thiserror::Error;

/// Longest identifier the scanner accepts.
pub const MAX_NAME_LEN: usize = 32;
/// Longest string literal the scanner accepts.
pub const MAX_LITERAL_LEN: usize = 255;
/// Largest unsigned integer literal (the language's integers are 16-bit).
pub const MAX_NUMBER: i64 = 32767;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")] // Whitespace
#[logos(skip r"//[^\n]*")] // C++-style line comments
pub enum TokenKind {
    // --- Keywords ---
    #[token("program")]
    Program,
    #[token("var")]
    Var,
    #[token("array")]
    Array,
    #[token("of")]
    Of,
    #[token("procedure")]
    Procedure,
    #[token("begin")]
    Begin,
    #[token("end")]
    End,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("call")]
    Call,
    #[token("return")]
    Return,
    #[token("read")]
    Read,
    #[token("readln")]
    Readln,
    #[token("write")]
    Write,
    #[token("writeln")]
    Writeln,

    // standard types
    #[token("integer")]
    Integer,
    #[token("boolean")]
    Boolean,
    #[token("char")]
    Char,

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("not")]
    Not,
    #[token("div")]
    Div,
    #[token("mod")]
    Mod,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    // --- Identifiers and literals ---
    #[regex(r"[A-Za-z][A-Za-z0-9]*")]
    Name,
    #[regex(r"[0-9]+")]
    Number,
    /// Digits running straight into letters, e.g. `12ab`.
    #[regex(r"[0-9]+[A-Za-z][A-Za-z0-9]*")]
    MalformedNumber,
    #[token("'", string_literal)]
    Literal,

    // comments that may span lines; the token stream drops them
    #[token("{", brace_comment)]
    BraceComment,
    #[token("/*", block_comment)]
    BlockComment,

    // --- Operators ---
    #[token(":=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("=")]
    Eq,
    #[token("<>")]
    Neq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // --- Punctuation ---
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Period,

    /// A NUL byte terminates the source text. The token stream also reports
    /// this kind once the scanner runs out of input.
    #[token("\0")]
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Program => "'program'",
            TokenKind::Var => "'var'",
            TokenKind::Array => "'array'",
            TokenKind::Of => "'of'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Break => "'break'",
            TokenKind::Call => "'call'",
            TokenKind::Return => "'return'",
            TokenKind::Read => "'read'",
            TokenKind::Readln => "'readln'",
            TokenKind::Write => "'write'",
            TokenKind::Writeln => "'writeln'",
            TokenKind::Integer => "'integer'",
            TokenKind::Boolean => "'boolean'",
            TokenKind::Char => "'char'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Not => "'not'",
            TokenKind::Div => "'div'",
            TokenKind::Mod => "'mod'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Name => "identifier",
            TokenKind::Number => "number",
            TokenKind::MalformedNumber => "malformed number",
            TokenKind::Literal => "string",
            TokenKind::BraceComment | TokenKind::BlockComment => "comment",
            TokenKind::Assign => "':='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Eq => "'='",
            TokenKind::Neq => "'<>'",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Period => "'.'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Scan a `'...'` literal after its opening quote. `''` stands for one quote;
/// the literal must close before the end of the line.
fn string_literal(lex: &mut Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    continue;
                }
                lex.bump(i + 1);
                return true;
            }
            '\n' => {
                lex.bump(i);
                return false;
            }
            _ => {}
        }
    }
    lex.bump(rest.len());
    false
}

fn brace_comment(lex: &mut Lexer<TokenKind>) -> bool {
    match lex.remainder().find('}') {
        Some(end) => {
            lex.bump(end + 1);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

fn block_comment(lex: &mut Lexer<TokenKind>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

/// Decode the body of a literal slice (quotes included) into its text.
pub fn literal_text(slice: &str) -> String {
    slice[1..slice.len() - 1].replace("''", "'")
}

// ============================================================================
// Lexical errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexicalErrorKind {
    InvalidCharacter(char),
    MalformedNumber(String),
    NumberOutOfRange(String),
    UnterminatedString,
    UnterminatedComment,
    TokenTooLong(String),
}

impl fmt::Display for LexicalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexicalErrorKind::InvalidCharacter(c) => write!(f, "unexpected character '{}'", c.escape_default()),
            LexicalErrorKind::MalformedNumber(s) => write!(f, "malformed number '{s}'"),
            LexicalErrorKind::NumberOutOfRange(s) => {
                write!(f, "number '{s}' is larger than {MAX_NUMBER}")
            }
            LexicalErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexicalErrorKind::UnterminatedComment => write!(f, "unterminated comment"),
            LexicalErrorKind::TokenTooLong(s) => {
                let preview: String = s.chars().take(16).collect();
                write!(f, "token '{preview}...' is too long")
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("LexicalError (line {line}) - {kind}")]
pub struct LexicalError {
    pub line: usize,
    pub kind: LexicalErrorKind,
}

/// Classify a scanner failure by the text it started on.
pub fn classify_failure(source: &str, start: usize) -> LexicalErrorKind {
    let rest = &source[start..];
    if rest.starts_with('\'') {
        LexicalErrorKind::UnterminatedString
    } else if rest.starts_with('{') || rest.starts_with("/*") {
        LexicalErrorKind::UnterminatedComment
    } else {
        LexicalErrorKind::InvalidCharacter(rest.chars().next().unwrap_or('\0'))
    }
}

// ============================================================================
// Line lookup
// ============================================================================

/// Byte offsets of every line start, for offset → 1-based line lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }
}
