//! Token source consumed by the driver: one token at a time, with line numbers
//! and decoded payloads, and a post-error mode that only yields end-of-input.

use super::lexer::{
    classify_failure, literal_text, LexicalError, LexicalErrorKind, LineIndex, TokenKind,
    MAX_LITERAL_LEN, MAX_NAME_LEN, MAX_NUMBER,
};
use logos::{Lexer, Logos};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Name(String),
    Number(i64),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub payload: Option<Payload>,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self {
            kind,
            line,
            payload: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<i64> {
        match self.payload {
            Some(Payload::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::Literal(text)) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(Payload::Name(name)) => write!(f, "'{name}'"),
            Some(Payload::Number(n)) => write!(f, "{n}"),
            Some(Payload::Literal(text)) => write!(f, "'{}'", text.replace('\'', "''")),
            None => write!(f, "{}", self.kind),
        }
    }
}

pub struct TokenStream<'src> {
    source: &'src str,
    lexer: Lexer<'src, TokenKind>,
    lines: LineIndex,
    /// Line reported for end-of-input: the line of the last non-blank character.
    eof_line: usize,
    line: usize,
    finished: bool,
}

impl<'src> TokenStream<'src> {
    pub fn new(source: &'src str) -> Self {
        let lines = LineIndex::new(source);
        let trimmed = source.trim_end().len();
        let eof_line = lines.line_of(trimmed.saturating_sub(1));
        Self {
            source,
            lexer: TokenKind::lexer(source),
            lines,
            eof_line,
            line: 1,
            finished: false,
        }
    }

    /// Line of the most recently produced token.
    pub fn current_line(&self) -> usize {
        self.line
    }

    /// Stop scanning: every later call to `next_token` yields end-of-input.
    pub fn signal_error(&mut self) {
        self.finished = true;
    }

    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        loop {
            if self.finished {
                return Ok(Token::new(TokenKind::Eof, self.eof_line));
            }
            let Some(result) = self.lexer.next() else {
                self.finished = true;
                self.line = self.eof_line;
                continue;
            };
            let span = self.lexer.span();
            self.line = self.lines.line_of(span.start);

            let kind = match result {
                Ok(kind) => kind,
                Err(()) => return Err(self.error(classify_failure(self.source, span.start))),
            };
            let slice = self.lexer.slice();
            let payload = match kind {
                TokenKind::BraceComment | TokenKind::BlockComment => continue,
                TokenKind::Eof => {
                    self.finished = true;
                    None
                }
                TokenKind::Name => {
                    if slice.len() > MAX_NAME_LEN {
                        return Err(self.error(LexicalErrorKind::TokenTooLong(slice.to_string())));
                    }
                    Some(Payload::Name(slice.to_string()))
                }
                TokenKind::Number => match slice.parse::<i64>() {
                    Ok(n) if n <= MAX_NUMBER => Some(Payload::Number(n)),
                    _ => {
                        return Err(
                            self.error(LexicalErrorKind::NumberOutOfRange(slice.to_string()))
                        )
                    }
                },
                TokenKind::MalformedNumber => {
                    return Err(self.error(LexicalErrorKind::MalformedNumber(slice.to_string())))
                }
                TokenKind::Literal => {
                    let text = literal_text(slice);
                    if text.chars().count() > MAX_LITERAL_LEN {
                        return Err(self.error(LexicalErrorKind::TokenTooLong(text)));
                    }
                    Some(Payload::Literal(text))
                }
                _ => None,
            };
            return Ok(Token {
                kind,
                line: self.line,
                payload,
            });
        }
    }

    fn error(&mut self, kind: LexicalErrorKind) -> LexicalError {
        self.finished = true;
        LexicalError {
            line: self.line,
            kind,
        }
    }
}
