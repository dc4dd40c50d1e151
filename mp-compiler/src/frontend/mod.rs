//! Token source: the `logos` scanner and the lookahead stream the driver pulls from.

pub mod lexer;
pub mod token_stream;

pub use lexer::{LexicalError, LexicalErrorKind, TokenKind};
pub use token_stream::{Payload, Token, TokenStream};
