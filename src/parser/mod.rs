//! Parser module for bash scripts
//!
//! Lexer, word parser, arithmetic parser and the recursive descent
//! command parser.

pub mod types;
pub mod lexer;
pub mod word_parser;
pub mod arithmetic_parser;
pub mod conditional_parser;
pub mod compound_parser;
pub mod parser;

// Re-exports
pub use types::{ParseException, ParseResult};
pub use lexer::{tokenize, Lexer, Token, TokenType};
pub use arithmetic_parser::{parse_arithmetic, ArithSyntaxError};
pub use word_parser::{parse_word, parse_word_in, WordContext};
pub use parser::{parse, parse_array_literal, Parser};
