//! Abstract Syntax Tree
//!
//! Script -> statements (and-or lists) -> pipelines -> commands -> words.
//! Words keep their parts (literals, quotes, expansions) so the
//! interpreter can expand them with the right quoting rules.

pub mod types;
