//! Argus syntax — lexer, AST, and parser for Go source.
//!
//! This crate is the "external parser" of the toolkit: it turns one
//! source file into an arena-allocated AST ([`ast::File`]) and knows
//! nothing about packages, modules, or name resolution. The scanner
//! crate lifts these trees into the semantic entity model.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod literal;
mod parser;
pub mod span;
pub mod token;

pub use error::ParseError;
pub use parser::{parse_file, parse_imports_only, ImportsOnly};
pub use span::{LineIndex, Position, Span};

#[cfg(test)]
mod parser_tests;
