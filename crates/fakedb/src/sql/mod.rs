//! The small SQL dialect fake datasets answer.
//!
//! Statements are tokenized by [`lexer`], turned into an AST by [`parser`]
//! and run against a [`crate::Dataset`] by [`eval`].

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{ResultSet, SqlOutput, describe, execute, run};
pub use parser::{Statement, parse};
