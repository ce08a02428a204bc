//! Parser for directive code and inline expressions

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::{parse_directive, parse_expression};
