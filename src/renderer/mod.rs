//! Renderer for compiled templates
//!
//! This module takes the node tree produced by the template compiler and
//! evaluates it against caller-supplied locals.

pub mod context;
pub mod error;
mod eval;
mod interpreter;
pub mod value;

pub use context::Locals;
pub use error::EvalError;
pub use value::Value;

pub(crate) use context::{BlockSlot, Context};
pub(crate) use interpreter::Interpreter;
