//! Error types for template evaluation

use thiserror::Error;

use crate::parser::ast::Span;

/// Errors that can occur while rendering a compiled template
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Reference to a name with no binding in scope
    #[error("undefined variable '{name}'")]
    UndefinedVariable {
        name: String,
        span: Span,
        suggestions: Vec<String>,
    },

    /// Operand types the operation does not accept
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String, span: Span },

    /// Property that the value does not have
    #[error("{type_name} has no property '{property}'")]
    NoSuchProperty {
        type_name: &'static str,
        property: String,
        span: Span,
    },

    /// `for` over something that is not a list or map
    #[error("cannot iterate over {type_name}")]
    NotIterable { type_name: &'static str, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("integer overflow")]
    Overflow { span: Span },

    /// `yield` without a trailing block
    #[error("template called `yield` but no block was given")]
    MissingBlock { span: Span },
}

impl EvalError {
    /// Create an undefined variable error with suggestions
    pub fn undefined(name: impl Into<String>, span: Span, suggestions: Vec<String>) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            span,
            suggestions,
        }
    }

    /// Create a type mismatch error
    pub fn mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::NoSuchProperty { span, .. }
            | Self::NotIterable { span, .. }
            | Self::DivisionByZero { span }
            | Self::Overflow { span }
            | Self::MissingBlock { span } => span,
        }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UndefinedVariable { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }
}
