//! shot - a line-oriented template renderer
//!
//! Lines starting with `%` are directives (`if`, `elsif`, `unless`, `else`,
//! `for`, `yield`, `end`, or a `#` comment). Every other line is output, with
//! `{{ expr }}` markers replaced by the value of the expression.
//!
//! # Example
//!
//! ```rust
//! use shot::{render, Locals, Value};
//!
//! let template = "\
//! Hello, {{ name }}!
//! % for item in items
//! - {{ item }}
//! % end";
//!
//! let locals = Locals::new()
//!     .with("name", "world")
//!     .with("items", vec![Value::from("a"), Value::from("b")]);
//!
//! assert_eq!(render(template, &locals).unwrap(), "Hello, world!\n- a\n- b");
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod renderer;
pub mod template;

pub use config::{Config, ConfigError, Syntax, UndefinedBehavior};
pub use error::{ParseError, Span};
pub use renderer::{EvalError, Locals, Value};
pub use template::{Template, TemplateError, TemplateSource};

use thiserror::Error;

/// Errors that can occur while rendering a template
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template could not be loaded
    #[error("{0}")]
    Load(#[from] TemplateError),

    /// Directive, marker or block structure errors
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// An expression failed while rendering
    #[error("render error: {0}")]
    Eval(EvalError),

    /// `yield` was reached but the caller supplied no block
    #[error("template called `yield` but no block was given")]
    MissingBlock { span: Span },
}

impl From<Vec<ParseError>> for RenderError {
    fn from(errors: Vec<ParseError>) -> Self {
        RenderError::Parse(errors)
    }
}

impl From<EvalError> for RenderError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::MissingBlock { span } => RenderError::MissingBlock { span },
            other => RenderError::Eval(other),
        }
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RenderError {
    /// Location in the template source, when the error has one
    pub fn span(&self) -> Option<&Span> {
        match self {
            RenderError::Load(_) => None,
            RenderError::Parse(errors) => errors.first().map(|e| e.span()),
            RenderError::Eval(err) => Some(err.span()),
            RenderError::MissingBlock { span } => Some(span),
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            RenderError::Load(err) => format!("{}: {}", filename, err),
            RenderError::Parse(errors) => errors
                .iter()
                .map(|e| e.format(source, filename))
                .collect::<Vec<_>>()
                .join("\n"),
            RenderError::Eval(err) => {
                let message = err.to_string();
                let label = match err.suggestions() {
                    Some(names) if !names.is_empty() => {
                        format!("{}\nDid you mean: {}?", message, names.join(", "))
                    }
                    _ => message.clone(),
                };
                error::report(source, filename, err.span(), &message, &label)
            }
            RenderError::MissingBlock { span } => error::report(
                source,
                filename,
                span,
                &self.to_string(),
                "`yield` needs a block",
            ),
        }
    }
}

/// Render a template with the default configuration
///
/// `template` is read from disk when it ends in `.shot`, otherwise it is the
/// template text.
pub fn render(template: &str, locals: &Locals) -> Result<String, RenderError> {
    render_with_config(template, locals, &Config::default())
}

/// Render a template with custom syntax or undefined-name handling
///
/// # Example
///
/// ```rust
/// use shot::{render_with_config, Config, Locals, UndefinedBehavior};
///
/// let config = Config::new().with_undefined(UndefinedBehavior::Lenient);
/// let out = render_with_config("[{{ missing }}]", &Locals::new(), &config).unwrap();
/// assert_eq!(out, "[]");
/// ```
pub fn render_with_config(
    template: &str,
    locals: &Locals,
    config: &Config,
) -> Result<String, RenderError> {
    Template::with_config(template, config)?.render(locals)
}
