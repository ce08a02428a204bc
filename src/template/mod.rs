//! Compiled templates
//!
//! A [`Template`] is built once from literal text or a `.shot` file and can
//! then be rendered any number of times against different locals.
//!
//! # Example
//!
//! ```text
//! <ul>
//! % for item in items
//!   <li>{{ loop.index1 }}. {{ item }}</li>
//! % end
//! </ul>
//! ```
//!
//! Construction never fails on template syntax. Directive and marker errors
//! are kept with the template and returned by every render, so a caller can
//! report them next to the locals that were used.

mod compile;
mod line;
mod source;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::error::ParseError;
use crate::parser::ast::Node;
use crate::renderer::{BlockSlot, Context, Interpreter, Locals};
use crate::RenderError;

pub use line::{Line, LineMatcher, Piece};
pub use source::{TemplateSource, INLINE_NAME};

/// Errors that can occur while loading a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template file not found
    #[error("template file not found: {path}")]
    NotFound { path: PathBuf },

    /// Error reading template file
    #[error("error reading template file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax settings that cannot be used
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Marker delimiters that do not form a usable pattern
    #[error("invalid template syntax pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A loaded template, ready to render
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    source: String,
    config: Config,
    program: Result<Vec<Node>, Vec<ParseError>>,
}

impl Template {
    /// Load a template with the default configuration
    ///
    /// `input` ending in `.shot` is read from disk, anything else is the
    /// template text itself.
    pub fn new(input: &str) -> Result<Self, TemplateError> {
        Self::with_config(input, &Config::default())
    }

    /// Load a template, detecting files by the configured suffix
    pub fn with_config(input: &str, config: &Config) -> Result<Self, TemplateError> {
        Self::from_source(TemplateSource::detect(input, &config.suffix), config)
    }

    pub fn from_literal(text: impl Into<String>) -> Result<Self, TemplateError> {
        Self::from_literal_with_config(text, &Config::default())
    }

    pub fn from_literal_with_config(
        text: impl Into<String>,
        config: &Config,
    ) -> Result<Self, TemplateError> {
        Self::from_source(TemplateSource::Literal(text.into()), config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        Self::from_file_with_config(path, &Config::default())
    }

    pub fn from_file_with_config(
        path: impl AsRef<Path>,
        config: &Config,
    ) -> Result<Self, TemplateError> {
        Self::from_source(TemplateSource::File(path.as_ref().to_path_buf()), config)
    }

    /// Load and compile from an explicit source
    pub fn from_source(source: TemplateSource, config: &Config) -> Result<Self, TemplateError> {
        config.validate()?;
        let matcher = LineMatcher::new(&config.syntax)?;
        let name = source.name();
        let text = source.load()?;

        let program = compile::compile(&text, &matcher);
        match &program {
            Ok(nodes) => log::debug!("compiled template {} ({} top-level nodes)", name, nodes.len()),
            Err(errors) => log::debug!("template {} has {} error(s)", name, errors.len()),
        }

        Ok(Self {
            name,
            source: text,
            config: config.clone(),
            program,
        })
    }

    /// File path, or `<inline>` for literal templates
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Template lines, split exactly on `\n`
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.source.split('\n')
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Errors found while compiling; empty when the template is well-formed
    pub fn errors(&self) -> &[ParseError] {
        match &self.program {
            Ok(_) => &[],
            Err(errors) => errors,
        }
    }

    /// Render without a trailing block
    pub fn render(&self, locals: &Locals) -> Result<String, RenderError> {
        self.render_block(locals, None)
    }

    /// Render with a trailing block for `yield`
    ///
    /// The block runs at most once, the first time `yield` is evaluated.
    pub fn render_with_block<'b, F>(&self, locals: &Locals, block: F) -> Result<String, RenderError>
    where
        F: FnOnce() -> String + 'b,
    {
        self.render_block(locals, Some(Box::new(block)))
    }

    fn render_block<'b>(
        &self,
        locals: &Locals,
        block: Option<Box<dyn FnOnce() -> String + 'b>>,
    ) -> Result<String, RenderError> {
        let nodes = self
            .program
            .as_ref()
            .map_err(|errors| RenderError::Parse(errors.clone()))?;

        log::debug!("rendering {} with {} local(s)", self.name, locals.len());
        let ctx = Context::new(locals, self.config.undefined);
        let lines = Interpreter::new(ctx, BlockSlot::new(block)).run(nodes)?;
        Ok(lines.join("\n"))
    }

    /// Source-annotated report for an error from this template
    pub fn format_error(&self, err: &RenderError) -> String {
        err.format(&self.source, &self.name)
    }
}
