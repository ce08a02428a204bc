//! Configuration for template syntax and rendering
//!
//! Defaults match the classic shot syntax: `%` starts a directive line,
//! `{{` / `}}` wrap inline expressions, and files end in `.shot`. A config
//! can also be loaded from TOML:
//!
//! ```toml
//! [syntax]
//! directive = "%"
//! open = "{{"
//! close = "}}"
//!
//! [template]
//! suffix = ".shot"
//!
//! [render]
//! undefined = "strict"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What happens when an expression names a variable that is not bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedBehavior {
    /// Fail the render with an evaluation error
    #[default]
    Strict,
    /// Treat the name as `nil`, which renders as the empty string
    Lenient,
}

/// Markup recognised in template text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    /// Sigil that starts a directive line (after optional whitespace)
    pub directive: char,
    /// Opening delimiter of an inline marker
    pub open: String,
    /// Closing delimiter of an inline marker
    pub close: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            directive: '%',
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

/// Configuration for loading and rendering templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub syntax: Syntax,
    /// Inputs ending with this suffix are read from disk instead of used literally
    pub suffix: String,
    pub undefined: UndefinedBehavior,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            syntax: Syntax::default(),
            suffix: ".shot".to_string(),
            undefined: UndefinedBehavior::Strict,
        }
    }
}

/// TOML structure for deserializing configs
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    syntax: Option<TomlSyntax>,
    template: Option<TomlTemplate>,
    render: Option<TomlRender>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSyntax {
    directive: Option<String>,
    open: Option<String>,
    close: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTemplate {
    suffix: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRender {
    undefined: Option<UndefinedBehavior>,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Config::default();

        if let Some(syntax) = parsed.syntax {
            if let Some(directive) = syntax.directive {
                let mut chars = directive.chars();
                config.syntax.directive = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "directive sigil must be a single character, got {:?}",
                            directive
                        )))
                    }
                };
            }
            if let Some(open) = syntax.open {
                config.syntax.open = open;
            }
            if let Some(close) = syntax.close {
                config.syntax.close = close;
            }
        }
        if let Some(template) = parsed.template {
            if let Some(suffix) = template.suffix {
                config.suffix = suffix;
            }
        }
        if let Some(render) = parsed.render {
            if let Some(undefined) = render.undefined {
                config.undefined = undefined;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the syntax can be matched unambiguously
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.syntax.open.is_empty() || self.syntax.close.is_empty() {
            return Err(ConfigError::Invalid(
                "marker delimiters must not be empty".to_string(),
            ));
        }
        if self.syntax.directive.is_whitespace() {
            return Err(ConfigError::Invalid(
                "directive sigil must not be whitespace".to_string(),
            ));
        }
        if self.syntax.open.starts_with(self.syntax.directive) {
            return Err(ConfigError::Invalid(format!(
                "directive sigil {:?} must differ from the first character of the open marker {:?}",
                self.syntax.directive, self.syntax.open
            )));
        }
        if self.suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "template suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the directive sigil
    pub fn with_directive(mut self, sigil: char) -> Self {
        self.syntax.directive = sigil;
        self
    }

    /// Set the inline marker delimiters
    pub fn with_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.syntax.open = open.into();
        self.syntax.close = close.into();
        self
    }

    /// Set the suffix that identifies template files
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set how undefined variables are treated
    pub fn with_undefined(mut self, undefined: UndefinedBehavior) -> Self {
        self.undefined = undefined;
        self
    }
}
