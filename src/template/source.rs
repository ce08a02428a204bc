//! Where template text comes from

use std::path::{Path, PathBuf};

use super::TemplateError;

/// Name used in error reports for templates given as literal text
pub const INLINE_NAME: &str = "<inline>";

/// Template text given directly, or a path to read it from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Literal(String),
    File(PathBuf),
}

impl TemplateSource {
    /// Inputs ending with `suffix` are paths; anything else is template text
    pub fn detect(input: &str, suffix: &str) -> Self {
        if input.ends_with(suffix) {
            TemplateSource::File(PathBuf::from(input))
        } else {
            TemplateSource::Literal(input.to_string())
        }
    }

    pub fn name(&self) -> String {
        match self {
            TemplateSource::Literal(_) => INLINE_NAME.to_string(),
            TemplateSource::File(path) => path.display().to_string(),
        }
    }

    /// Read the template text
    pub fn load(&self) -> Result<String, TemplateError> {
        match self {
            TemplateSource::Literal(text) => Ok(text.clone()),
            TemplateSource::File(path) => read_file(path),
        }
    }
}

fn read_file(path: &Path) -> Result<String, TemplateError> {
    if !path.exists() {
        return Err(TemplateError::NotFound {
            path: path.to_path_buf(),
        });
    }
    log::debug!("reading template file {}", path.display());
    std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })
}
