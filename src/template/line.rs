//! Line classification: directive lines vs output lines with inline markers

use regex::Regex;

use crate::config::Syntax;

/// A piece of an output line before its markers are parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'s> {
    Text(&'s str),
    /// Code between the marker delimiters, untrimmed; `offset` is its byte
    /// position in the template
    Marker { code: &'s str, offset: usize },
}

/// A classified template line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'s> {
    /// Code after the sigil with trailing whitespace removed
    Directive { code: &'s str, offset: usize },
    Output(Vec<Piece<'s>>),
}

/// Regexes compiled from a `Syntax`
#[derive(Debug, Clone)]
pub struct LineMatcher {
    directive: Regex,
    marker: Regex,
}

impl LineMatcher {
    pub fn new(syntax: &Syntax) -> Result<Self, regex::Error> {
        let sigil = regex::escape(&syntax.directive.to_string());
        let directive = Regex::new(&format!(r"^\s*{}(.*?)\s*$", sigil))?;
        // Non-greedy: a marker ends at the first closing delimiter
        let marker = Regex::new(&format!(
            r"{}(.*?){}",
            regex::escape(&syntax.open),
            regex::escape(&syntax.close)
        ))?;
        Ok(Self { directive, marker })
    }

    /// Classify one line; `offset` is the byte position of the line in the template
    pub fn classify<'s>(&self, line: &'s str, offset: usize) -> Line<'s> {
        if let Some(code) = self.directive.captures(line).and_then(|caps| caps.get(1)) {
            return Line::Directive {
                code: code.as_str(),
                offset: offset + code.start(),
            };
        }

        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in self.marker.captures_iter(line) {
            if let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) {
                if whole.start() > last {
                    pieces.push(Piece::Text(&line[last..whole.start()]));
                }
                pieces.push(Piece::Marker {
                    code: code.as_str(),
                    offset: offset + code.start(),
                });
                last = whole.end();
            }
        }
        if last < line.len() || pieces.is_empty() {
            pieces.push(Piece::Text(&line[last..]));
        }
        Line::Output(pieces)
    }
}
