//! Precompiled HTML templates.
//!
//! `{{ name }}` inserts an HTML-escaped value, `{{{ name }}}` inserts it
//! verbatim. Templates are parsed once by the transform and stored in the
//! bundle as a flat list of pieces.

use serde::{Deserialize, Serialize};

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Piece {
    Text(String),
    Escaped(String),
    Raw(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Template {
    pieces: Vec<Piece>,
}

/// Syntax error while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct TemplateError {
    /// 1-based line where the offending tag starts.
    pub line: usize,
    pub message: String,
}

/// A variable the caller could not provide.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown template variable '{0}'")]
pub struct UnknownVariable(pub String);

impl Template {
    /// Parse template source.
    pub fn parse(src: &str) -> Result<Self, TemplateError> {
        let mut pieces = Vec::new();
        let mut rest = src;
        let mut consumed = 0usize;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                pieces.push(Piece::Text(rest[..open].to_string()));
            }
            let line = line_of(src, consumed + open);
            let raw = rest[open..].starts_with("{{{");
            let (open_len, close) = if raw { (3, "}}}") } else { (2, "}}") };

            let inner_start = open + open_len;
            let close_at = rest[inner_start..].find(close).ok_or_else(|| TemplateError {
                line,
                message: format!("unterminated tag, expected '{close}'"),
            })?;

            let name = rest[inner_start..inner_start + close_at].trim();
            if !is_valid_name(name) {
                return Err(TemplateError {
                    line,
                    message: format!("invalid variable name '{name}'"),
                });
            }
            pieces.push(if raw {
                Piece::Raw(name.to_string())
            } else {
                Piece::Escaped(name.to_string())
            });

            let advance = inner_start + close_at + close.len();
            consumed += advance;
            rest = &rest[advance..];
        }

        if !rest.is_empty() {
            pieces.push(Piece::Text(rest.to_string()));
        }
        Ok(Self { pieces })
    }

    /// Names referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Escaped(name) | Piece::Raw(name) => Some(name.as_str()),
            Piece::Text(_) => None,
        })
    }

    /// Render with values from `lookup`.
    pub fn render<F>(&self, lookup: F) -> Result<String, UnknownVariable>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Escaped(name) => {
                    let value = lookup(name).ok_or_else(|| UnknownVariable(name.clone()))?;
                    escape_into(&mut out, &value);
                }
                Piece::Raw(name) => {
                    let value = lookup(name).ok_or_else(|| UnknownVariable(name.clone()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Append `value` with HTML special characters escaped.
pub fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
}

/// HTML-escape `value`.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(&mut out, value);
    out
}
