//! Minutiae templates (`.xyt` format)
//!
//! One minutia per line: `x y theta [quality]`, whitespace separated, integer
//! fields. Lines starting with `#` are comments; blank lines are ignored.

use serde::Serialize;
use thiserror::Error;

/// Comment marker in `.xyt` files
const COMMENT_MARKER: char = '#';

/// A malformed template line
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct TemplateParseError {
    pub line: usize,
    pub reason: String,
}

/// One ridge ending or bifurcation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Minutia {
    pub x: i32,
    pub y: i32,
    /// Ridge direction in degrees
    pub theta: i32,
    /// Detector reliability, when present
    pub quality: Option<i32>,
}

/// Parsed detector output; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinutiaeTemplate {
    minutiae: Vec<Minutia>,
    /// Original file content, kept so the matcher sees exactly what the
    /// detector wrote
    xyt: String,
}

impl MinutiaeTemplate {
    pub fn parse(xyt: &str) -> Result<Self, TemplateParseError> {
        let mut minutiae = Vec::new();

        for (idx, line) in xyt.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
                continue;
            }
            minutiae.push(parse_record(trimmed, idx + 1)?);
        }

        Ok(Self {
            minutiae,
            xyt: xyt.to_string(),
        })
    }

    pub fn minutiae(&self) -> &[Minutia] {
        &self.minutiae
    }

    pub fn count(&self) -> usize {
        self.minutiae.len()
    }

    /// Raw `.xyt` text as produced by the detector
    pub fn as_xyt(&self) -> &str {
        &self.xyt
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<Minutia, TemplateParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(TemplateParseError {
            line: line_no,
            reason: format!("expected 3 or 4 fields, found {}", fields.len()),
        });
    }

    let field = |i: usize| -> Result<i32, TemplateParseError> {
        fields[i].parse::<i32>().map_err(|_| TemplateParseError {
            line: line_no,
            reason: format!("'{}' is not an integer", fields[i]),
        })
    };

    Ok(Minutia {
        x: field(0)?,
        y: field(1)?,
        theta: field(2)?,
        quality: if fields.len() == 4 { Some(field(3)?) } else { None },
    })
}
