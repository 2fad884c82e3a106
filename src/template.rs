//! Naming templates for books, volumes and pages.
//!
//! A template is literal text with `{{Field}}` placeholders. Exactly three fields
//! exist:
//!
//! | Field   | Value                                                         |
//! |---------|---------------------------------------------------------------|
//! | `Index` | decimal index, zero-padded to the digit count of a reference  |
//! | `Name`  | base file name of the source, extension included              |
//! | `Ext`   | lower-cased extension of the source, leading dot included     |
//!
//! `{{.Index}}` and `{{ Index }}` are accepted as spellings of `{{Index}}`.

use std::fmt::Write;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::path_utils::{get_file_name_lossy, lower_ext};

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{\{\s*\.?([A-Za-z_]\w*)\s*\}\}").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Index,
    Name,
    Ext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parses `template`, rejecting unknown fields and stray `{{` / `}}`.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_REGEX.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_literal(&mut segments, &template[last..whole.start()])?;

            let field = match &caps[1] {
                "Index" => Field::Index,
                "Name" => Field::Name,
                "Ext" => Field::Ext,
                other => {
                    return Err(Error::Template(format!(
                        "unknown field '{}' in '{}'",
                        other, template
                    )));
                }
            };
            segments.push(Segment::Field(field));
            last = whole.end();
        }
        push_literal(&mut segments, &template[last..])?;

        Ok(Self { segments })
    }

    /// Renders the template for `source`.
    ///
    /// `index` is zero-padded to the number of digits of `reference`, which callers
    /// set to the highest index that will be rendered for the same collection.
    pub fn render(&self, source: &Path, index: usize, reference: usize) -> String {
        let width = reference.to_string().len();
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Index) => {
                    let _ = write!(out, "{:0width$}", index, width = width);
                }
                Segment::Field(Field::Name) => out.push_str(&get_file_name_lossy(source)),
                Segment::Field(Field::Ext) => out.push_str(&lower_ext(source)),
            }
        }

        out
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<()> {
    if text.contains("{{") || text.contains("}}") {
        return Err(Error::Template(format!("malformed placeholder near '{}'", text)));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}
