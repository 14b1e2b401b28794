//! # Text Bridges
//!
//! Render a document as an outline in a text syntax and turn edits of that
//! text back into semantic operations.
//!
//! ```text
//! Markdown             LaTeX
//! - Groceries          \begin{itemize}
//!   - Milk             \item Groceries
//!   - Eggs               \item Milk
//! - Laundry              \item Eggs
//!                      \item Laundry
//!                      \end{itemize}
//! ```
//!
//! Diffing is line aligned: the edited text must have one outline line per
//! item, at the same depth. Changed lines become `setText` operations.
//! Anything structural (added, removed or re-indented lines) is reported as
//! [`BridgeError::Unaligned`] and left to reconciliation.

use crate::authority::{Authority, UpdateSource};
use crate::operations::Operation;
use crate::projection::{OutlineLine, OutlineProjection, Projection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use twodo_model::CanonicalModel;

const INDENT: &str = "  ";
const LATEX_BEGIN: &str = "\\begin{itemize}";
const LATEX_END: &str = "\\end{itemize}";
const LATEX_ITEM: &str = "\\item";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Text no longer lines up with the model: {0}")]
    Unaligned(String),

    #[error("Unknown outline syntax: {0}")]
    UnknownSyntax(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineSyntax {
    Markdown,
    Latex,
}

impl OutlineSyntax {
    pub fn source(self) -> UpdateSource {
        match self {
            OutlineSyntax::Markdown => UpdateSource::Markdown,
            OutlineSyntax::Latex => UpdateSource::Latex,
        }
    }

    pub fn authority(self) -> Authority {
        match self {
            OutlineSyntax::Markdown => Authority::Markdown,
            OutlineSyntax::Latex => Authority::Latex,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutlineSyntax::Markdown => "markdown",
            OutlineSyntax::Latex => "latex",
        }
    }
}

impl fmt::Display for OutlineSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlineSyntax {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutlineSyntax::Markdown),
            "latex" | "tex" => Ok(OutlineSyntax::Latex),
            other => Err(BridgeError::UnknownSyntax(other.to_string())),
        }
    }
}

/// Two-way mapping between the model and one text syntax
pub trait TextBridge: Send + Sync + fmt::Debug {
    fn source(&self) -> UpdateSource;

    fn render(&self, model: &CanonicalModel, document_id: &str) -> Result<String, BridgeError>;

    /// Operations that turn the model's rendering of `before` into `after`
    fn diff(
        &self,
        before: &str,
        after: &str,
        model: &CanonicalModel,
        document_id: &str,
    ) -> Result<Vec<Operation>, BridgeError>;
}

/// A parsed outline row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub depth: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineBridge {
    syntax: OutlineSyntax,
}

impl OutlineBridge {
    pub fn new(syntax: OutlineSyntax) -> Self {
        Self { syntax }
    }

    pub fn markdown() -> Self {
        Self::new(OutlineSyntax::Markdown)
    }

    pub fn latex() -> Self {
        Self::new(OutlineSyntax::Latex)
    }

    pub fn syntax(&self) -> OutlineSyntax {
        self.syntax
    }

    fn format_line(&self, line: &OutlineLine) -> String {
        let indent = INDENT.repeat(line.depth);
        let text = line.text.replace('\n', " ");
        match self.syntax {
            OutlineSyntax::Markdown => format!("{}- {}", indent, text),
            OutlineSyntax::Latex => format!("{}{} {}", indent, LATEX_ITEM, text),
        }
    }

    /// Outline rows of `text`; blank lines and environment markers are skipped
    pub fn parse(&self, text: &str) -> Result<Vec<ParsedLine>, BridgeError> {
        let mut parsed = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let trimmed = raw.trim_start_matches(' ');
            if trimmed.trim().is_empty() {
                continue;
            }
            if self.syntax == OutlineSyntax::Latex
                && matches!(trimmed.trim_end(), LATEX_BEGIN | LATEX_END)
            {
                continue;
            }

            let indent = raw.len() - trimmed.len();
            if indent % INDENT.len() != 0 {
                return Err(BridgeError::Syntax {
                    line: number + 1,
                    message: format!("indentation of {} spaces is not a multiple of two", indent),
                });
            }

            let marker = match self.syntax {
                OutlineSyntax::Markdown => "-",
                OutlineSyntax::Latex => LATEX_ITEM,
            };
            let rest = trimmed.strip_prefix(marker).ok_or_else(|| BridgeError::Syntax {
                line: number + 1,
                message: format!("expected a line starting with '{}'", marker),
            })?;
            let text = match rest.strip_prefix(' ') {
                Some(text) => text,
                None if rest.is_empty() => rest,
                None => {
                    return Err(BridgeError::Syntax {
                        line: number + 1,
                        message: format!("expected a space after '{}'", marker),
                    })
                }
            };

            parsed.push(ParsedLine {
                depth: indent / INDENT.len(),
                text: text.to_string(),
            });
        }
        Ok(parsed)
    }
}

impl TextBridge for OutlineBridge {
    fn source(&self) -> UpdateSource {
        self.syntax.source()
    }

    fn render(&self, model: &CanonicalModel, document_id: &str) -> Result<String, BridgeError> {
        if model.document(document_id).is_none() {
            return Err(BridgeError::DocumentNotFound(document_id.to_string()));
        }

        let mut out = String::new();
        if self.syntax == OutlineSyntax::Latex {
            out.push_str(LATEX_BEGIN);
            out.push('\n');
        }
        for line in OutlineProjection::lines(model, document_id) {
            out.push_str(&self.format_line(&line));
            out.push('\n');
        }
        if self.syntax == OutlineSyntax::Latex {
            out.push_str(LATEX_END);
            out.push('\n');
        }
        Ok(out)
    }

    fn diff(
        &self,
        before: &str,
        after: &str,
        model: &CanonicalModel,
        document_id: &str,
    ) -> Result<Vec<Operation>, BridgeError> {
        if model.document(document_id).is_none() {
            return Err(BridgeError::DocumentNotFound(document_id.to_string()));
        }

        let items = OutlineProjection::lines(model, document_id);
        let edited = self.parse(after)?;
        if edited.len() != items.len() {
            return Err(BridgeError::Unaligned(format!(
                "{} outline lines for {} items",
                edited.len(),
                items.len()
            )));
        }

        // Lines the author did not touch are never turned into edits
        let previous = self
            .parse(before)
            .ok()
            .filter(|lines| lines.len() == edited.len());

        let mut operations = Vec::new();
        for (index, (item, line)) in items.iter().zip(&edited).enumerate() {
            if item.depth != line.depth {
                return Err(BridgeError::Unaligned(format!(
                    "line {} moved from depth {} to {}",
                    index + 1,
                    item.depth,
                    line.depth
                )));
            }
            let untouched = previous
                .as_ref()
                .is_some_and(|lines| lines[index].text == line.text);
            if untouched || item.text == line.text {
                continue;
            }
            operations.push(Operation::set_text(
                item.item_id.clone(),
                line.text.clone(),
                Some(&item.text),
            ));
        }
        Ok(operations)
    }
}

/// Lets a bridge drive a text view directly
impl Projection for OutlineBridge {
    type Output = String;

    fn project(&self, model: &CanonicalModel, document_id: &str) -> String {
        self.render(model, document_id).unwrap_or_default()
    }
}
