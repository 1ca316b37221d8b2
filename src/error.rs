use std::fmt::{self, Debug, Display};

use crate::lexer::Pos;
use crate::source::SourceFile;
use crate::{lexer, parser};

pub trait IntoPositioned {
    fn at(self, pos: Pos) -> Positioned<Self>
    where
        Self: Sized + Display;
}

impl<T: Display> IntoPositioned for T {
    fn at(self, pos: Pos) -> Positioned<Self> {
        Positioned { kind: self, pos }
    }
}

/// An error kind tagged with the source position it was raised at.
#[derive(Debug)]
pub struct Positioned<T: Display> {
    pub kind: T,
    pub pos: Pos,
}

impl<T: Display> Display for Positioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<T: Display + Debug> std::error::Error for Positioned<T> {}

pub type TokenError = Positioned<lexer::ErrorKind>;
pub type ParseError = Positioned<parser::ErrorKind>;
pub type SemanticError = Positioned<SemanticErrorKind>;

#[derive(Debug, thiserror::Error)]
pub enum SemanticErrorKind {
    #[error("not all scopes closed at end of file")]
    UnbalancedScopes,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lex error: {0}")]
    Lex(#[from] TokenError),
    #[error("Syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),
}

impl Error {
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Error::Io(_) => None,
            Error::Lex(e) => Some(e.pos),
            Error::Parse(e) => Some(e.pos),
            Error::Semantic(e) => Some(e.pos),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "I/O",
            Error::Lex(_) => "Lex",
            Error::Parse(_) => "Syntax",
            Error::Semantic(_) => "Semantic",
        }
    }

    fn message(&self) -> String {
        match self {
            Error::Io(e) => e.to_string(),
            Error::Lex(e) => e.to_string(),
            Error::Parse(e) => e.to_string(),
            Error::Semantic(e) => e.to_string(),
        }
    }

    /// Render the full diagnostic: path, position, categorized message and
    /// the annotated source excerpt.
    pub fn report(&self, source: &SourceFile) -> String {
        match self.pos() {
            Some(pos) => format!(
                "{} ({}, {}):\n\t{} error: {}\n\n{}",
                source.path().display(),
                pos.line,
                pos.column,
                self.category(),
                self.message(),
                excerpt(source.data(), pos),
            ),
            None => self.to_string(),
        }
    }
}

/// Up to two lines of context plus the error line, then a caret line whose
/// leading whitespace mirrors the error line (tabs stay tabs, everything
/// else becomes a space) up to the error column, ending in `^^^`.
pub fn excerpt(source: &[u8], pos: Pos) -> String {
    let source = source.strip_suffix(&[0]).unwrap_or(source);
    let lines: Vec<&[u8]> = source.split(|b| *b == b'\n').collect();
    let line = match pos.line.checked_sub(1) {
        Some(n) if n < lines.len() => n,
        _ => return String::new(),
    };

    let mut out = String::new();

    for text in &lines[line.saturating_sub(2)..=line] {
        out.push_str(&String::from_utf8_lossy(text));
        out.push('\n');
    }

    for &b in lines[line].iter().take(pos.column.saturating_sub(1)) {
        out.push(if b == b'\t' { '\t' } else { ' ' });
    }

    out.push_str("^^^");
    out
}
