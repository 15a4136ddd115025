use crate::core::models::{ModuleIdentity, ModuleSpecifier};
use std::path::PathBuf;
use thiserror::Error;

/// Enhanced error with file location context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub code_snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }

    /// Snippet of up to two lines around `line` (1-based), numbered from the first kept line
    pub fn with_snippet_around(self, source: &str, line: usize) -> Self {
        let first = line.saturating_sub(2);
        let snippet = source
            .lines()
            .skip(first)
            .take(line - first)
            .collect::<Vec<_>>()
            .join("\n");
        if snippet.is_empty() {
            return self;
        }
        self.with_snippet(snippet)
    }
}

/// A specifier that could not be mapped to a module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot resolve '{specifier}' from {}", .from_directory.display())]
pub struct ResolutionError {
    pub specifier: ModuleSpecifier,
    pub from_directory: PathBuf,
}

/// A module whose reference list could not be extracted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse {}: {message}", .path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub message: String,
    pub context: ErrorContext,
}

impl ParseError {
    pub fn new(path: PathBuf, message: String) -> Self {
        let context = ErrorContext::new().with_file(path.clone());
        Self {
            path,
            message,
            context,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Error, Debug)]
pub enum GraphErrorKind {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Graph construction failure, attributed to the module that caused it
#[derive(Error, Debug)]
#[error("{kind}{}", .importer.as_ref().map(|m| format!(" (imported by {})", m)).unwrap_or_default())]
pub struct GraphError {
    /// `None` when the entry itself failed
    pub importer: Option<ModuleIdentity>,
    #[source]
    pub kind: GraphErrorKind,
}

impl GraphError {
    pub fn entry(kind: impl Into<GraphErrorKind>) -> Self {
        Self {
            importer: None,
            kind: kind.into(),
        }
    }

    pub fn in_module(importer: &ModuleIdentity, kind: impl Into<GraphErrorKind>) -> Self {
        Self {
            importer: Some(importer.clone()),
            kind: kind.into(),
        }
    }
}

/// The artifact could not be persisted
#[derive(Error, Debug)]
#[error("Failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Minification failed: {0}")]
    Minify(ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The parse error behind this failure, if any
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            BuildError::Graph(GraphError {
                kind: GraphErrorKind::Parse(err),
                ..
            }) => Some(err),
            BuildError::Minify(err) => Some(err),
            _ => None,
        }
    }

    /// Format error with enhanced context display
    pub fn format_detailed(&self) -> String {
        match self.parse_error() {
            Some(err) => format_error_with_context("Parse Error", &self.to_string(), &err.context),
            None => format!("❌ Build Error: {}", self),
        }
    }
}

fn format_error_with_context(error_type: &str, message: &str, ctx: &ErrorContext) -> String {
    let mut output = format!("❌ {}: {}", error_type, message);

    if let Some(ref file_path) = ctx.file_path {
        output.push_str(&format!("\n📁 File: {}", file_path.display()));
    }

    if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
        output.push_str(&format!("\n📍 Location: line {}, column {}", line, column));
    }

    if let Some(ref snippet) = ctx.code_snippet {
        output.push_str(&format!("\n📝 Code:\n{}", format_code_snippet(snippet, ctx.line)));
    }

    output
}

fn format_code_snippet(snippet: &str, error_line: Option<usize>) -> String {
    let lines: Vec<&str> = snippet.lines().collect();
    // Snippet lines end at the error line
    let first_line = error_line.map(|l| (l + 1).saturating_sub(lines.len())).unwrap_or(1).max(1);
    let mut output = String::new();

    for (i, line) in lines.iter().enumerate() {
        let line_num = first_line + i;
        if error_line == Some(line_num) {
            output.push_str(&format!("→ {:3} │ {}\n", line_num, line));
        } else {
            output.push_str(&format!("  {:3} │ {}\n", line_num, line));
        }
    }

    output
}

pub type Result<T> = std::result::Result<T, BuildError>;
