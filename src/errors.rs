//! Astgen error handling - unified encapsulated API.
//!
//! Every failure mode of the pipeline is represented by the single
//! [`AstgenError`] struct. Errors are classified by [`ErrorKind`] and fall
//! into three fatal categories: schema validation failures, internal
//! invariant violations (tool bugs, reported distinctly so operators do not
//! mistake them for a bad schema), and emission failures. There is no
//! warning path and no recovery path; every error aborts the run.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Source context for error reporting: the schema text an error points into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real schema file content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting.
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// The single error type - essential data only.
#[derive(Debug)]
pub struct AstgenError {
    /// What went wrong (kind-specific data).
    pub kind: ErrorKind,
    /// Where it happened, when the error points into schema source text.
    pub source_info: Option<SourceInfo>,
    /// How to help (code and optional hint).
    pub diagnostic_info: DiagnosticInfo,
}

/// All failure modes as a clean enum - no duplicate fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Schema errors - always name the offending node/member identifier.
    DuplicateNodeName {
        type_name: String,
    },
    UndefinedBaseType {
        type_name: String,
        base_type: String,
    },
    CyclicInheritance {
        /// Inheritance path that revisits its first element.
        path: Vec<String>,
    },
    InvalidMemberShape {
        type_name: String,
        field_name: String,
        reason: String,
    },
    /// Schema front-end failure: unreadable file or malformed YAML.
    SchemaSyntax {
        message: String,
    },

    // Instance errors - tree construction contract violations.
    BadInstance {
        message: String,
    },

    // Internal errors - a generation-stage assumption violated despite
    // passed validation. Indicates a loader defect, not a bad schema.
    InternalInvariant {
        message: String,
    },

    // Emission errors - filesystem write failures.
    Emission {
        path: PathBuf,
        message: String,
    },
}

/// Span into the schema source, when the offending descriptor is locatable.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Schema,
    Instance,
    Internal,
    Emission,
}

impl ErrorKind {
    /// Get the error category for test assertions and exit reporting.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateNodeName { .. }
            | Self::UndefinedBaseType { .. }
            | Self::CyclicInheritance { .. }
            | Self::InvalidMemberShape { .. }
            | Self::SchemaSyntax { .. } => ErrorCategory::Schema,

            Self::BadInstance { .. } => ErrorCategory::Instance,
            Self::InternalInvariant { .. } => ErrorCategory::Internal,
            Self::Emission { .. } => ErrorCategory::Emission,
        }
    }

    /// Error code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::DuplicateNodeName { .. } => "duplicate_node_name",
            Self::UndefinedBaseType { .. } => "undefined_base_type",
            Self::CyclicInheritance { .. } => "cyclic_inheritance",
            Self::InvalidMemberShape { .. } => "invalid_member_shape",
            Self::SchemaSyntax { .. } => "syntax",
            Self::BadInstance { .. } => "bad_instance",
            Self::InternalInvariant { .. } => "invariant",
            Self::Emission { .. } => "write_failed",
        }
    }

    const fn code_prefix(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Schema => "astgen::schema",
            ErrorCategory::Instance => "astgen::tree",
            ErrorCategory::Internal => "astgen::internal",
            ErrorCategory::Emission => "astgen::emit",
        }
    }
}

impl AstgenError {
    /// Create an error with no source attachment.
    pub fn new(kind: ErrorKind) -> Self {
        let error_code = format!("{}::{}", kind.code_prefix(), kind.code_suffix());
        Self {
            kind,
            source_info: None,
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }

    /// Attach schema source text and the span of the offending descriptor.
    pub fn with_source(mut self, source: &SourceContext, span: SourceSpan) -> Self {
        self.source_info = Some(SourceInfo {
            source: source.to_named_source(),
            primary_span: span,
        });
        self
    }

    /// Attach a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    /// Creates an internal error - these indicate generator bugs, not
    /// schema errors. Use for situations that validation should have made
    /// impossible.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalInvariant {
            message: message.into(),
        })
        .with_help(
            "This is an internal generator defect, not a schema error. Please report it as a bug.",
        )
    }

    /// Creates an emission error from a failed filesystem write.
    pub fn emission(path: impl Into<PathBuf>, cause: &std::io::Error) -> Self {
        Self::new(ErrorKind::Emission {
            path: path.into(),
            message: cause.to_string(),
        })
        .with_help("Treat the output directory as untrustworthy; fix the environment and regenerate fully.")
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl std::error::Error for AstgenError {}

impl fmt::Display for AstgenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::DuplicateNodeName { type_name } => {
                write!(f, "schema error: duplicate node name '{}'", type_name)
            }
            ErrorKind::UndefinedBaseType {
                type_name,
                base_type,
            } => {
                write!(
                    f,
                    "schema error: node '{}' names undefined base type '{}'",
                    type_name, base_type
                )
            }
            ErrorKind::CyclicInheritance { path } => {
                write!(f, "schema error: cyclic inheritance {}", path.join(" -> "))
            }
            ErrorKind::InvalidMemberShape {
                type_name,
                field_name,
                reason,
            } => {
                write!(
                    f,
                    "schema error: invalid member '{}.{}': {}",
                    type_name, field_name, reason
                )
            }
            ErrorKind::SchemaSyntax { message } => {
                write!(f, "schema error: {}", message)
            }
            ErrorKind::BadInstance { message } => {
                write!(f, "instance error: {}", message)
            }
            ErrorKind::InternalInvariant { message } => {
                write!(f, "internal invariant violated: {}", message)
            }
            ErrorKind::Emission { path, message } => {
                write!(
                    f,
                    "emission error: failed to write '{}': {}",
                    path.display(),
                    message
                )
            }
        }
    }
}

impl Diagnostic for AstgenError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let info = self.source_info.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .as_ref()
            .map(|info| &*info.source as &dyn miette::SourceCode)
    }
}

impl AstgenError {
    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::DuplicateNodeName { .. } => "second definition here".into(),
            ErrorKind::UndefinedBaseType { .. } => "unknown base type".into(),
            ErrorKind::CyclicInheritance { .. } => "cycle enters here".into(),
            ErrorKind::InvalidMemberShape { .. } => "invalid member".into(),
            ErrorKind::SchemaSyntax { .. } => "malformed schema".into(),
            ErrorKind::BadInstance { .. } => "invalid construction".into(),
            ErrorKind::InternalInvariant { .. } => "invariant violated".into(),
            ErrorKind::Emission { .. } => "write failed".into(),
        }
    }
}

/// Prints an AstgenError with full miette diagnostics.
///
/// Rich error formatting with source spans and help text, for user-facing
/// display in the CLI.
pub fn print_error(error: AstgenError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
