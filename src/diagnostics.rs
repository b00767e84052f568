// 🩺 Diagnostics sink
// Import problems that are absorbed rather than propagated are reported
// here. The sink is passed explicitly down the call path.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The whole file could not be evaluated; the batch is empty.
    ParseFailure { reason: String },

    /// A `characters` entry could not become a record.
    EntrySkipped { key: String, reason: String },

    /// A field had the wrong type and fell back to its default.
    FieldDefaulted {
        character: String,
        field: &'static str,
        found: &'static str,
    },

    /// An extracted record without a usable identity was not merged.
    ReconciliationSkip { name: String, realm: String },

    /// The addon that wrote the file is a different release than this app.
    VersionMismatch { addon: String, app: String },
}

impl Diagnostic {
    /// Warnings are shown to the user; everything else is debug detail.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::ParseFailure { .. } | Diagnostic::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ParseFailure { reason } => {
                write!(f, "could not parse addon data: {}", reason)
            }
            Diagnostic::EntrySkipped { key, reason } => {
                write!(f, "skipped entry '{}': {}", key, reason)
            }
            Diagnostic::FieldDefaulted {
                character,
                field,
                found,
            } => write!(
                f,
                "{}: field '{}' was a {}, using default",
                character, field, found
            ),
            Diagnostic::ReconciliationSkip { name, realm } => {
                write!(f, "skipped record without identity (name '{}', realm '{}')", name, realm)
            }
            Diagnostic::VersionMismatch { addon, app } => {
                write!(f, "version mismatch: addon v{}, app v{}", addon, app)
            }
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

/// Collects everything; handy for tests and for summaries.
impl DiagnosticSink for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards to `tracing`: warnings at WARN, the rest at DEBUG.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            tracing::warn!("{}", diagnostic);
        } else {
            tracing::debug!("{}", diagnostic);
        }
    }
}
