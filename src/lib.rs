// WoW Stat Tracker - Core Library
// Addon import, reconciliation, weekly reset and persistence for the CLI

pub mod error;
pub mod table_literal;  // SavedVariables literal evaluator (pest grammar)
pub mod temporal;       // Weekly period calculator
pub mod diagnostics;
pub mod character;
pub mod parser;         // Field extraction layer
pub mod reconciliation;
pub mod notification;
pub mod db;
pub mod weekly_reset;
pub mod data_quality;
pub mod config;
pub mod importer;

// Re-export commonly used types
pub use error::{Result, RosterError};
pub use table_literal::{evaluate, LiteralError, RawKey, RawValue};
pub use temporal::{next_reset_after, time_until_reset, PeriodId};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use character::{CharacterRecord, Roster};
pub use parser::{AddonParser, ParseResult};
pub use reconciliation::{ReconciliationEngine, ReconciliationReport, VersionMismatch};
pub use notification::{Notification, NotifyKind};
pub use db::{
    setup_database, load_roster, save_roster, set_notes,
    delete_character, get_setting, set_setting, insert_notification,
    get_recent_notifications, remove_notification, clear_notifications,
    export_json, export_csv,
};
pub use weekly_reset::{recorded_period, reset_now, ResetOutcome, ResetState, WeeklyResetController};
pub use data_quality::{DataQualityEngine, QualityReport, QualityIssue, Severity, BatchSummary};
pub use importer::{ImportStatus, ImportSummary, Importer};

/// Application version, compared against the addon's `metadata.version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
