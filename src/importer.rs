// 📥 Importer - one import action end to end
//
// read file → evaluate → extract → reconcile → save → notify
//
// Only I/O and storage failures are errors. If the save fails the
// in-memory roster keeps the merge, so the caller can save again later
// without re-importing.

use rusqlite::Connection;
use std::path::Path;

use crate::character::Roster;
use crate::db;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::notification::Notification;
use crate::parser::{AddonParser, ParseResult};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};

pub const NO_DATA_MESSAGE: &str = "No character data found in addon file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// The file held no usable characters.
    NoData,
    UpToDate,
    /// Something was added or updated and the roster was saved.
    Saved,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub status: ImportStatus,
    pub extracted: usize,
    pub stale: usize,
    pub report: ReconciliationReport,
}

impl ImportSummary {
    /// User-facing message, as stored in the notification history.
    pub fn message(&self) -> String {
        match self.status {
            ImportStatus::NoData => NO_DATA_MESSAGE.to_string(),
            _ if self.stale > 0 && self.report.has_changes() => {
                format!("{} ({} stale)", self.report.summary(), self.stale)
            }
            _ => self.report.summary(),
        }
    }
}

pub struct Importer<'c> {
    conn: &'c Connection,
    parser: AddonParser,
    engine: ReconciliationEngine,
}

impl<'c> Importer<'c> {
    pub fn new(conn: &'c Connection, app_version: &str) -> Self {
        Importer {
            conn,
            parser: AddonParser::new(),
            engine: ReconciliationEngine::new(app_version),
        }
    }

    /// Use a specific parser, e.g. one with a fixed clock.
    pub fn with_parser(mut self, parser: AddonParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn import_file(
        &self,
        path: &Path,
        roster: &mut Roster,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ImportSummary> {
        tracing::info!(path = %path.display(), "importing addon data");
        let batch = self.parser.parse_file(path, sink)?;
        self.apply(batch, roster, sink)
    }

    pub fn import_content(
        &self,
        content: &str,
        roster: &mut Roster,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ImportSummary> {
        let batch = self.parser.parse_content(content, sink);
        self.apply(batch, roster, sink)
    }

    fn apply(
        &self,
        batch: ParseResult,
        roster: &mut Roster,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ImportSummary> {
        let report = self.engine.reconcile(roster, &batch, sink);

        if let Some(mismatch) = &report.version_mismatch {
            db::insert_notification(self.conn, &Notification::warning(mismatch.message()))?;
        }

        let status = if batch.is_empty() {
            ImportStatus::NoData
        } else if report.has_changes() {
            db::save_roster(self.conn, roster)?;
            ImportStatus::Saved
        } else {
            ImportStatus::UpToDate
        };

        let summary = ImportSummary {
            status,
            extracted: batch.len(),
            stale: batch.stale,
            report,
        };

        let notification = match status {
            ImportStatus::NoData => Notification::warning(summary.message()),
            ImportStatus::Saved => Notification::success(summary.message()),
            ImportStatus::UpToDate => Notification::info(summary.message()),
        };
        db::insert_notification(self.conn, &notification)?;

        tracing::info!(
            extracted = summary.extracted,
            added = summary.report.added,
            updated = summary.report.updated,
            skipped = batch.skipped + summary.report.skipped,
            "import finished"
        );
        Ok(summary)
    }
}
