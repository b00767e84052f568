// ⚖️ Reconciliation Engine - Merge an imported batch into the roster
//
// Identity is (realm, name), matched exactly. A match has every field
// overwritten except `notes`; an unmatched record is appended. Imported
// data always wins. Reconciling the same batch twice changes nothing the
// second time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::Roster;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::parser::ParseResult;

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// The addon that produced the batch is a different release than this app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMismatch {
    pub addon: String,
    pub app: String,
}

impl VersionMismatch {
    pub fn message(&self) -> String {
        format!("Version mismatch: addon v{}, app v{}", self.addon, self.app)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records dropped for lacking a name or realm.
    pub skipped: usize,
    pub version_mismatch: Option<VersionMismatch>,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// Anything added or updated, i.e. the roster needs saving.
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.updated > 0
    }

    pub fn summary(&self) -> String {
        fn characters(n: usize) -> &'static str {
            if n == 1 {
                "character"
            } else {
                "characters"
            }
        }

        match (self.updated, self.added) {
            (0, 0) => "All characters up to date.".to_string(),
            (updated, 0) => format!("Updated {} {}.", updated, characters(updated)),
            (0, added) => format!("Added {} {}.", added, characters(added)),
            (updated, added) => format!(
                "Updated {}, added {} {}.",
                updated,
                added,
                characters(updated + added)
            ),
        }
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Release of this application, compared against `metadata.version`.
    pub app_version: String,
}

impl ReconciliationEngine {
    pub fn new(app_version: impl Into<String>) -> Self {
        ReconciliationEngine {
            app_version: app_version.into(),
        }
    }

    /// Merge `batch` into `roster`.
    ///
    /// Records are processed in batch order, so a character appearing twice
    /// in one batch is appended once and then updated by the later entry.
    pub fn reconcile(
        &self,
        roster: &mut Roster,
        batch: &ParseResult,
        sink: &mut dyn DiagnosticSink,
    ) -> ReconciliationReport {
        let version_mismatch = self.check_version(batch.addon_version.as_deref());
        if let Some(mismatch) = &version_mismatch {
            sink.record(Diagnostic::VersionMismatch {
                addon: mismatch.addon.clone(),
                app: mismatch.app.clone(),
            });
        }

        let mut report = ReconciliationReport {
            added: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            version_mismatch,
            reconciled_at: Utc::now(),
        };

        for incoming in &batch.characters {
            if !incoming.has_identity() {
                sink.record(Diagnostic::ReconciliationSkip {
                    name: incoming.name.clone(),
                    realm: incoming.realm.clone(),
                });
                report.skipped += 1;
                continue;
            }

            match roster.get_mut(&incoming.realm, &incoming.name) {
                Some(resident) => {
                    if resident.absorb(incoming) {
                        tracing::debug!(character = %resident.key(), "updated");
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    let mut record = incoming.clone();
                    record.notes.clear();
                    tracing::debug!(character = %record.key(), "added");
                    roster.push(record);
                    report.added += 1;
                }
            }
        }

        report
    }

    fn check_version(&self, addon_version: Option<&str>) -> Option<VersionMismatch> {
        match addon_version {
            Some(addon) if addon != self.app_version => Some(VersionMismatch {
                addon: addon.to_string(),
                app: self.app_version.clone(),
            }),
            _ => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
