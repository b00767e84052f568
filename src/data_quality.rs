// ✅ Data Quality Engine - range checks for character records
//
// Import never rejects data; this is a separate pass used by the `check`
// command to flag values the game cannot actually produce.

use serde::{Deserialize, Serialize};

use crate::character::{CharacterRecord, MAX_TIMEWALK};

pub const MAX_ITEM_LEVEL: f64 = 1000.0;
pub const MAX_ITEMS_PER_CATEGORY: i32 = 50;
pub const MAX_DELVES: i32 = 8;
pub const MAX_GILDED_STASH: i32 = 3;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Record cannot be identified
    Warning,  // Value outside what the game allows
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub field: String,
    pub issue: String,
}

impl QualityIssue {
    fn critical(field: &str, issue: impl Into<String>) -> Self {
        QualityIssue {
            severity: Severity::Critical,
            field: field.to_string(),
            issue: issue.into(),
        }
    }

    fn warning(field: &str, issue: impl Into<String>) -> Self {
        QualityIssue {
            severity: Severity::Warning,
            field: field.to_string(),
            issue: issue.into(),
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// `"Name-Realm"` of the checked record.
    pub character: String,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!("{}: ok", self.character)
        } else {
            let messages: Vec<&str> = self.issues.iter().map(|i| i.issue.as_str()).collect();
            format!("{}: {}", self.character, messages.join("; "))
        }
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    max_item_level: f64,
    max_items_per_category: i32,
    max_delves: i32,
    max_gilded_stash: i32,
    max_timewalk: i32,
}

impl DataQualityEngine {
    pub fn new() -> Self {
        DataQualityEngine {
            max_item_level: MAX_ITEM_LEVEL,
            max_items_per_category: MAX_ITEMS_PER_CATEGORY,
            max_delves: MAX_DELVES,
            max_gilded_stash: MAX_GILDED_STASH,
            max_timewalk: MAX_TIMEWALK,
        }
    }

    pub fn validate(&self, character: &CharacterRecord) -> QualityReport {
        let mut issues = Vec::new();

        // Rule 1: identity present
        if character.name.trim().is_empty() {
            issues.push(QualityIssue::critical("name", "Character name is required"));
        }
        if character.realm.trim().is_empty() {
            issues.push(QualityIssue::critical("realm", "Realm is required"));
        }

        // Rule 2: item level
        if !(0.0..=self.max_item_level).contains(&character.item_level) {
            issues.push(QualityIssue::warning(
                "item_level",
                format!("Item level must be between 0 and {}", self.max_item_level),
            ));
        }

        // Rule 3: gear tier counts
        for (field, value) in [
            ("heroic_items", character.heroic_items),
            ("champion_items", character.champion_items),
            ("veteran_items", character.veteran_items),
            ("adventure_items", character.adventure_items),
            ("old_items", character.old_items),
        ] {
            if !(0..=self.max_items_per_category).contains(&value) {
                issues.push(QualityIssue::warning(
                    field,
                    format!("{} must be between 0 and {}", field, self.max_items_per_category),
                ));
            }
        }

        // Rule 4: weekly counters
        for (field, label, value, max) in [
            ("delves", "Delves", character.delves, self.max_delves),
            ("gilded_stash", "Gilded stash", character.gilded_stash, self.max_gilded_stash),
            ("timewalk", "Timewalk", character.timewalk, self.max_timewalk),
        ] {
            if !(0..=max).contains(&value) {
                issues.push(QualityIssue::warning(
                    field,
                    format!("{} must be between 0 and {}", label, max),
                ));
            }
        }

        QualityReport {
            character: character.key(),
            issues,
        }
    }

    pub fn validate_batch<'a>(
        &self,
        characters: impl IntoIterator<Item = &'a CharacterRecord>,
    ) -> Vec<QualityReport> {
        characters.into_iter().map(|c| self.validate(c)).collect()
    }

    pub fn batch_summary(&self, reports: &[QualityReport]) -> BatchSummary {
        BatchSummary {
            total_characters: reports.len(),
            valid_count: reports.iter().filter(|r| r.is_valid()).count(),
            critical_count: reports.iter().filter(|r| r.has_critical_issues()).count(),
            issue_count: reports.iter().map(|r| r.issues.len()).sum(),
        }
    }
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BATCH SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_characters: usize,
    pub valid_count: usize,
    pub critical_count: usize,
    pub issue_count: usize,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} characters: {} valid, {} issues ({} with critical problems)",
            self.total_characters, self.valid_count, self.issue_count, self.critical_count
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
