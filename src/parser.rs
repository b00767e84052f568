// 🏗️ Addon Parser - Field Extraction Layer
// Turns an evaluated SavedVariables tree into CharacterRecords.
//
// Missing or mistyped fields fall back to their defaults one at a time.
// A bad field never spoils its entry and a bad entry never spoils the batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::character::{CharacterRecord, MAX_TIMEWALK};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::Result;
use crate::table_literal::{self, RawKey, RawValue};
use crate::temporal::PeriodId;

/// Vault slots at or above this key level count as high-tier rewards.
pub const HIGH_TIER_THRESHOLD: i32 = 8;

// ============================================================================
// CORE TYPES
// ============================================================================

/// ParseResult - Output of one extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub characters: Vec<CharacterRecord>,

    /// `metadata.version` of the addon that wrote the file.
    pub addon_version: Option<String>,

    /// Entries in `characters` that could not become a record.
    pub skipped: usize,

    /// Records tagged with a period other than the current one.
    pub stale: usize,
}

impl ParseResult {
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// One element of `slot_upgrades_json`.
#[derive(Debug, Serialize)]
struct SlotUpgrade<'a> {
    slot: i32,
    slot_name: &'a str,
    track: &'a str,
    current: i32,
    max: i32,
}

// ============================================================================
// ADDON PARSER
// ============================================================================

/// AddonParser - reads `WoWStatTracker_Addon.lua` exports
///
/// The clock is fixed at construction so a whole batch is judged against
/// one period.
#[derive(Debug, Clone)]
pub struct AddonParser {
    now: DateTime<Utc>,
}

impl AddonParser {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Parser with a fixed "now", for stale detection and tests.
    pub fn at(now: DateTime<Utc>) -> Self {
        AddonParser { now }
    }

    /// Read and parse an addon file. Only I/O errors propagate; anything
    /// wrong with the content yields an empty result plus diagnostics.
    pub fn parse_file(&self, path: &Path, sink: &mut dyn DiagnosticSink) -> Result<ParseResult> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read addon file");
        Ok(self.parse_content(&content, sink))
    }

    /// Evaluate then extract. Never fails.
    pub fn parse_content(&self, content: &str, sink: &mut dyn DiagnosticSink) -> ParseResult {
        match table_literal::evaluate(content) {
            Ok(root) => self.extract_characters(&root, sink),
            Err(e) => {
                sink.record(Diagnostic::ParseFailure {
                    reason: e.to_string(),
                });
                ParseResult::default()
            }
        }
    }

    /// Walk `root.characters` and `root.metadata.version`.
    pub fn extract_characters(&self, root: &RawValue, sink: &mut dyn DiagnosticSink) -> ParseResult {
        let current = PeriodId::for_timestamp(self.now);
        let mut result = ParseResult {
            addon_version: root
                .get_path(&["metadata", "version"])
                .and_then(RawValue::as_str)
                .map(str::to_string),
            ..Default::default()
        };

        let characters = match root.get("characters") {
            Some(table) if table.is_table() => table,
            Some(other) => {
                tracing::debug!("characters is a {}, nothing to import", other.type_name());
                return result;
            }
            None => {
                tracing::debug!("no characters table in addon data");
                return result;
            }
        };

        for (key, entry) in characters.entries() {
            match extract_character(&key, entry, sink) {
                Some(record) => {
                    if !record.week_id.is_empty() && !current.matches(&record.week_id) {
                        result.stale += 1;
                    }
                    result.characters.push(record);
                }
                None => result.skipped += 1,
            }
        }

        tracing::debug!(
            extracted = result.characters.len(),
            skipped = result.skipped,
            stale = result.stale,
            "extraction complete"
        );
        result
    }
}

impl Default for AddonParser {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PER-ENTRY EXTRACTION
// ============================================================================

/// Split `"Name-Realm"` into `(name, realm)` on the last hyphen.
pub fn split_character_key(key: &str) -> Option<(&str, &str)> {
    key.rsplit_once('-')
}

fn extract_character(
    key: &RawKey,
    entry: &RawValue,
    sink: &mut dyn DiagnosticSink,
) -> Option<CharacterRecord> {
    let key = match key {
        RawKey::Name(name) => name.as_str(),
        RawKey::Index(i) => {
            sink.record(Diagnostic::EntrySkipped {
                key: format!("[{}]", i),
                reason: "key is not a string".to_string(),
            });
            return None;
        }
    };

    let Some((name, realm)) = split_character_key(key) else {
        sink.record(Diagnostic::EntrySkipped {
            key: key.to_string(),
            reason: "key has no realm separator".to_string(),
        });
        return None;
    };

    if !entry.is_table() {
        sink.record(Diagnostic::EntrySkipped {
            key: key.to_string(),
            reason: format!("value is a {}, expected a table", entry.type_name()),
        });
        return None;
    }

    let mut fields = FieldReader {
        entry,
        label: key,
        sink,
    };

    let mut record = CharacterRecord::new(realm, name);
    record.guild = fields.string(&["guild"], "guild");
    record.item_level = fields.number(&["item_level"], "item_level").unwrap_or(0.0);

    record.heroic_items = fields.count(&["heroic_items"], "heroic_items");
    record.champion_items = fields.count(&["champion_items"], "champion_items");
    record.veteran_items = fields.count(&["veteran_items"], "veteran_items");
    record.adventure_items = fields.count(&["adventure_items"], "adventure_items");
    record.old_items = fields.count(&["old_items"], "old_items");

    // Claimed, or nothing left to claim
    let claimed = fields.flag(&["vault_visited"], "vault_visited") == Some(true);
    let nothing_claimable = fields.flag(&["vault_has_rewards"], "vault_visited") == Some(false);
    record.vault_visited = claimed || nothing_claimable;

    record.gearing_up = fields.flag(&["gearing_up"], "gearing_up").unwrap_or(false);
    record.quests = fields.flag(&["quests"], "quests").unwrap_or(false);

    // The gearing-up quest completion is already inside the vault count
    let mut delves = fields.count(&["vault_delves", "count"], "delves");
    if record.gearing_up && delves > 0 {
        delves -= 1;
    }
    record.delves = delves;
    record.dungeons = fields.count(&["vault_dungeons", "count"], "dungeons");

    record.vault_t8_plus = fields.high_tier(&["vault_delves", "tiers"])
        + fields.high_tier(&["vault_dungeons", "levels"]);

    record.gilded_stash = fields.count(&["gilded_stash", "claimed"], "gilded_stash");

    record.timewalk = if fields.flag(&["timewalking_quest", "completed"], "timewalk") == Some(true) {
        MAX_TIMEWALK
    } else {
        fields.count(&["timewalking_quest", "progress"], "timewalk")
    };

    record.upgrade_current = fields.count(&["upgrade_current"], "upgrade_current");
    record.upgrade_max = fields.count(&["upgrade_max"], "upgrade_max");

    let socketable = fields
        .number(&["socket_info", "socketable_count"], "socket_missing_count")
        .unwrap_or(0.0);
    let socketed = fields
        .number(&["socket_info", "socketed_count"], "socket_missing_count")
        .unwrap_or(0.0);
    record.socket_missing_count = to_count(socketable - socketed);
    record.socket_empty_count = fields.count(&["socket_info", "empty_count"], "socket_empty_count");

    let enchantable = fields
        .number(&["enchant_info", "enchantable_count"], "enchant_missing_count")
        .unwrap_or(0.0);
    let enchanted = fields
        .number(&["enchant_info", "enchant_count"], "enchant_missing_count")
        .unwrap_or(0.0);
    record.enchant_missing_count = to_count(enchantable - enchanted);

    record.slot_upgrades_json = fields.slot_upgrades();
    record.missing_sockets_json =
        fields.index_list(&["socket_info", "missing_sockets"], "missing_sockets_json");
    record.empty_sockets_json =
        fields.index_list(&["socket_info", "empty_sockets"], "empty_sockets_json");
    record.missing_enchants_json =
        fields.index_list(&["enchant_info", "missing_enchants"], "missing_enchants_json");

    record.week_id = match fields.string_opt(&["week_id"], "week_id") {
        Some(tag) if !tag.is_empty() => tag,
        _ => fields
            .number(&["timestamp"], "week_id")
            .and_then(|secs| PeriodId::for_unix(secs.trunc() as i64))
            .map(|period| period.to_string())
            .unwrap_or_default(),
    };

    Some(record)
}

/// Truncate toward zero; out-of-range values saturate and NaN becomes 0.
fn to_count(value: f64) -> i32 {
    value.trunc() as i32
}

// ============================================================================
// FIELD READER
// ============================================================================

/// Typed lookups against one character table. Every miss is a default;
/// a present value of the wrong type also reports `FieldDefaulted`.
struct FieldReader<'a, 's> {
    entry: &'a RawValue,
    label: &'a str,
    sink: &'s mut dyn DiagnosticSink,
}

impl<'a, 's> FieldReader<'a, 's> {
    fn defaulted(&mut self, field: &'static str, found: &RawValue) {
        self.sink.record(Diagnostic::FieldDefaulted {
            character: self.label.to_string(),
            field,
            found: found.type_name(),
        });
    }

    /// Follow `path`. Absent keys are silent; stepping through a
    /// non-table is a type mismatch.
    fn lookup(&mut self, path: &[&str], field: &'static str) -> Option<&'a RawValue> {
        let mut node = self.entry;
        for key in path {
            if !node.is_map() {
                self.defaulted(field, node);
                return None;
            }
            node = node.get(key)?;
        }
        Some(node)
    }

    fn string_opt(&mut self, path: &[&str], field: &'static str) -> Option<String> {
        let value = self.lookup(path, field)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.defaulted(field, value);
                None
            }
        }
    }

    fn string(&mut self, path: &[&str], field: &'static str) -> String {
        self.string_opt(path, field).unwrap_or_default()
    }

    fn number(&mut self, path: &[&str], field: &'static str) -> Option<f64> {
        let value = self.lookup(path, field)?;
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                self.defaulted(field, value);
                None
            }
        }
    }

    fn count(&mut self, path: &[&str], field: &'static str) -> i32 {
        self.number(path, field).map(to_count).unwrap_or(0)
    }

    fn flag(&mut self, path: &[&str], field: &'static str) -> Option<bool> {
        let value = self.lookup(path, field)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.defaulted(field, value);
                None
            }
        }
    }

    /// A table given as a sequence or a sparse map, or `None`.
    fn table(&mut self, path: &[&str], field: &'static str) -> Option<&'a RawValue> {
        let value = self.lookup(path, field)?;
        if value.is_table() {
            Some(value)
        } else {
            self.defaulted(field, value);
            None
        }
    }

    /// Entries of a threshold-keyed table whose value reaches the high tier.
    fn high_tier(&mut self, path: &[&str]) -> i32 {
        let Some(table) = self.table(path, "vault_t8_plus") else {
            return 0;
        };
        table
            .values()
            .into_iter()
            .filter_map(RawValue::as_f64)
            .filter(|level| to_count(*level) >= HIGH_TIER_THRESHOLD)
            .count() as i32
    }

    fn slot_upgrades(&mut self) -> Option<String> {
        let table = self.table(&["slot_upgrades"], "slot_upgrades_json")?;

        let upgrades: Vec<SlotUpgrade> = table
            .values()
            .into_iter()
            .filter(|item| item.is_map())
            .map(|item| SlotUpgrade {
                slot: item.get("slot").and_then(RawValue::as_f64).map(to_count).unwrap_or(0),
                slot_name: item.get("slot_name").and_then(RawValue::as_str).unwrap_or(""),
                track: item.get("track").and_then(RawValue::as_str).unwrap_or(""),
                current: item.get("current").and_then(RawValue::as_f64).map(to_count).unwrap_or(0),
                max: item.get("max").and_then(RawValue::as_f64).map(to_count).unwrap_or(0),
            })
            .filter(|upgrade| upgrade.slot > 0 && !upgrade.track.is_empty())
            .collect();

        if upgrades.is_empty() {
            return None;
        }
        serde_json::to_string(&upgrades).ok()
    }

    /// `[i, ...]` of the numeric values in a list of slot indices.
    fn index_list(&mut self, path: &[&str], field: &'static str) -> Option<String> {
        let table = self.table(path, field)?;

        let slots: Vec<i32> = table
            .values()
            .into_iter()
            .filter_map(RawValue::as_f64)
            .map(to_count)
            .collect();

        if slots.is_empty() {
            return None;
        }
        serde_json::to_string(&slots).ok()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Thursday 2024-12-26, inside period 20241224.
    fn parser() -> AddonParser {
        AddonParser::at(Utc.with_ymd_and_hms(2024, 12, 26, 12, 0, 0).unwrap())
    }

    fn parse(text: &str) -> (ParseResult, Vec<Diagnostic>) {
        let mut sink = Vec::new();
        let result = parser().parse_content(text, &mut sink);
        (result, sink)
    }

    fn only_character(text: &str) -> CharacterRecord {
        let (result, _) = parse(text);
        assert_eq!(result.characters.len(), 1, "{:?}", result);
        result.characters.into_iter().next().unwrap()
    }

    const FULL_EXPORT: &str = r#"
WoWStatTrackerDB = {
    ["metadata"] = { ["version"] = "1.2.0" },
    ["characters"] = {
        ["Hero-Stormrage"] = {
            ["guild"] = "Night Watch",
            ["item_level"] = 701.6,
            ["heroic_items"] = 6,
            ["champion_items"] = 8,
            ["veteran_items"] = 2,
            ["adventure_items"] = 0,
            ["old_items"] = 1,
            ["vault_visited"] = false,
            ["gearing_up"] = false,
            ["quests"] = true,
            ["vault_delves"] = { ["count"] = 3, ["tiers"] = { [1] = 8, [2] = 5 } },
            ["vault_dungeons"] = { ["count"] = 8, ["levels"] = { 10, 9, 2 } },
            ["gilded_stash"] = { ["claimed"] = 2 },
            ["timewalking_quest"] = { ["completed"] = false, ["progress"] = 3 },
            ["upgrade_current"] = 44,
            ["upgrade_max"] = 64,
            ["socket_info"] = {
                ["socketable_count"] = 3,
                ["socketed_count"] = 1,
                ["empty_count"] = 1,
                ["missing_sockets"] = { 2, 11 },
                ["empty_sockets"] = { 15 },
            },
            ["enchant_info"] = {
                ["enchantable_count"] = 8,
                ["enchant_count"] = 7,
                ["missing_enchants"] = { 5 },
            },
            ["slot_upgrades"] = {
                { ["slot"] = 1, ["slot_name"] = "Head", ["track"] = "Hero", ["current"] = 4, ["max"] = 6 },
                { ["slot"] = 0, ["slot_name"] = "Ignored", ["track"] = "Hero", ["current"] = 1, ["max"] = 6 },
                { ["slot"] = 3, ["slot_name"] = "Shoulder", ["track"] = "", ["current"] = 1, ["max"] = 6 },
            },
            ["week_id"] = "20241224",
        },
    },
}
"#;

    #[test]
    fn test_full_export() {
        let (result, diagnostics) = parse(FULL_EXPORT);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(result.addon_version.as_deref(), Some("1.2.0"));
        assert_eq!(result.skipped, 0);
        assert_eq!(result.stale, 0);

        let c = &result.characters[0];
        assert_eq!(c.name, "Hero");
        assert_eq!(c.realm, "Stormrage");
        assert_eq!(c.guild, "Night Watch");
        assert_eq!(c.item_level, 701.6);
        assert_eq!(c.heroic_items, 6);
        assert_eq!(c.champion_items, 8);
        assert_eq!(c.veteran_items, 2);
        assert_eq!(c.old_items, 1);
        assert!(!c.vault_visited);
        assert!(c.quests);
        assert_eq!(c.delves, 3);
        assert_eq!(c.dungeons, 8);
        assert_eq!(c.vault_t8_plus, 3);
        assert_eq!(c.gilded_stash, 2);
        assert_eq!(c.timewalk, 3);
        assert_eq!(c.upgrade_current, 44);
        assert_eq!(c.upgrade_max, 64);
        assert_eq!(c.socket_missing_count, 2);
        assert_eq!(c.socket_empty_count, 1);
        assert_eq!(c.enchant_missing_count, 1);
        assert_eq!(
            c.slot_upgrades_json.as_deref(),
            Some(r#"[{"slot":1,"slot_name":"Head","track":"Hero","current":4,"max":6}]"#)
        );
        assert_eq!(c.missing_sockets_json.as_deref(), Some("[2,11]"));
        assert_eq!(c.empty_sockets_json.as_deref(), Some("[15]"));
        assert_eq!(c.missing_enchants_json.as_deref(), Some("[5]"));
        assert_eq!(c.week_id, "20241224");
        assert_eq!(c.notes, "");
    }

    #[test]
    fn test_gearing_up_is_not_double_counted() {
        let with_flag = only_character(
            r#"{ characters = { ["A-R"] = { gearing_up = true, vault_delves = { count = 5 } } } }"#,
        );
        assert_eq!(with_flag.delves, 4);

        let without_flag = only_character(
            r#"{ characters = { ["A-R"] = { gearing_up = false, vault_delves = { count = 5 } } } }"#,
        );
        assert_eq!(without_flag.delves, 5);

        let zero = only_character(
            r#"{ characters = { ["A-R"] = { gearing_up = true, vault_delves = { count = 0 } } } }"#,
        );
        assert_eq!(zero.delves, 0);
    }

    #[test]
    fn test_high_tier_count_across_sparse_maps() {
        let c = only_character(
            r#"{ characters = { ["A-R"] = {
                vault_delves = { tiers = { [2] = 8, [4] = 11 } },
                vault_dungeons = { levels = { [4] = 7 } },
            } } }"#,
        );
        assert_eq!(c.vault_t8_plus, 2);
    }

    #[test]
    fn test_timewalk_completed_is_max() {
        let c = only_character(
            r#"{ characters = { ["A-R"] = { timewalking_quest = { completed = true, progress = 2 } } } }"#,
        );
        assert_eq!(c.timewalk, MAX_TIMEWALK);
    }

    #[test]
    fn test_vault_visited_rule() {
        let claimed = only_character(r#"{ characters = { ["A-R"] = { vault_visited = true } } }"#);
        assert!(claimed.vault_visited);

        let nothing_left =
            only_character(r#"{ characters = { ["A-R"] = { vault_has_rewards = false } } }"#);
        assert!(nothing_left.vault_visited);

        let pending = only_character(
            r#"{ characters = { ["A-R"] = { vault_visited = false, vault_has_rewards = true } } }"#,
        );
        assert!(!pending.vault_visited);

        let unknown = only_character(r#"{ characters = { ["A-R"] = {} } }"#);
        assert!(!unknown.vault_visited);
    }

    #[test]
    fn test_invalid_input_yields_empty_result() {
        let (result, diagnostics) = parse("not valid {{{{");
        assert!(result.is_empty());
        assert_eq!(result.addon_version, None);
        assert!(matches!(diagnostics[0], Diagnostic::ParseFailure { .. }));

        let (result, _) = parse("");
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_metadata_still_extracts() {
        let (result, _) = parse(r#"{ characters = { ["A-R"] = {}, ["B-R"] = {} } }"#);
        assert_eq!(result.addon_version, None);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_key_splits_on_last_hyphen() {
        let c = only_character(r#"{ characters = { ["Tëst-Realm"] = {} } }"#);
        assert_eq!(c.name, "Tëst");
        assert_eq!(c.realm, "Realm");

        assert_eq!(split_character_key("A-B-C"), Some(("A-B", "C")));

        assert_eq!(split_character_key("Hero-Argent Dawn"), Some(("Hero", "Argent Dawn")));
        assert_eq!(split_character_key("NoHyphen"), None);
    }

    #[test]
    fn test_bad_entries_are_skipped_not_fatal() {
        let (result, diagnostics) = parse(
            r#"{ characters = {
                ["NoHyphen"] = {},
                ["Good-Realm"] = { guild = "G" },
                ["Scalar-Realm"] = 5,
                [7] = {},
            } }"#,
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.skipped, 3);
        assert_eq!(result.characters[0].guild, "G");
        assert_eq!(
            diagnostics
                .iter()
                .filter(|d| matches!(d, Diagnostic::EntrySkipped { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn test_mistyped_fields_default_individually() {
        let (result, diagnostics) = parse(
            r#"{ characters = { ["A-R"] = {
                guild = 12,
                item_level = "high",
                heroic_items = 4,
                vault_delves = 5,
                quests = "yes",
            } } }"#,
        );
        let c = &result.characters[0];
        assert_eq!(c.guild, "");
        assert_eq!(c.item_level, 0.0);
        assert_eq!(c.heroic_items, 4);
        assert_eq!(c.delves, 0);
        assert!(!c.quests);

        let defaulted: Vec<&str> = diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::FieldDefaulted { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert!(defaulted.contains(&"guild"));
        assert!(defaulted.contains(&"item_level"));
        assert!(defaulted.contains(&"delves"));
        assert!(defaulted.contains(&"quests"));
    }

    #[test]
    fn test_numbers_truncate_toward_zero() {
        let c = only_character(
            r#"{ characters = { ["A-R"] = { heroic_items = 3.9, upgrade_current = -2.7 } } }"#,
        );
        assert_eq!(c.heroic_items, 3);
        assert_eq!(c.upgrade_current, -2);
    }

    #[test]
    fn test_empty_detail_tables_are_null_blobs() {
        let c = only_character(
            r#"{ characters = { ["A-R"] = {
                socket_info = { missing_sockets = {} },
                enchant_info = {},
                slot_upgrades = { { slot = 0, track = "Hero" } },
            } } }"#,
        );
        assert_eq!(c.missing_sockets_json, None);
        assert_eq!(c.empty_sockets_json, None);
        assert_eq!(c.missing_enchants_json, None);
        assert_eq!(c.slot_upgrades_json, None);
    }

    #[test]
    fn test_week_id_from_timestamp_and_stale_count() {
        let (result, _) = parse(
            r#"{ characters = {
                ["Fresh-R"] = { timestamp = 1735056000 },
                ["Old-R"] = { timestamp = 1735034400 },
                ["Tagged-R"] = { week_id = "20241210", timestamp = 1735056000 },
                ["Untagged-R"] = {},
            } }"#,
        );
        let week = |name: &str| {
            result
                .characters
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.week_id.clone())
                .unwrap()
        };
        assert_eq!(week("Fresh"), "20241224");
        assert_eq!(week("Old"), "20241217");
        assert_eq!(week("Tagged"), "20241210");
        assert_eq!(week("Untagged"), "");
        assert_eq!(result.stale, 2);
    }

    #[test]
    fn test_parse_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WoWStatTracker_Addon.lua");
        std::fs::write(&path, FULL_EXPORT).unwrap();

        let result = parser().parse_file(&path, &mut Vec::new()).unwrap();
        assert_eq!(result.len(), 1);

        let missing = parser().parse_file(&dir.path().join("nope.lua"), &mut Vec::new());
        assert!(missing.is_err());
    }
}
