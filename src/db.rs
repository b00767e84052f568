// 🗄️ SQLite persistence: roster, settings, notification history, exports

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::io::Write;
use std::path::Path;

use crate::character::{CharacterRecord, Roster};
use crate::error::{Result, RosterError};
use crate::notification::{Notification, NotifyKind, MAX_NOTIFICATIONS};

/// Setting holding the last observed weekly period id.
pub const LAST_WEEK_ID_KEY: &str = "last_week_id";

/// Setting holding the game install directory used for addon discovery.
pub const WOW_PATH_KEY: &str = "wow_path";

const CHARACTER_COLUMNS: &str = "realm, name, guild, item_level,
    heroic_items, champion_items, veteran_items, adventure_items, old_items,
    vault_visited, delves, dungeons, vault_t8_plus, gilded_stash, gearing_up, quests, timewalk,
    upgrade_current, upgrade_max, socket_missing_count, socket_empty_count, enchant_missing_count,
    slot_upgrades_json, missing_sockets_json, empty_sockets_json, missing_enchants_json,
    week_id, notes";

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Characters Table (one row per resident record, id preserves roster order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS characters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            realm TEXT NOT NULL,
            name TEXT NOT NULL,
            guild TEXT NOT NULL DEFAULT '',
            item_level REAL NOT NULL DEFAULT 0,
            heroic_items INTEGER NOT NULL DEFAULT 0,
            champion_items INTEGER NOT NULL DEFAULT 0,
            veteran_items INTEGER NOT NULL DEFAULT 0,
            adventure_items INTEGER NOT NULL DEFAULT 0,
            old_items INTEGER NOT NULL DEFAULT 0,
            vault_visited INTEGER NOT NULL DEFAULT 0,
            delves INTEGER NOT NULL DEFAULT 0,
            dungeons INTEGER NOT NULL DEFAULT 0,
            vault_t8_plus INTEGER NOT NULL DEFAULT 0,
            gilded_stash INTEGER NOT NULL DEFAULT 0,
            gearing_up INTEGER NOT NULL DEFAULT 0,
            quests INTEGER NOT NULL DEFAULT 0,
            timewalk INTEGER NOT NULL DEFAULT 0,
            upgrade_current INTEGER NOT NULL DEFAULT 0,
            upgrade_max INTEGER NOT NULL DEFAULT 0,
            socket_missing_count INTEGER NOT NULL DEFAULT 0,
            socket_empty_count INTEGER NOT NULL DEFAULT 0,
            enchant_missing_count INTEGER NOT NULL DEFAULT 0,
            slot_upgrades_json TEXT,
            missing_sockets_json TEXT,
            empty_sockets_json TEXT,
            missing_enchants_json TEXT,
            week_id TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            UNIQUE(realm, name)
        )",
        [],
    )?;

    // ==========================================================================
    // Settings Table (key/value control state)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Notifications Table (history, newest = highest seq)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            kind TEXT NOT NULL,
            message TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROSTER
// ============================================================================

fn row_to_character(row: &Row) -> rusqlite::Result<CharacterRecord> {
    Ok(CharacterRecord {
        realm: row.get(0)?,
        name: row.get(1)?,
        guild: row.get(2)?,
        item_level: row.get(3)?,
        heroic_items: row.get(4)?,
        champion_items: row.get(5)?,
        veteran_items: row.get(6)?,
        adventure_items: row.get(7)?,
        old_items: row.get(8)?,
        vault_visited: row.get(9)?,
        delves: row.get(10)?,
        dungeons: row.get(11)?,
        vault_t8_plus: row.get(12)?,
        gilded_stash: row.get(13)?,
        gearing_up: row.get(14)?,
        quests: row.get(15)?,
        timewalk: row.get(16)?,
        upgrade_current: row.get(17)?,
        upgrade_max: row.get(18)?,
        socket_missing_count: row.get(19)?,
        socket_empty_count: row.get(20)?,
        enchant_missing_count: row.get(21)?,
        slot_upgrades_json: row.get(22)?,
        missing_sockets_json: row.get(23)?,
        empty_sockets_json: row.get(24)?,
        missing_enchants_json: row.get(25)?,
        week_id: row.get(26)?,
        notes: row.get(27)?,
    })
}

/// Load every resident record in roster order.
pub fn load_roster(conn: &Connection) -> Result<Roster> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM characters ORDER BY id",
        CHARACTER_COLUMNS
    ))?;

    let characters = stmt
        .query_map([], row_to_character)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Roster::from_records(characters))
}

/// Columns an existing row takes from the roster on save. `notes` is not
/// among them: once a row exists only `set_notes` writes it.
const UPSERT_ASSIGNMENTS: &str = "guild = excluded.guild,
    item_level = excluded.item_level,
    heroic_items = excluded.heroic_items,
    champion_items = excluded.champion_items,
    veteran_items = excluded.veteran_items,
    adventure_items = excluded.adventure_items,
    old_items = excluded.old_items,
    vault_visited = excluded.vault_visited,
    delves = excluded.delves,
    dungeons = excluded.dungeons,
    vault_t8_plus = excluded.vault_t8_plus,
    gilded_stash = excluded.gilded_stash,
    gearing_up = excluded.gearing_up,
    quests = excluded.quests,
    timewalk = excluded.timewalk,
    upgrade_current = excluded.upgrade_current,
    upgrade_max = excluded.upgrade_max,
    socket_missing_count = excluded.socket_missing_count,
    socket_empty_count = excluded.socket_empty_count,
    enchant_missing_count = excluded.enchant_missing_count,
    slot_upgrades_json = excluded.slot_upgrades_json,
    missing_sockets_json = excluded.missing_sockets_json,
    empty_sockets_json = excluded.empty_sockets_json,
    missing_enchants_json = excluded.missing_enchants_json,
    week_id = excluded.week_id";

/// Make the stored roster match `roster`.
///
/// Rows whose identity is gone are deleted, the rest are upserted on
/// `(realm, name)`. Stored notes of existing rows are kept. Runs in one
/// transaction: either the whole new roster is visible or the previous
/// one is left untouched.
pub fn save_roster(conn: &Connection, roster: &Roster) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let stored = {
        let mut stmt = tx.prepare("SELECT realm, name FROM characters")?;
        let identities = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        identities
    };

    let mut removed = 0;
    for (realm, name) in stored {
        if roster.find(&realm, &name).is_none() {
            removed += tx.execute(
                "DELETE FROM characters WHERE realm = ?1 AND name = ?2",
                params![realm, name],
            )?;
        }
    }

    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO characters ({}) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
            )
            ON CONFLICT(realm, name) DO UPDATE SET {}",
            CHARACTER_COLUMNS, UPSERT_ASSIGNMENTS
        ))?;

        for c in roster.iter() {
            stmt.execute(params![
                c.realm,
                c.name,
                c.guild,
                c.item_level,
                c.heroic_items,
                c.champion_items,
                c.veteran_items,
                c.adventure_items,
                c.old_items,
                c.vault_visited,
                c.delves,
                c.dungeons,
                c.vault_t8_plus,
                c.gilded_stash,
                c.gearing_up,
                c.quests,
                c.timewalk,
                c.upgrade_current,
                c.upgrade_max,
                c.socket_missing_count,
                c.socket_empty_count,
                c.enchant_missing_count,
                c.slot_upgrades_json,
                c.missing_sockets_json,
                c.empty_sockets_json,
                c.missing_enchants_json,
                c.week_id,
                c.notes,
            ])?;
        }
    }
    tx.commit()?;

    tracing::debug!(characters = roster.len(), removed, "roster saved");
    Ok(roster.len())
}

/// Delete one stored character, notes included.
pub fn delete_character(conn: &Connection, realm: &str, name: &str) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM characters WHERE realm = ?1 AND name = ?2",
        params![realm, name],
    )?;

    if changed == 0 {
        return Err(RosterError::CharacterNotFound {
            realm: realm.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Write a character's notes directly, bypassing import.
pub fn set_notes(conn: &Connection, realm: &str, name: &str, notes: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE characters SET notes = ?1 WHERE realm = ?2 AND name = ?3",
        params![notes, realm, name],
    )?;

    if changed == 0 {
        return Err(RosterError::CharacterNotFound {
            realm: realm.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SETTINGS
// ============================================================================

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Append to the history, dropping the oldest entries beyond the cap.
pub fn insert_notification(conn: &Connection, notification: &Notification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, timestamp, kind, message) VALUES (?1, ?2, ?3, ?4)",
        params![
            notification.id,
            notification.timestamp.to_rfc3339(),
            notification.kind.as_str(),
            notification.message,
        ],
    )?;

    prune_notifications(conn, MAX_NOTIFICATIONS)?;
    Ok(())
}

/// Keep only the newest `keep` notifications. Returns how many were removed.
pub fn prune_notifications(conn: &Connection, keep: usize) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM notifications WHERE seq NOT IN (
            SELECT seq FROM notifications ORDER BY seq DESC LIMIT ?1
        )",
        params![keep as i64],
    )?;
    Ok(removed)
}

/// Newest first.
pub fn get_recent_notifications(conn: &Connection, limit: usize) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, kind, message
         FROM notifications
         ORDER BY seq DESC
         LIMIT ?1",
    )?;

    let notifications = stmt
        .query_map(params![limit as i64], |row| {
            let timestamp_str: String = row.get(1)?;
            let kind_str: String = row.get(2)?;

            Ok(Notification {
                id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc),
                kind: NotifyKind::parse(&kind_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        Type::Text,
                        format!("unknown notification kind '{}'", kind_str).into(),
                    )
                })?,
                message: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(notifications)
}

pub fn count_notifications(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?;
    Ok(count)
}

/// Remove one notification by id. Returns whether it existed.
pub fn remove_notification(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

/// Empty the history. Returns how many were removed.
pub fn clear_notifications(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM notifications", [])?;
    Ok(removed)
}

// ============================================================================
// EXPORTS
// ============================================================================

/// Write into a temp file beside `path`, then rename over it.
fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut tempfile::NamedTempFile) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    fill(&mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Export the roster as a JSON array of character objects.
pub fn export_json(roster: &Roster, path: &Path) -> Result<()> {
    write_atomically(path, |tmp| {
        serde_json::to_writer_pretty(&mut *tmp, roster)?;
        tmp.write_all(b"\n")?;
        Ok(())
    })
}

/// Export the roster as CSV with one header row of field names.
pub fn export_csv(roster: &Roster, path: &Path) -> Result<()> {
    write_atomically(path, |tmp| {
        let mut wtr = csv::Writer::from_writer(&mut *tmp);
        for character in roster.iter() {
            wtr.serialize(character)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

// ============================================================================
// TESTS
// ============================================================================
