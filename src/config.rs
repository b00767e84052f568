// 📁 Paths: database location, game install detection, addon file discovery

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RosterError};

pub const APP_DIR_NAME: &str = "wowstat";
pub const DB_FILE_NAME: &str = "wowstat.db";
pub const ADDON_FILE_NAME: &str = "WoWStatTracker_Addon.lua";

/// Subdirectory that marks a game install.
const RETAIL_DIR: &str = "_retail_";

/// `<config_dir>/wowstat/wowstat.db`, or `./wowstat.db` when the platform
/// has no config directory.
pub fn default_db_path() -> PathBuf {
    match dirs::config_dir() {
        Some(base) => base.join(APP_DIR_NAME).join(DB_FILE_NAME),
        None => PathBuf::from(DB_FILE_NAME),
    }
}

/// Create the directory a file will live in.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// ============================================================================
// GAME INSTALL
// ============================================================================

/// Usual install locations for the current platform.
pub fn default_wow_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/Applications/World of Warcraft"));
        paths.push(PathBuf::from("/Applications/Games/World of Warcraft"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Applications/World of Warcraft"));
        }
    } else if cfg!(target_os = "windows") {
        paths.push(PathBuf::from("C:/Program Files (x86)/World of Warcraft"));
        paths.push(PathBuf::from("C:/Program Files/World of Warcraft"));
        paths.push(PathBuf::from("D:/World of Warcraft"));
        paths.push(PathBuf::from("D:/Games/World of Warcraft"));
    } else if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".wine/drive_c/Program Files (x86)/World of Warcraft"));
        paths.push(
            home.join("Games/world-of-warcraft/drive_c/Program Files (x86)/World of Warcraft"),
        );
    }

    paths
}

pub fn is_wow_install(path: &Path) -> bool {
    path.join(RETAIL_DIR).is_dir()
}

/// First default location that looks like a game install.
pub fn detect_wow_path() -> Option<PathBuf> {
    default_wow_paths().into_iter().find(|p| is_wow_install(p))
}

// ============================================================================
// ADDON FILE DISCOVERY
// ============================================================================

/// Find `<wow>/_retail_/WTF/Account/<account>/SavedVariables/WoWStatTracker_Addon.lua`.
///
/// Accounts are tried in name order; dot-directories are skipped. The
/// first account holding the file wins.
pub fn find_addon_file(wow_path: &Path) -> Result<PathBuf> {
    let accounts_dir = wow_path.join(RETAIL_DIR).join("WTF").join("Account");
    let not_found = || RosterError::AddonFileNotFound(wow_path.to_path_buf());

    let entries = match fs::read_dir(&accounts_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let mut accounts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    accounts.sort();

    accounts
        .into_iter()
        .map(|account| account.join("SavedVariables").join(ADDON_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(not_found)
}
