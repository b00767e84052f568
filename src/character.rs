// 🧙 Character records and the resident roster
//
// Identity is (realm, name), compared exactly. Every other field is a
// value that import may replace, except `notes`, which belongs to the user.

use serde::{Deserialize, Serialize};

/// Maximum timewalking progress; a completed quest reports this value.
pub const MAX_TIMEWALK: i32 = 5;

// ============================================================================
// CHARACTER RECORD
// ============================================================================

/// One tracked character. Field names match the persisted column names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterRecord {
    // Identity
    pub realm: String,
    pub name: String,

    // Gear
    pub guild: String,
    pub item_level: f64,
    pub heroic_items: i32,
    pub champion_items: i32,
    pub veteran_items: i32,
    pub adventure_items: i32,
    pub old_items: i32,

    // Weekly progress (cleared at reset)
    pub vault_visited: bool,
    pub delves: i32,
    pub gilded_stash: i32,
    pub gearing_up: bool,
    pub quests: bool,
    pub timewalk: i32,

    // Vault slots as last reported; only import refreshes these
    pub dungeons: i32,
    pub vault_t8_plus: i32,

    // Upgrade track and gem/enchant audit
    pub upgrade_current: i32,
    pub upgrade_max: i32,
    pub socket_missing_count: i32,
    pub socket_empty_count: i32,
    pub enchant_missing_count: i32,

    /// Per-slot detail blobs. `None` means the addon sent nothing.
    pub slot_upgrades_json: Option<String>,
    pub missing_sockets_json: Option<String>,
    pub empty_sockets_json: Option<String>,
    pub missing_enchants_json: Option<String>,

    /// Weekly period the addon collected this data in.
    pub week_id: String,

    /// Free text owned by the user. Import never writes it.
    pub notes: String,
}

impl CharacterRecord {
    pub fn new(realm: impl Into<String>, name: impl Into<String>) -> Self {
        CharacterRecord {
            realm: realm.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// `"Name-Realm"`, the addon's key format.
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.realm)
    }

    pub fn is_same_character(&self, realm: &str, name: &str) -> bool {
        self.realm == realm && self.name == name
    }

    /// Both identity parts present.
    pub fn has_identity(&self) -> bool {
        !self.realm.is_empty() && !self.name.is_empty()
    }

    /// Clear the weekly progress fields back to their defaults.
    pub fn reset_weekly(&mut self) {
        self.vault_visited = false;
        self.delves = 0;
        self.gilded_stash = 0;
        self.gearing_up = false;
        self.quests = false;
        self.timewalk = 0;
    }

    /// True when every weekly field is at its default.
    pub fn weekly_is_clear(&self) -> bool {
        let mut cleared = self.clone();
        cleared.reset_weekly();
        cleared == *self
    }

    /// Overwrite every field except `notes` with the incoming values.
    ///
    /// Returns whether anything differed. The comparison is over the whole
    /// record with our notes substituted in, so it covers exactly the set
    /// of fields being overwritten.
    pub fn absorb(&mut self, incoming: &CharacterRecord) -> bool {
        let mut next = incoming.clone();
        next.notes = self.notes.clone();

        let changed = *self != next;
        *self = next;
        changed
    }
}

// ============================================================================
// ROSTER
// ============================================================================

/// The long-lived, ordered collection of resident characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    characters: Vec<CharacterRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Roster::default()
    }

    pub fn from_records(characters: Vec<CharacterRecord>) -> Self {
        Roster { characters }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn records(&self) -> &[CharacterRecord] {
        &self.characters
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterRecord> {
        self.characters.iter()
    }

    /// Position of the record with this exact identity.
    pub fn find(&self, realm: &str, name: &str) -> Option<usize> {
        self.characters
            .iter()
            .position(|c| c.is_same_character(realm, name))
    }

    pub fn get(&self, realm: &str, name: &str) -> Option<&CharacterRecord> {
        self.find(realm, name).map(|i| &self.characters[i])
    }

    pub fn get_mut(&mut self, realm: &str, name: &str) -> Option<&mut CharacterRecord> {
        self.find(realm, name).map(move |i| &mut self.characters[i])
    }

    pub fn push(&mut self, record: CharacterRecord) {
        self.characters.push(record);
    }

    pub fn remove(&mut self, realm: &str, name: &str) -> Option<CharacterRecord> {
        self.find(realm, name).map(|i| self.characters.remove(i))
    }

    /// Clear weekly fields on every record. Returns how many records had
    /// something to clear.
    pub fn reset_weekly_all(&mut self) -> usize {
        let mut touched = 0;
        for character in &mut self.characters {
            if !character.weekly_is_clear() {
                touched += 1;
            }
            character.reset_weekly();
        }
        touched
    }
}

// ============================================================================
// TESTS
// ============================================================================
