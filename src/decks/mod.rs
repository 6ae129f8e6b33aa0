//! Deck tree
//!
//! An arena of decks and deck configs indexed by id. Lookups hand out shared
//! references or clones; every mutation goes through a method that records
//! the touched id, so the collection can write back exactly what changed when
//! its transaction finishes.
//!
//! Operations that also touch cards (removing a deck, emptying a filtered
//! deck) live on the collection, which uses the primitives here.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::errors::{SchedError, SchedResult};
use crate::models::{
    DECK_SEPARATOR, DEFAULT_CONFIG_ID, DEFAULT_DECK_ID, Deck, DeckConfig, DeckConfigId, DeckId,
    DeckKind,
};

/// Time and sync stamp applied to created or modified entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub now_ms: i64,
    pub usn: i32,
}

impl Stamp {
    pub fn mtime(&self) -> i64 {
        self.now_ms.div_euclid(1000)
    }
}

/// Entries modified since the last flush
#[derive(Debug, Default)]
pub struct DeckChanges {
    pub decks: Vec<Deck>,
    pub removed_decks: Vec<DeckId>,
    pub configs: Vec<DeckConfig>,
    pub removed_configs: Vec<DeckConfigId>,
}

impl DeckChanges {
    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
            && self.removed_decks.is_empty()
            && self.configs.is_empty()
            && self.removed_configs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DeckManager {
    decks: BTreeMap<DeckId, Deck>,
    configs: BTreeMap<DeckConfigId, DeckConfig>,
    dirty_decks: BTreeSet<DeckId>,
    removed_decks: BTreeSet<DeckId>,
    dirty_configs: BTreeSet<DeckConfigId>,
    removed_configs: BTreeSet<DeckConfigId>,
    last_id: i64,
}

/// Cleans up a user-supplied deck name
///
/// Quotes are dropped, each level is trimmed and empty levels are removed.
///
/// ### Errors
///
/// Returns `InvalidDeckName` if nothing is left
pub fn normalize_name(name: &str) -> SchedResult<String> {
    let cleaned = name.replace('"', "");
    let parts: Vec<&str> = cleaned
        .split(DECK_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(SchedError::InvalidDeckName(name.to_string()));
    }
    Ok(parts.join(DECK_SEPARATOR))
}

/// Parent path of a deck name
pub fn parent_of(name: &str) -> Option<&str> {
    name.rfind(DECK_SEPARATOR).map(|idx| &name[..idx])
}

/// Last level of a deck name
pub fn basename_of(name: &str) -> &str {
    name.rsplit(DECK_SEPARATOR).next().unwrap_or(name)
}

/// True if `descendant` is nested somewhere below `ancestor`
pub fn is_descendant(descendant: &str, ancestor: &str) -> bool {
    descendant.len() > ancestor.len() + DECK_SEPARATOR.len()
        && descendant.starts_with(ancestor)
        && descendant[ancestor.len()..].starts_with(DECK_SEPARATOR)
}

impl DeckManager {
    /// Builds the arena from stored entries
    ///
    /// The default deck and default config are created (and marked dirty)
    /// when they are missing.
    pub fn load(decks: Vec<Deck>, configs: Vec<DeckConfig>, stamp: Stamp) -> Self {
        let mut manager = Self::default();
        for deck in decks {
            manager.last_id = manager.last_id.max(deck.id);
            manager.decks.insert(deck.id, deck);
        }
        for conf in configs {
            manager.last_id = manager.last_id.max(conf.id);
            manager.configs.insert(conf.id, conf);
        }
        if !manager.configs.contains_key(&DEFAULT_CONFIG_ID) {
            let mut conf = DeckConfig::default();
            conf.id = DEFAULT_CONFIG_ID;
            conf.mtime = stamp.mtime();
            conf.usn = stamp.usn;
            manager.configs.insert(DEFAULT_CONFIG_ID, conf);
            manager.dirty_configs.insert(DEFAULT_CONFIG_ID);
        }
        if !manager.decks.contains_key(&DEFAULT_DECK_ID) {
            let mut deck = Deck::new_normal("Default");
            deck.id = DEFAULT_DECK_ID;
            deck.mtime = stamp.mtime();
            deck.usn = stamp.usn;
            manager.decks.insert(DEFAULT_DECK_ID, deck);
            manager.dirty_decks.insert(DEFAULT_DECK_ID);
        }
        manager
    }

    fn next_id(&mut self, now_ms: i64) -> i64 {
        self.last_id = now_ms.max(self.last_id + 1);
        self.last_id
    }

    pub fn get(&self, deck_id: DeckId) -> Option<&Deck> {
        self.decks.get(&deck_id)
    }

    pub fn contains(&self, deck_id: DeckId) -> bool {
        self.decks.contains_key(&deck_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Deck> {
        self.decks.values()
    }

    pub fn all_ids(&self) -> Vec<DeckId> {
        self.decks.keys().copied().collect()
    }

    /// Every deck sorted by name
    pub fn all_sorted(&self) -> Vec<&Deck> {
        let mut decks: Vec<&Deck> = self.decks.values().collect();
        decks.sort_by(|a, b| a.name.cmp(&b.name));
        decks
    }

    pub fn name(&self, deck_id: DeckId) -> Option<&str> {
        self.decks.get(&deck_id).map(|d| d.name.as_str())
    }

    /// Case-insensitive lookup by full name
    pub fn by_name(&self, name: &str) -> Option<&Deck> {
        let lowered = name.to_lowercase();
        self.decks.values().find(|d| d.name.to_lowercase() == lowered)
    }

    pub fn is_filtered(&self, deck_id: DeckId) -> bool {
        self.decks.get(&deck_id).is_some_and(Deck::is_filtered)
    }

    /// Applies a change to a deck and records it for write-back
    ///
    /// ### Errors
    ///
    /// Returns `DeckNotFound` if the deck does not exist
    pub fn update_deck<R>(&mut self, deck_id: DeckId, stamp: Stamp, f: impl FnOnce(&mut Deck) -> R) -> SchedResult<R> {
        let deck = self.decks.get_mut(&deck_id).ok_or(SchedError::DeckNotFound(deck_id))?;
        let result = f(deck);
        deck.mtime = stamp.mtime();
        deck.usn = stamp.usn;
        self.dirty_decks.insert(deck_id);
        Ok(result)
    }

    /// Looks up a deck by name, optionally creating it and any missing parents
    ///
    /// ### Returns
    ///
    /// The deck id, or `None` if the deck does not exist and `create` is false
    ///
    /// ### Errors
    ///
    /// Returns `InvalidDeckName` for an empty name, or `FilteredDeckNesting`
    /// if a parent is a filtered deck
    pub fn id(&mut self, name: &str, create: bool, stamp: Stamp) -> SchedResult<Option<DeckId>> {
        let name = normalize_name(name)?;
        if let Some(deck) = self.by_name(&name) {
            return Ok(Some(deck.id));
        }
        if !create {
            return Ok(None);
        }
        let name = self.ensure_parents(&name, stamp)?;
        let id = self.insert(Deck::new_normal(&name), stamp);
        Ok(Some(id))
    }

    /// Creates a new filtered deck
    ///
    /// ### Errors
    ///
    /// Returns `DeckExists` if the name is taken
    pub fn add_filtered(&mut self, name: &str, stamp: Stamp) -> SchedResult<DeckId> {
        let name = normalize_name(name)?;
        if self.by_name(&name).is_some() {
            return Err(SchedError::DeckExists(name));
        }
        let name = self.ensure_parents(&name, stamp)?;
        let id = self.insert(Deck::new_filtered(&name), stamp);
        info!(deck_id = id, "Created filtered deck '{}'", name);
        Ok(id)
    }

    fn insert(&mut self, mut deck: Deck, stamp: Stamp) -> DeckId {
        let id = self.next_id(stamp.now_ms);
        deck.id = id;
        deck.mtime = stamp.mtime();
        deck.usn = stamp.usn;
        debug!(deck_id = id, "Created deck '{}'", deck.name);
        self.decks.insert(id, deck);
        self.dirty_decks.insert(id);
        id
    }

    /// Makes sure every ancestor of `name` exists
    ///
    /// ### Returns
    ///
    /// The name with its parent levels spelled the way the existing decks spell them
    fn ensure_parents(&mut self, name: &str, stamp: Stamp) -> SchedResult<String> {
        let levels: Vec<&str> = name.split(DECK_SEPARATOR).collect();
        if levels.len() < 2 {
            return Ok(name.to_string());
        }
        let mut path = String::new();
        for level in &levels[..levels.len() - 1] {
            if !path.is_empty() {
                path.push_str(DECK_SEPARATOR);
            }
            path.push_str(level);
            match self.by_name(&path) {
                Some(existing) if existing.is_filtered() => {
                    return Err(SchedError::FilteredDeckNesting(existing.name.clone()));
                }
                Some(existing) => path = existing.name.clone(),
                None => {
                    self.insert(Deck::new_normal(&path), stamp);
                }
            }
        }
        Ok(format!("{}{}{}", path, DECK_SEPARATOR, levels[levels.len() - 1]))
    }

    /// Renames a deck, carrying its descendants along
    ///
    /// ### Errors
    ///
    /// Returns `DeckExists` if another deck has the target name,
    /// `InvalidDeckName` if the deck would be moved below itself, or
    /// `FilteredDeckNesting` if the new parent is a filtered deck
    pub fn rename(&mut self, deck_id: DeckId, new_name: &str, stamp: Stamp) -> SchedResult<()> {
        let old_name = self.name(deck_id).ok_or(SchedError::DeckNotFound(deck_id))?.to_string();
        let new_name = normalize_name(new_name)?;
        if let Some(existing) = self.by_name(&new_name) {
            if existing.id != deck_id {
                return Err(SchedError::DeckExists(new_name));
            }
        }
        if is_descendant(&new_name.to_lowercase(), &old_name.to_lowercase()) {
            return Err(SchedError::InvalidDeckName(new_name));
        }
        if let Some(parent) = parent_of(&new_name) {
            if let Some(parent_deck) = self.by_name(parent) {
                if parent_deck.is_filtered() {
                    return Err(SchedError::FilteredDeckNesting(parent_deck.name.clone()));
                }
            }
        }
        let new_name = self.ensure_parents(&new_name, stamp)?;

        let prefix = format!("{}{}", old_name, DECK_SEPARATOR);
        let children: Vec<DeckId> = self
            .decks
            .values()
            .filter(|d| d.name.starts_with(&prefix))
            .map(|d| d.id)
            .collect();
        for child in children {
            self.update_deck(child, stamp, |d| {
                d.name = format!("{}{}{}", new_name, DECK_SEPARATOR, &d.name[prefix.len()..]);
            })?;
        }
        self.update_deck(deck_id, stamp, |d| d.name = new_name.clone())?;
        info!(deck_id, "Renamed deck '{}' to '{}'", old_name, new_name);
        Ok(())
    }

    /// Moves a deck below another deck, or to the top level when `onto` is `None`
    ///
    /// Dropping a deck onto itself, its own parent, or one of its descendants
    /// does nothing.
    pub fn rename_for_drag_and_drop(&mut self, dragged: DeckId, onto: Option<DeckId>, stamp: Stamp) -> SchedResult<()> {
        let dragged_name = self.name(dragged).ok_or(SchedError::DeckNotFound(dragged))?.to_string();
        let base = basename_of(&dragged_name).to_string();
        match onto {
            None => {
                if parent_of(&dragged_name).is_some() {
                    self.rename(dragged, &base, stamp)?;
                }
                Ok(())
            }
            Some(onto) => {
                let onto_name = self.name(onto).ok_or(SchedError::DeckNotFound(onto))?.to_string();
                let is_parent = parent_of(&dragged_name) == Some(onto_name.as_str());
                if dragged_name == onto_name || is_parent || is_descendant(&onto_name, &dragged_name) {
                    return Ok(());
                }
                self.rename(dragged, &format!("{}{}{}", onto_name, DECK_SEPARATOR, base), stamp)
            }
        }
    }

    /// Drops a deck from the arena; cards are the caller's concern
    pub fn remove_entry(&mut self, deck_id: DeckId) -> Option<Deck> {
        let removed = self.decks.remove(&deck_id);
        if removed.is_some() {
            self.dirty_decks.remove(&deck_id);
            self.removed_decks.insert(deck_id);
        }
        removed
    }

    /// All descendants of a deck as `(name, id)`, sorted by name
    pub fn children(&self, deck_id: DeckId) -> Vec<(String, DeckId)> {
        let Some(name) = self.name(deck_id) else {
            return Vec::new();
        };
        let mut result: Vec<(String, DeckId)> = self
            .decks
            .values()
            .filter(|d| is_descendant(&d.name, name))
            .map(|d| (d.name.clone(), d.id))
            .collect();
        result.sort();
        result
    }

    pub fn child_ids(&self, deck_id: DeckId) -> Vec<DeckId> {
        self.children(deck_id).into_iter().map(|(_, id)| id).collect()
    }

    /// The deck followed by all of its descendants
    pub fn deck_and_child_ids(&self, deck_id: DeckId) -> Vec<DeckId> {
        let mut ids = vec![deck_id];
        ids.extend(self.child_ids(deck_id));
        ids
    }

    /// Ancestors of a deck, outermost first
    ///
    /// Ancestors missing from the arena are skipped.
    pub fn parents(&self, deck_id: DeckId) -> Vec<&Deck> {
        let Some(name) = self.name(deck_id) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut path = String::new();
        let levels: Vec<&str> = name.split(DECK_SEPARATOR).collect();
        for level in &levels[..levels.len().saturating_sub(1)] {
            if !path.is_empty() {
                path.push_str(DECK_SEPARATOR);
            }
            path.push_str(level);
            if let Some(parent) = self.decks.values().find(|d| d.name == path) {
                result.push(parent);
            }
        }
        result
    }

    pub fn parent_ids(&self, deck_id: DeckId) -> Vec<DeckId> {
        self.parents(deck_id).iter().map(|d| d.id).collect()
    }

    /// Toggles the collapsed state of a deck in the tree
    pub fn collapse(&mut self, deck_id: DeckId, stamp: Stamp) -> SchedResult<bool> {
        self.update_deck(deck_id, stamp, |d| {
            d.collapsed = !d.collapsed;
            d.collapsed
        })
    }

    /// Resets stale per-day counters on every deck
    ///
    /// The decks are not marked for write-back; counters are persisted the next
    /// time the deck is touched.
    pub fn roll_over(&mut self, today: i64) {
        for deck in self.decks.values_mut() {
            deck.roll_over(today);
        }
    }

    pub fn config(&self, config_id: DeckConfigId) -> Option<&DeckConfig> {
        self.configs.get(&config_id)
    }

    pub fn all_configs(&self) -> impl Iterator<Item = &DeckConfig> {
        self.configs.values()
    }

    fn default_config(&self) -> DeckConfig {
        self.configs.get(&DEFAULT_CONFIG_ID).cloned().unwrap_or_else(|| DeckConfig {
            id: DEFAULT_CONFIG_ID,
            ..DeckConfig::default()
        })
    }

    /// Config governing a normal deck
    ///
    /// Falls back to the default config when the deck is missing, filtered, or
    /// refers to a config that no longer exists.
    pub fn config_for_deck(&self, deck_id: DeckId) -> DeckConfig {
        let conf_id = self.decks.get(&deck_id).and_then(Deck::config_id);
        match conf_id.and_then(|id| self.configs.get(&id)) {
            Some(conf) => conf.clone(),
            None => {
                if let Some(id) = conf_id {
                    warn!(deck_id, config_id = id, "Deck refers to a missing config, using default");
                }
                self.default_config()
            }
        }
    }

    /// Adds a config, copied from `clone_from` or from the defaults
    pub fn add_config(&mut self, name: &str, clone_from: Option<&DeckConfig>, stamp: Stamp) -> DeckConfigId {
        let id = self.next_id(stamp.now_ms);
        let mut conf = clone_from.cloned().unwrap_or_default();
        conf.id = id;
        conf.name = name.to_string();
        conf.mtime = stamp.mtime();
        conf.usn = stamp.usn;
        self.configs.insert(id, conf.validated());
        self.dirty_configs.insert(id);
        id
    }

    /// Replaces a config
    ///
    /// ### Errors
    ///
    /// Returns `ConfigNotFound` if no config has the given id
    pub fn update_config(&mut self, conf: DeckConfig, stamp: Stamp) -> SchedResult<()> {
        if !self.configs.contains_key(&conf.id) {
            return Err(SchedError::ConfigNotFound(conf.id));
        }
        let mut conf = conf.validated();
        conf.mtime = stamp.mtime();
        conf.usn = stamp.usn;
        self.dirty_configs.insert(conf.id);
        self.configs.insert(conf.id, conf);
        Ok(())
    }

    /// Removes a config; decks using it fall back to the default config
    ///
    /// ### Errors
    ///
    /// Returns `DefaultConfig` for config 1 and `ConfigNotFound` for unknown ids
    pub fn remove_config(&mut self, config_id: DeckConfigId, stamp: Stamp) -> SchedResult<()> {
        if config_id == DEFAULT_CONFIG_ID {
            return Err(SchedError::DefaultConfig);
        }
        if self.configs.remove(&config_id).is_none() {
            return Err(SchedError::ConfigNotFound(config_id));
        }
        self.dirty_configs.remove(&config_id);
        self.removed_configs.insert(config_id);
        for deck_id in self.dids_for_config(config_id) {
            self.set_config(deck_id, DEFAULT_CONFIG_ID, stamp)?;
        }
        info!(config_id, "Removed deck config");
        Ok(())
    }

    /// Points a normal deck at a config
    ///
    /// ### Errors
    ///
    /// Returns `DeckNotFound` or `ConfigNotFound` for unknown ids. Filtered
    /// decks are left untouched.
    pub fn set_config(&mut self, deck_id: DeckId, config_id: DeckConfigId, stamp: Stamp) -> SchedResult<()> {
        if !self.configs.contains_key(&config_id) {
            return Err(SchedError::ConfigNotFound(config_id));
        }
        let updated = self.update_deck(deck_id, stamp, |d| match &mut d.kind {
            DeckKind::Normal(normal) => {
                normal.conf = config_id;
                true
            }
            DeckKind::Filtered(_) => false,
        })?;
        if !updated {
            warn!(deck_id, "Filtered decks have no config to set");
        }
        Ok(())
    }

    /// Resets a config to the default values, keeping its id and name
    ///
    /// ### Returns
    ///
    /// The new-card order the config had before, so the caller can re-sort
    pub fn restore_config_to_default(&mut self, config_id: DeckConfigId, stamp: Stamp) -> SchedResult<DeckConfig> {
        let old = self.configs.get(&config_id).cloned().ok_or(SchedError::ConfigNotFound(config_id))?;
        let restored = DeckConfig { id: old.id, name: old.name.clone(), ..DeckConfig::default() };
        self.update_config(restored, stamp)?;
        Ok(old)
    }

    /// Normal decks that use a config
    pub fn dids_for_config(&self, config_id: DeckConfigId) -> Vec<DeckId> {
        self.decks
            .values()
            .filter(|d| d.config_id() == Some(config_id))
            .map(|d| d.id)
            .collect()
    }

    /// Creates decks for missing ancestors and renames duplicate names
    ///
    /// ### Returns
    ///
    /// The number of repairs made
    pub fn check_integrity(&mut self, stamp: Stamp) -> usize {
        let mut repairs = 0;

        let mut seen: BTreeMap<String, DeckId> = BTreeMap::new();
        let ids = self.all_ids();
        for id in ids {
            let Some(name) = self.name(id).map(str::to_string) else {
                continue;
            };
            let mut unique = name.clone();
            while seen.contains_key(&unique.to_lowercase()) {
                unique.push('+');
            }
            if unique != name {
                warn!(deck_id = id, "Renaming duplicate deck '{}' to '{}'", name, unique);
                match self.update_deck(id, stamp, |d| d.name = unique.clone()) {
                    Ok(()) => repairs += 1,
                    Err(err) => warn!(deck_id = id, error = %err, "Failed to rename duplicate deck"),
                }
            }
            seen.insert(unique.to_lowercase(), id);
        }

        let names: Vec<String> = self.decks.values().map(|d| d.name.clone()).collect();
        for name in names {
            let mut path = parent_of(&name);
            while let Some(parent) = path {
                if self.by_name(parent).is_none() {
                    warn!("Creating missing parent deck '{}'", parent);
                    self.insert(Deck::new_normal(parent), stamp);
                    repairs += 1;
                }
                path = parent_of(parent);
            }
        }
        repairs
    }

    /// Entries modified since the last call
    pub fn take_changes(&mut self) -> DeckChanges {
        let decks = std::mem::take(&mut self.dirty_decks)
            .into_iter()
            .filter_map(|id| self.decks.get(&id).cloned())
            .collect();
        let configs = std::mem::take(&mut self.dirty_configs)
            .into_iter()
            .filter_map(|id| self.configs.get(&id).cloned())
            .collect();
        DeckChanges {
            decks,
            removed_decks: std::mem::take(&mut self.removed_decks).into_iter().collect(),
            configs,
            removed_configs: std::mem::take(&mut self.removed_configs).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests;
