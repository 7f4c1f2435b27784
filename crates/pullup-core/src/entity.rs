//! Case-insensitive company identifiers.
//!
//! This module provides:
//!
//! - [`Entity`]: A company name compared without regard to case
//! - [`EntityKey`]: The normalised form used for equality and ordering
//! - [`EntitySet`]: An ordered, duplicate-free set of entities
//!
//! Two entities are equal when their trimmed names match ignoring case. The
//! display form of an entity is whatever casing was seen first; later
//! spellings of the same name never replace it.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Longest accepted company name, in characters.
pub const MAX_ENTITY_NAME_LEN: usize = 200;

/// Normalised lookup key for an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey(String);

impl EntityKey {
    /// Normalises a raw name into a key.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    /// Returns the normalised key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A company name used as the comparison key across records.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    key: EntityKey,
}

impl Entity {
    /// Parses and validates a caller-supplied company name.
    ///
    /// Names are trimmed. Empty names, names longer than
    /// [`MAX_ENTITY_NAME_LEN`] characters and names containing anything other
    /// than ASCII letters, digits, whitespace, `-` or `.` are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntity`] when the name fails validation.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::invalid_entity(raw, "company name is required"));
        }
        if name.chars().count() > MAX_ENTITY_NAME_LEN {
            return Err(Error::invalid_entity(
                raw,
                format!("company name exceeds {MAX_ENTITY_NAME_LEN} characters"),
            ));
        }
        if !name.chars().all(is_name_char) {
            return Err(Error::invalid_entity(
                raw,
                "company name contains invalid characters",
            ));
        }
        Ok(Self::unchecked(name))
    }

    /// Builds an entity without validating the name.
    ///
    /// Used for names that come back from a record store, which may hold
    /// spellings the request validator would not accept.
    #[must_use]
    pub fn unchecked(name: &str) -> Self {
        let name = name.trim();
        Self {
            name: name.to_string(),
            key: EntityKey::new(name),
        }
    }

    /// Returns the display name (first-seen casing).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the normalised key.
    #[must_use]
    pub const fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Returns true if `name` refers to this entity.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        EntityKey::new(name) == self.key
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '.'
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Entity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An ordered, duplicate-free set of entities.
///
/// Iteration order is the order of normalised keys, so two sets holding the
/// same entities always iterate identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    entries: BTreeMap<EntityKey, Entity>,
}

impl EntitySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a list of company names.
    ///
    /// Blank entries are skipped; names that differ only in case collapse to
    /// the first spelling. An empty input yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntity`] for the first name that fails
    /// validation.
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for raw in names {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            set.insert(Entity::parse(raw)?);
        }
        Ok(set)
    }

    /// Inserts an entity, keeping any existing spelling.
    ///
    /// Returns true if the entity was not already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        match self.entries.entry(entity.key.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Removes the entity with the given key.
    pub fn remove(&mut self, key: &EntityKey) -> Option<Entity> {
        self.entries.remove(key)
    }

    /// Returns true if the set holds this entity.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entries.contains_key(&entity.key)
    }

    /// Returns true if the set holds an entity with this key.
    #[must_use]
    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns true if `name` matches any entity in the set.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.contains_key(&EntityKey::new(name))
    }

    /// Looks up an entity by any spelling of its name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entries.get(&EntityKey::new(name))
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entities in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    /// Returns the display names in key order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|e| e.name.clone()).collect()
    }

    /// Returns true if no entity appears in both sets.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.entries.keys().all(|k| !other.entries.contains_key(k))
    }

    /// Returns a new set holding entities from both sets.
    ///
    /// Spellings from `self` win over spellings from `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.extend(other.iter().cloned());
        out
    }
}

impl FromIterator<Entity> for EntitySet {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Entity> for EntitySet {
    fn extend<T: IntoIterator<Item = Entity>>(&mut self, iter: T) {
        for entity in iter {
            self.insert(entity);
        }
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = btree_map::Values<'a, EntityKey, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl fmt::Display for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl Serialize for EntitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de> Deserialize<'de> for EntitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Self::parse(names).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_case_and_padding() {
        let a = Entity::parse("Apple").unwrap();
        let b = Entity::parse("  aPPLE ").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.name(), "aPPLE");
        assert!(a.matches("APPLE"));
    }

    #[test]
    fn rejects_empty_and_invalid_names() {
        assert!(Entity::parse("   ").is_err());
        assert!(Entity::parse("Acme$Corp").is_err());
        assert!(Entity::parse(&"x".repeat(MAX_ENTITY_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn accepts_punctuation_the_validator_allows() {
        let entity = Entity::parse("Acme Co. - West").unwrap();
        assert_eq!(entity.name(), "Acme Co. - West");
    }

    #[test]
    fn set_keeps_first_seen_casing() {
        let set = EntitySet::parse(["samsung", "Samsung", "SAMSUNG", "Apple"]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("SAMSUNG").map(Entity::name), Some("samsung"));
    }

    #[test]
    fn set_skips_blank_entries() {
        let set = EntitySet::parse(["Apple", "", "  "]).unwrap();
        assert_eq!(set.names(), vec!["Apple".to_string()]);
    }

    #[test]
    fn set_parse_fails_on_first_invalid_name() {
        let err = EntitySet::parse(["Apple", "Bad!"]).unwrap_err();
        assert!(matches!(err, Error::InvalidEntity { ref name, .. } if name == "Bad!"));
    }

    #[test]
    fn union_and_disjoint() {
        let a = EntitySet::parse(["Apple", "Google"]).unwrap();
        let b = EntitySet::parse(["google", "Samsung"]).unwrap();
        assert!(!a.is_disjoint(&b));
        let both = a.union(&b);
        assert_eq!(both.len(), 3);
        assert_eq!(both.get("google").map(Entity::name), Some("Google"));
    }

    #[test]
    fn iteration_order_is_independent_of_insertion_order() {
        let a = EntitySet::parse(["Zeta", "alpha", "Mid"]).unwrap();
        let b = EntitySet::parse(["mid", "ZETA", "Alpha"]).unwrap();
        assert_eq!(a, b);
        let keys_a: Vec<_> = a.iter().map(|e| e.key().clone()).collect();
        let keys_b: Vec<_> = b.iter().map(|e| e.key().clone()).collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn serde_uses_display_names() {
        let set = EntitySet::parse(["Apple", "samsung"]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Apple","samsung"]"#);
        let back: EntitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
