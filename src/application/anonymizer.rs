//! Stable pseudonyms for workspace members.
//!
//! Every user id seen during a run gets an `anonNN` alias the first time it is
//! encountered. The mapping back to real names is written out once at the end
//! as the anonymization key.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::User;

/// User id → display label, built from `users.list`.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<String, String>,
}

impl UserDirectory {
    #[must_use]
    pub fn from_users(users: &[User]) -> Self {
        Self {
            names: users
                .iter()
                .map(|u| (u.id.clone(), u.label().to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn name(&self, user_id: &str) -> Option<&str> {
        self.names.get(user_id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Assigns pseudonyms in first-encounter order.
#[derive(Debug, Clone, Default)]
pub struct Anonymizer {
    aliases: HashMap<String, String>,
    /// User ids in the order they were first seen.
    order: Vec<String>,
}

impl Anonymizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pseudonym for a user id, allocating the next one if unseen.
    pub fn alias(&mut self, user_id: &str) -> String {
        if let Some(alias) = self.aliases.get(user_id) {
            return alias.clone();
        }

        let alias = format!("anon{:02}", self.order.len() + 1);
        self.aliases.insert(user_id.to_string(), alias.clone());
        self.order.push(user_id.to_string());
        alias
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Builds the reversible key. Unknown ids map to themselves.
    #[must_use]
    pub fn key(&self, directory: &UserDirectory) -> AnonymizationKey {
        let entries = self
            .order
            .iter()
            .map(|uid| {
                let alias = self.aliases.get(uid).cloned().unwrap_or_default();
                let name = directory.name(uid).unwrap_or(uid).to_string();
                (alias, name)
            })
            .collect();

        AnonymizationKey { entries }
    }
}

/// Pseudonym → real name, in allocation order.
#[derive(Debug, Clone, Default)]
pub struct AnonymizationKey {
    entries: Vec<(String, String)>,
}

impl AnonymizationKey {
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Pretty JSON object, e.g. `{"anon01": "jane"}`.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for AnonymizationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (alias, name) in &self.entries {
            map.serialize_entry(alias, name)?;
        }
        map.end()
    }
}
