//! Identity collaborator: display-name resolution and group existence.

use std::sync::RwLock;

use hashbrown::{HashMap, HashSet};

use crate::{
    error::Result,
    persist::PersistError,
    types::{GroupId, ParticipantId},
};

/// Lookups the coordination core needs from the surrounding system.
pub trait IdentityResolver: Send + Sync {
    /// Resolves display names in one batch. Unknown ids are left out of the map.
    fn display_names(&self, ids: &[ParticipantId]) -> Result<HashMap<ParticipantId, String>>;

    /// True when `group` exists.
    fn group_exists(&self, group: &GroupId) -> Result<bool>;
}

/// Renders `id` through `names`, falling back to the raw id.
pub fn name_or_id(names: &HashMap<ParticipantId, String>, id: &str) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

/// In-memory directory of users and groups.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: RwLock<HashMap<ParticipantId, String>>,
    groups: RwLock<HashSet<GroupId>>,
}

impl StaticDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user's display name.
    pub fn with_user(self, id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        if let Ok(mut users) = self.users.write() {
            users.insert(id.into(), name.into());
        }
        self
    }

    /// Registers a group.
    pub fn with_group(self, group: impl Into<GroupId>) -> Self {
        if let Ok(mut groups) = self.groups.write() {
            groups.insert(group.into());
        }
        self
    }
}

impl IdentityResolver for StaticDirectory {
    fn display_names(&self, ids: &[ParticipantId]) -> Result<HashMap<ParticipantId, String>> {
        let users = self
            .users
            .read()
            .map_err(|_| PersistError::Message("directory lock poisoned".to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| users.get(id).map(|name| (id.clone(), name.clone())))
            .collect())
    }

    fn group_exists(&self, group: &GroupId) -> Result<bool> {
        let groups = self
            .groups
            .read()
            .map_err(|_| PersistError::Message("directory lock poisoned".to_string()))?;
        Ok(groups.contains(group))
    }
}
