//! In-memory user directory.

use graphrpc_common::directory::UserDirectory;
use graphrpc_common::graph::{UserRef, Value};
use graphrpc_common::protocol::Filter;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Users filters can test: `Id` and `DisplayName`.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<Uuid, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, or renames an existing one.
    pub fn add(&self, id: Uuid, display_name: impl Into<String>) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, display_name.into());
    }

    pub fn with_user(self, id: Uuid, display_name: impl Into<String>) -> Self {
        self.add(id, display_name);
        self
    }
}

/// Field accessor used to filter and sort users.
pub fn user_field(user: &UserRef, name: &str) -> Option<Value> {
    match name {
        "Id" => Some(Value::Guid(user.id)),
        "DisplayName" => Some(user.display_name.clone().map_or(Value::Null, Value::Text)),
        _ => None,
    }
}

impl UserDirectory for MemoryDirectory {
    fn find_user(&self, id: Uuid) -> Option<UserRef> {
        if id.is_nil() {
            return Some(UserRef::anonymous());
        }
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|name| UserRef::new(id, name.clone()))
    }

    fn find_users(&self, filter: &Filter) -> Vec<UserRef> {
        let mut users: Vec<UserRef> = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, name)| UserRef::new(*id, name.clone()))
            .filter(|user| filter.matches(&|name: &str| user_field(user, name)))
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }
}
