//! Minimal user directory contract used by the codec and the server.

use crate::graph::UserRef;
use crate::protocol::Filter;
use uuid::Uuid;

/// Looks users up by id.
///
/// The decoder resolves user-typed fields through it; the server answers
/// the `userdirectory.*` methods with it.
pub trait UserDirectory: Send + Sync {
    fn find_user(&self, id: Uuid) -> Option<UserRef>;

    /// Users matching `filter`, evaluated against their `DisplayName` and `Id`.
    fn find_users(&self, filter: &Filter) -> Vec<UserRef> {
        let _ = filter;
        Vec::new()
    }
}

/// A directory that knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl UserDirectory for NoDirectory {
    fn find_user(&self, _id: Uuid) -> Option<UserRef> {
        None
    }
}
