//! Invite code resolution.

use std::sync::Arc;

use arena_core::{ArenaError, InviteCode, Room, RoomCatalog, RoomLookup};

/// Maps user-supplied invite codes to rooms.
///
/// A malformed code and an unknown code are indistinguishable to the caller:
/// both are `RoomNotFound`.
#[derive(Debug)]
pub struct InviteCodeResolver<C> {
    catalog: Arc<C>,
}

impl<C> Clone for InviteCodeResolver<C> {
    fn clone(&self) -> Self {
        Self { catalog: Arc::clone(&self.catalog) }
    }
}

impl<C: RoomCatalog> InviteCodeResolver<C> {
    /// Create a resolver over a room catalog.
    pub fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    /// Resolve a raw code to its room.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::RoomNotFound` if the code is malformed or names
    /// no room, and `ArenaError::Storage` if the catalog fails.
    pub fn resolve(&self, raw: &str) -> Result<Room, ArenaError> {
        let not_found = || ArenaError::RoomNotFound(RoomLookup::InviteCode(raw.trim().to_string()));
        let code = InviteCode::parse(raw).ok_or_else(not_found)?;
        self.catalog.find_by_invite_code(&code)?.ok_or_else(not_found)
    }
}
