//! Model world - the reference room registry.
//!
//! Applies operations one at a time to plain vectors. This is the oracle
//! against which the real coordinator is verified.

use std::collections::BTreeMap;

use super::operation::{
    ClientId, ModelRoomId, Operation, OperationError, OperationResult, PasswordChoice,
    ROOM_PASSWORD,
};

/// A member's row as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelMember {
    /// Who joined.
    pub client_id: ClientId,
    /// Whether they own the room.
    pub is_owner: bool,
    /// Best accuracy this round.
    pub accuracy: u32,
}

/// A room as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoom {
    /// Whether the room takes a password.
    pub secret: bool,
    /// Seats.
    pub capacity: usize,
    /// Members in join order.
    pub members: Vec<ModelMember>,
}

impl ModelRoom {
    fn position(&self, client_id: ClientId) -> Option<usize> {
        self.members.iter().position(|m| m.client_id == client_id)
    }
}

/// Observable state for oracle comparison.
///
/// Every room's members in join order, rooms ascending by model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// `(room, members)` pairs.
    pub rooms: Vec<(ModelRoomId, Vec<ModelMember>)>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    num_clients: usize,
    rooms: BTreeMap<ModelRoomId, ModelRoom>,
}

impl ModelWorld {
    /// Create a new model world with the given number of clients.
    pub fn new(num_clients: usize) -> Self {
        Self { num_clients, rooms: BTreeMap::new() }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.num_clients
    }

    /// Get a room by id.
    pub fn room(&self, room_id: ModelRoomId) -> Option<&ModelRoom> {
        self.rooms.get(&room_id)
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match *op {
            Operation::CreateRoom { room_id, secret, size_class } => {
                self.create_room(room_id, secret, Operation::capacity_for(size_class))
            },
            Operation::JoinByPassword { client_id, room_id, password } => {
                self.join_by_password(client_id, room_id, password)
            },
            Operation::JoinByInvite { client_id, room_id } => {
                self.check_client(client_id).and_then(|()| self.admit(client_id, room_id, false))
            },
            Operation::Leave { client_id, room_id } => self.leave(client_id, room_id),
            Operation::RecordAccuracy { client_id, room_id, accuracy } => {
                self.record_accuracy(client_id, room_id, u32::from(accuracy))
            },
            Operation::ResetAccuracy { room_id } => self.reset_accuracy(room_id),
        };

        match result {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            rooms: self.rooms.iter().map(|(id, room)| (*id, room.members.clone())).collect(),
        }
    }

    fn check_client(&self, client_id: ClientId) -> Result<(), OperationError> {
        if usize::from(client_id) < self.num_clients {
            Ok(())
        } else {
            Err(OperationError::InvalidClient)
        }
    }

    fn create_room(
        &mut self,
        room_id: ModelRoomId,
        secret: bool,
        capacity: usize,
    ) -> Result<(), OperationError> {
        if self.rooms.contains_key(&room_id) {
            return Err(OperationError::DuplicateRoomName);
        }
        self.rooms.insert(room_id, ModelRoom { secret, capacity, members: Vec::new() });
        Ok(())
    }

    fn join_by_password(
        &mut self,
        client_id: ClientId,
        room_id: ModelRoomId,
        password: PasswordChoice,
    ) -> Result<(), OperationError> {
        self.check_client(client_id)?;
        let room = self.rooms.get(&room_id).ok_or(OperationError::RoomNotFound)?;

        match (room.secret, password.as_submitted()) {
            (true, Some(ROOM_PASSWORD)) | (false, None) => {},
            (true, _) => return Err(OperationError::PasswordMismatch),
            (false, Some(_)) => return Err(OperationError::PasswordNotAllowed),
        }

        self.admit(client_id, room_id, true)
    }

    fn admit(
        &mut self,
        client_id: ClientId,
        room_id: ModelRoomId,
        by_password: bool,
    ) -> Result<(), OperationError> {
        let room = self.rooms.get_mut(&room_id).ok_or(OperationError::RoomNotFound)?;
        if room.members.len() >= room.capacity {
            return Err(OperationError::RoomFull);
        }
        if room.position(client_id).is_some() {
            return Err(OperationError::AlreadyJoined);
        }

        let is_owner = by_password && room.members.is_empty();
        room.members.push(ModelMember { client_id, is_owner, accuracy: 0 });
        Ok(())
    }

    fn leave(&mut self, client_id: ClientId, room_id: ModelRoomId) -> Result<(), OperationError> {
        self.check_client(client_id)?;
        let room = self.rooms.get_mut(&room_id).ok_or(OperationError::RoomNotFound)?;
        let index = room.position(client_id).ok_or(OperationError::NotJoined)?;

        let leaver = room.members.remove(index);
        if leaver.is_owner {
            if let Some(heir) = room.members.first_mut() {
                heir.is_owner = true;
            }
        }
        Ok(())
    }

    fn record_accuracy(
        &mut self,
        client_id: ClientId,
        room_id: ModelRoomId,
        accuracy: u32,
    ) -> Result<(), OperationError> {
        self.check_client(client_id)?;
        let member = self
            .rooms
            .get_mut(&room_id)
            .and_then(|room| room.members.iter_mut().find(|m| m.client_id == client_id))
            .ok_or(OperationError::NotJoined)?;
        member.accuracy = member.accuracy.max(accuracy);
        Ok(())
    }

    fn reset_accuracy(&mut self, room_id: ModelRoomId) -> Result<(), OperationError> {
        let room = self.rooms.get_mut(&room_id).ok_or(OperationError::RoomNotFound)?;
        for member in &mut room.members {
            member.accuracy = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(client_id: ClientId, room_id: ModelRoomId) -> Operation {
        Operation::JoinByPassword { client_id, room_id, password: PasswordChoice::Omit }
    }

    #[test]
    fn first_password_joiner_owns() {
        let mut world = ModelWorld::new(3);
        world.apply(&Operation::CreateRoom { room_id: 1, secret: false, size_class: 0 });

        assert!(world.apply(&join(0, 1)).is_ok());
        assert!(world.apply(&join(1, 1)).is_ok());
        assert_eq!(world.apply(&join(2, 1)), OperationResult::Error(OperationError::RoomFull));

        let owners: Vec<_> = world.room(1).unwrap().members.iter().map(|m| m.is_owner).collect();
        assert_eq!(owners, [true, false]);
    }

    #[test]
    fn invite_join_never_owns() {
        let mut world = ModelWorld::new(2);
        world.apply(&Operation::CreateRoom { room_id: 1, secret: true, size_class: 1 });

        assert!(world.apply(&Operation::JoinByInvite { client_id: 0, room_id: 1 }).is_ok());
        assert!(!world.room(1).unwrap().members[0].is_owner);
    }

    #[test]
    fn owner_leave_promotes_next_in_join_order() {
        let mut world = ModelWorld::new(3);
        world.apply(&Operation::CreateRoom { room_id: 1, secret: false, size_class: 2 });
        for client in 0..3 {
            world.apply(&join(client, 1));
        }

        assert!(world.apply(&Operation::Leave { client_id: 0, room_id: 1 }).is_ok());
        let room = world.room(1).unwrap();
        assert_eq!(room.members[0].client_id, 1);
        assert!(room.members[0].is_owner);
        assert!(!room.members[1].is_owner);
    }

    #[test]
    fn out_of_range_client_is_invalid() {
        let mut world = ModelWorld::new(2);
        world.apply(&Operation::CreateRoom { room_id: 1, secret: false, size_class: 0 });
        assert_eq!(world.apply(&join(5, 1)), OperationResult::Error(OperationError::InvalidClient));
    }
}
