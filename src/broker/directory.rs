use std::time::Instant;

use crate::{
    ids,
    protocol::{Envelope, MemberInfo},
};

use super::{
    Outbound, Outbox, RoomError,
    state::{BrokerState, Member, RoomInfo, RoomListing, RoomSummary, Session, SessionId},
};

#[derive(Debug, Clone, Default)]
pub struct NewRoom {
    /// Caller-chosen id; a fresh one is generated when absent or empty.
    pub room_id: Option<String>,
    /// Empty means "make one up".
    pub name: String,
    pub creator: String,
    pub is_public: bool,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub identity: MemberInfo,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Who was already in the room, not counting the joiner.
    pub members: Vec<MemberInfo>,
    pub room: RoomInfo,
    pub rejoined: bool,
    /// Older session of the same user that was closed to make room for this one.
    pub evicted: Option<SessionId>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub is_public: Option<bool>,
    pub password: Option<String>,
}

impl BrokerState {
    fn fresh_room_id(&self) -> String {
        loop {
            let id = ids::generate_room_id();
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn create_room(&mut self, new: NewRoom) -> Result<RoomInfo, RoomError> {
        let id = match new.room_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                if !ids::validate(&id) {
                    return Err(RoomError::InvalidIdentifier);
                }
                if self.rooms.contains_key(&id) {
                    return Err(RoomError::AlreadyExists);
                }
                id
            }
            None => self.fresh_room_id(),
        };

        let name = if new.name.is_empty() {
            ids::generate_display_name()
        } else {
            new.name
        };
        let password = if new.is_public { None } else { new.password };

        let room = super::state::Room {
            id: id.clone(),
            name,
            creator: new.creator,
            is_public: new.is_public,
            password,
            members: Vec::new(),
            created_at: Instant::now(),
        };
        let info = room.info();
        self.rooms.insert(id, room);

        Ok(info)
    }

    pub(crate) fn join_room(
        &mut self,
        session: SessionId,
        req: JoinRequest,
        outbox: &mut Outbox,
    ) -> Result<JoinOutcome, RoomError> {
        let current = self.sessions.get(&session).ok_or(RoomError::SessionClosed)?;
        if current.is_bound() && current.user_id != req.identity.user_id {
            return Err(RoomError::IdentityMismatch);
        }
        let needs_binding = !current.is_bound();

        let room = self.rooms.get(&req.room_id).ok_or(RoomError::NotFound)?;
        if !room.is_public
            && req.password.as_deref().unwrap_or("") != room.password.as_deref().unwrap_or("")
        {
            return Err(RoomError::Forbidden);
        }

        // The older session must be gone before this one carries the user id.
        // The target room is spared from deletion since the joiner refills it.
        let evicted = if needs_binding {
            self.bind_identity(session, req.identity, outbox, Some(req.room_id.as_str()))
        } else {
            None
        };

        let room = self.rooms.get(&req.room_id).ok_or(RoomError::NotFound)?;
        let joiner = self.sessions.get(&session).ok_or(RoomError::SessionClosed)?;
        let rejoined = room.has_member(session);

        let others: Vec<&Session> = room
            .members
            .iter()
            .filter(|m| m.session != session)
            .filter_map(|m| self.sessions.get(&m.session))
            .collect();
        let members: Vec<MemberInfo> = others.iter().map(|s| s.member_info()).collect();
        let targets: Vec<Outbound> = others.iter().map(|s| s.outbound.clone()).collect();

        let info = room.info();
        let joiner_info = joiner.member_info();
        let joiner_outbound = joiner.outbound.clone();

        if !rejoined {
            if let Some(room) = self.rooms.get_mut(&req.room_id) {
                room.members.push(Member { session });
            }
            if let Some(joiner) = self.sessions.get_mut(&session) {
                joiner.room_ids.push(req.room_id.clone());
            }
        }

        outbox.push(
            joiner_outbound,
            Envelope::room_joined(&info.room_id, &members, &info.name, info.is_public),
        );
        if !rejoined {
            outbox.broadcast(targets, Envelope::user_joined(&info.room_id, &joiner_info, &info.name));
        }

        Ok(JoinOutcome {
            members,
            room: info,
            rejoined,
            evicted,
        })
    }

    /// Drops one side of the membership relation together with the other,
    /// tells whoever remains, and deletes the room if that emptied it
    /// (unless it is `spare`).
    pub(crate) fn remove_member(
        &mut self,
        session: SessionId,
        room_id: &str,
        outbox: &mut Outbox,
        spare: Option<&str>,
    ) -> bool {
        let listed = match self.sessions.get_mut(&session) {
            Some(s) => {
                let before = s.room_ids.len();
                s.room_ids.retain(|id| id != room_id);
                before != s.room_ids.len()
            }
            None => false,
        };

        let Some(room) = self.rooms.get_mut(room_id) else {
            return listed;
        };

        let before = room.members.len();
        room.members.retain(|m| m.session != session);
        let was_member = before != room.members.len();

        if was_member {
            if let Some(leaver) = self.sessions.get(&session).map(Session::member_info) {
                let targets: Vec<Outbound> = room
                    .members
                    .iter()
                    .filter_map(|m| self.sessions.get(&m.session))
                    .map(|s| s.outbound.clone())
                    .collect();
                outbox.broadcast(targets, Envelope::user_left(room_id, &leaver));
            }
        }

        let now_empty = room.members.is_empty();
        if (was_member || listed) && now_empty && spare != Some(room_id) {
            self.rooms.remove(room_id);
            tracing::info!(room_id, "room deleted after its last member left");
        }

        was_member || listed
    }

    pub(crate) fn leave_room(&mut self, session: SessionId, room_id: &str, outbox: &mut Outbox) -> bool {
        self.remove_member(session, room_id, outbox, None)
    }

    pub(crate) fn list_public(&self) -> Vec<RoomListing> {
        let mut rooms: Vec<RoomListing> = self
            .rooms
            .values()
            .filter(|room| room.is_public)
            .map(|room| room.listing())
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    pub(crate) fn room_summary(&self, room_id: &str) -> Result<RoomSummary, RoomError> {
        let room = self.rooms.get(room_id).ok_or(RoomError::NotFound)?;
        if !room.is_public {
            return Err(RoomError::Forbidden);
        }
        Ok(room.summary())
    }

    pub(crate) fn update_room(
        &mut self,
        room_id: &str,
        by_user: &str,
        update: RoomUpdate,
    ) -> Result<RoomInfo, RoomError> {
        let room = self.rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        if room.creator != by_user {
            return Err(RoomError::NotCreator);
        }

        if let Some(name) = update.name.filter(|name| !name.is_empty()) {
            room.name = name;
        }
        if let Some(is_public) = update.is_public {
            room.is_public = is_public;
        }
        // Kept while public; join only checks it for private rooms.
        if let Some(password) = update.password.filter(|password| !password.is_empty()) {
            room.password = Some(password);
        }

        Ok(room.info())
    }
}
