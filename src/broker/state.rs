use std::{collections::HashMap, fmt, time::Instant};

use serde::Serialize;

use crate::protocol::MemberInfo;

use super::Outbound;

/// Opaque handle for one live connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

pub(crate) struct Session {
    pub(crate) outbound: Outbound,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) avatar_id: String,
    pub(crate) room_ids: Vec<String>,
}

impl Session {
    pub(crate) fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            user_id: String::new(),
            username: String::new(),
            avatar_id: String::new(),
            room_ids: Vec::new(),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub(crate) fn member_info(&self) -> MemberInfo {
        MemberInfo {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            avatar_id: self.avatar_id.clone(),
        }
    }
}

pub(crate) struct Member {
    pub(crate) session: SessionId,
}

pub(crate) struct Room {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) creator: String,
    pub(crate) is_public: bool,
    pub(crate) password: Option<String>,
    pub(crate) members: Vec<Member>,
    pub(crate) created_at: Instant,
}

impl Room {
    pub(crate) fn has_member(&self, session: SessionId) -> bool {
        self.members.iter().any(|m| m.session == session)
    }

    pub(crate) fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            name: self.name.clone(),
            is_public: self.is_public,
            creator: self.creator.clone(),
        }
    }

    pub(crate) fn listing(&self) -> RoomListing {
        RoomListing {
            id: self.id.clone(),
            name: self.name.clone(),
            members: self.members.len(),
        }
    }

    pub(crate) fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            creator: self.creator.clone(),
            members: self.members.len(),
        }
    }
}

/// Room metadata handed back to whoever created or updated a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub name: String,
    pub is_public: bool,
    pub creator: String,
}

/// One entry of the public room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomListing {
    pub id: String,
    pub name: String,
    pub members: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub members: usize,
}

/// Every session and every room. Only the broker holds one, behind its lock.
#[derive(Default)]
pub(crate) struct BrokerState {
    pub(crate) sessions: HashMap<SessionId, Session>,
    pub(crate) rooms: HashMap<String, Room>,
    next_session: u64,
}

impl BrokerState {
    pub(crate) fn next_session_id(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    /// Lists every broken cross reference between sessions and rooms.
    pub(crate) fn audit(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (room_id, room) in &self.rooms {
            if &room.id != room_id {
                problems.push(format!("room {room_id} is stored under a different id {}", room.id));
            }
            for member in &room.members {
                match self.sessions.get(&member.session) {
                    Some(session) if session.room_ids.contains(room_id) => {}
                    Some(_) => problems.push(format!(
                        "{} is a member of {room_id} but does not list it",
                        member.session
                    )),
                    None => problems.push(format!(
                        "{room_id} has member {} which is not a live session",
                        member.session
                    )),
                }
            }
        }

        let mut bound: HashMap<&str, SessionId> = HashMap::new();
        for (id, session) in &self.sessions {
            for room_id in &session.room_ids {
                match self.rooms.get(room_id) {
                    Some(room) if room.has_member(*id) => {}
                    Some(_) => problems.push(format!("{id} lists {room_id} but is not a member")),
                    None => problems.push(format!("{id} lists missing room {room_id}")),
                }
            }
            if session.is_bound() {
                if let Some(other) = bound.insert(&session.user_id, *id) {
                    problems.push(format!(
                        "user {} is bound to both {other} and {id}",
                        session.user_id
                    ));
                }
            }
        }

        problems
    }
}
