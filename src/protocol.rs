//! JSON envelope spoken over `/ws` in both directions.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const JOIN_ROOM: &str = "join_room";
pub const CREATE_ROOM: &str = "create_room";
pub const LEAVE_ROOM: &str = "leave_room";
pub const SIGNAL: &str = "signal";

pub const ERROR: &str = "error";
pub const ROOM_NOT_FOUND: &str = "room_not_found";
pub const ROOM_JOINED: &str = "room_joined";
pub const USER_JOINED: &str = "user_joined";
pub const ROOM_CREATED: &str = "room_created";
pub const USER_LEFT: &str = "user_left";

pub const AVATARS: [&str; 6] = ["kazuha", "diluc", "ganyu", "hutao", "shotgun", "shenhe"];

pub fn is_known_avatar(avatar_id: &str) -> bool {
    AVATARS.contains(&avatar_id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub room_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// Public identity of a room member as other peers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub user_id: String,
    pub username: String,
    pub avatar_id: String,
}

impl Envelope {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn new(kind: &str, room_id: &str, user_id: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_owned(),
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR, "", "", Value::String(message.into()))
    }

    pub fn room_not_found(room_id: &str, suggested_name: &str) -> Self {
        Self::new(
            ROOM_NOT_FOUND,
            room_id,
            "",
            json!({ "suggestedName": suggested_name, "createRoom": true }),
        )
    }

    pub fn room_joined(room_id: &str, members: &[MemberInfo], name: &str, is_public: bool) -> Self {
        Self::new(
            ROOM_JOINED,
            room_id,
            "",
            json!({ "members": members, "name": name, "isPublic": is_public }),
        )
    }

    pub fn user_joined(room_id: &str, user: &MemberInfo, name: &str) -> Self {
        Self::new(USER_JOINED, room_id, &user.user_id, json!({ "user": user, "name": name }))
    }

    pub fn user_left(room_id: &str, user: &MemberInfo) -> Self {
        Self::new(USER_LEFT, room_id, &user.user_id, json!(user))
    }

    pub fn room_created(room_id: &str, name: &str, is_public: bool, creator: &str) -> Self {
        Self::new(
            ROOM_CREATED,
            room_id,
            "",
            json!({ "name": name, "isPublic": is_public, "creator": creator }),
        )
    }

    pub fn signal(room_id: &str, user_id: &str, payload: Value) -> Self {
        Self::new(SIGNAL, room_id, user_id, payload)
    }
}

/// Loose field access on untyped payloads.
pub trait GetField {
    fn get_str_field(&self, field: &str) -> Option<&str>;
    fn get_bool_field(&self, field: &str) -> Option<bool>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> Option<&str> {
        self.get(field)?.as_str()
    }

    fn get_bool_field(&self, field: &str) -> Option<bool> {
        self.get(field)?.as_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_envelope() {
        let env = Envelope::parse(r#"{"type":"leave_room","roomId":"abcd1234"}"#).unwrap();
        assert_eq!(env.kind, LEAVE_ROOM);
        assert_eq!(env.room_id, "abcd1234");
        assert!(env.user_id.is_empty());
        assert!(env.payload.is_null());
    }

    #[test]
    fn rejects_frames_without_type() {
        assert!(Envelope::parse(r#"{"roomId":"abcd1234"}"#).is_err());
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"{"type":"signal","roomId":5}"#).is_err());
    }

    #[test]
    fn empty_fields_are_omitted_on_output() {
        let encoded = Envelope::error("Invalid payload").encode().unwrap();
        assert_eq!(encoded, r#"{"type":"error","payload":"Invalid payload"}"#);
    }

    #[test]
    fn room_not_found_invites_creation() {
        let env = Envelope::room_not_found("zzzzzzzz", "FluffyCookie");
        let value: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "room_not_found");
        assert_eq!(value["roomId"], "zzzzzzzz");
        assert_eq!(value["payload"]["suggestedName"], "FluffyCookie");
        assert_eq!(value["payload"]["createRoom"], true);
    }

    #[test]
    fn member_info_uses_camel_case() {
        let member = MemberInfo {
            user_id: "u1".into(),
            username: "alice".into(),
            avatar_id: "ganyu".into(),
        };
        let env = Envelope::user_left("abcd1234", &member);
        assert_eq!(env.user_id, "u1");
        assert_eq!(env.payload, json!({"userId": "u1", "username": "alice", "avatarId": "ganyu"}));
    }

    #[test]
    fn avatar_whitelist_is_closed() {
        assert!(is_known_avatar("diluc"));
        assert!(!is_known_avatar("Diluc"));
        assert!(!is_known_avatar(""));
    }
}
