use thiserror::Error;

use crate::{
    broker::{Broker, JoinRequest, NewRoom, Outbound, RoomError, SessionId},
    ids,
    protocol::{self, Envelope, GetField, MemberInfo},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ProtocolError {
    #[error("Invalid room ID format")]
    InvalidRoomId,
    #[error("UserID is required")]
    MissingUserId,
    #[error("Invalid payload")]
    InvalidPayload,
    #[error("Username is required")]
    MissingUsername,
    #[error("AvatarID is required")]
    MissingAvatar,
    #[error("Invalid avatar ID")]
    UnknownAvatar,
}

/// Handles one inbound text frame from `session`. Replies go straight to
/// `outbound`; anything meant for other peers goes through the broker.
pub(crate) async fn dispatch(broker: &Broker, session: SessionId, outbound: &Outbound, raw: &str) {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%session, "dropping malformed frame: {e}");
            return;
        }
    };

    match envelope.kind.as_str() {
        protocol::JOIN_ROOM => join_room(broker, session, outbound, envelope).await,
        protocol::CREATE_ROOM => create_room(broker, session, outbound, envelope).await,
        protocol::LEAVE_ROOM => {
            broker.leave(session, &envelope.room_id).await;
        }
        protocol::SIGNAL => {
            let delivered = broker
                .signal(session, &envelope.room_id, &envelope.user_id, envelope.payload)
                .await;
            if delivered.is_none() {
                tracing::debug!(%session, room_id = %envelope.room_id, "signal for unknown room dropped");
            }
        }
        other => tracing::debug!(%session, kind = other, "dropping unknown message type"),
    }
}

fn parse_join(envelope: Envelope) -> Result<JoinRequest, ProtocolError> {
    if !ids::validate(&envelope.room_id) {
        return Err(ProtocolError::InvalidRoomId);
    }
    if envelope.user_id.is_empty() {
        return Err(ProtocolError::MissingUserId);
    }

    let payload = &envelope.payload;
    if !payload.is_object() {
        return Err(ProtocolError::InvalidPayload);
    }
    let username = payload
        .get_str_field("username")
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::MissingUsername)?;
    let avatar_id = payload
        .get_str_field("avatarId")
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::MissingAvatar)?;
    if !protocol::is_known_avatar(avatar_id) {
        return Err(ProtocolError::UnknownAvatar);
    }

    Ok(JoinRequest {
        identity: MemberInfo {
            user_id: envelope.user_id.clone(),
            username: username.to_owned(),
            avatar_id: avatar_id.to_owned(),
        },
        password: payload.get_str_field("password").map(str::to_owned),
        room_id: envelope.room_id,
    })
}

async fn join_room(broker: &Broker, session: SessionId, outbound: &Outbound, envelope: Envelope) {
    let req = match parse_join(envelope) {
        Ok(req) => req,
        Err(e) => {
            outbound.send(&Envelope::error(e.to_string()));
            return;
        }
    };

    let room_id = req.room_id.clone();
    match broker.join(session, req).await {
        Ok(_) => {}
        Err(RoomError::NotFound) => {
            outbound.send(&Envelope::room_not_found(&room_id, &ids::generate_display_name()));
        }
        Err(RoomError::SessionClosed) => {
            tracing::debug!(%session, "join from a connection that is already closed");
        }
        Err(e) => {
            outbound.send(&Envelope::error(e.to_string()));
        }
    }
}

async fn create_room(broker: &Broker, session: SessionId, outbound: &Outbound, envelope: Envelope) {
    let payload = &envelope.payload;
    if !payload.is_object() {
        outbound.send(&Envelope::error(ProtocolError::InvalidPayload.to_string()));
        return;
    }

    let creator = match broker.bound_user_id(session).await {
        Some(user_id) => user_id,
        None => envelope.user_id.clone(),
    };

    let new = NewRoom {
        room_id: Some(envelope.room_id.clone()).filter(|id| !id.is_empty()),
        name: payload.get_str_field("name").unwrap_or_default().to_owned(),
        creator,
        is_public: payload.get_bool_field("isPublic").unwrap_or(false),
        password: payload
            .get_str_field("password")
            .filter(|p| !p.is_empty())
            .map(str::to_owned),
    };

    match broker.create(new).await {
        Ok(info) => {
            outbound.send(&Envelope::room_created(&info.room_id, &info.name, info.is_public, &info.creator));
        }
        Err(e) => {
            outbound.send(&Envelope::error(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::broker::OutboundRx;

    async fn connect(broker: &Broker) -> (SessionId, Outbound, OutboundRx) {
        let (outbound, rx) = Outbound::channel(32);
        let session = broker.accept(outbound.clone()).await;
        (session, outbound, rx)
    }

    fn next(rx: &mut OutboundRx) -> Value {
        serde_json::from_str(&rx.frames.try_recv().expect("expected a frame")).unwrap()
    }

    async fn send(broker: &Broker, session: SessionId, outbound: &Outbound, value: Value) {
        dispatch(broker, session, outbound, &value.to_string()).await;
    }

    async fn create_public(broker: &Broker, session: SessionId, outbound: &Outbound, rx: &mut OutboundRx) -> String {
        send(
            broker,
            session,
            outbound,
            json!({"type": "create_room", "userId": "u1", "payload": {"isPublic": true, "name": "Test"}}),
        )
        .await;
        let created = next(rx);
        assert_eq!(created["type"], "room_created");
        created["roomId"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn create_room_replies_with_metadata() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;

        send(
            &broker,
            s1,
            &o1,
            json!({"type": "create_room", "userId": "u1", "payload": {"isPublic": true, "name": "Test"}}),
        )
        .await;

        let reply = next(&mut rx1);
        assert_eq!(reply["type"], "room_created");
        assert!(ids::validate(reply["roomId"].as_str().unwrap()));
        assert_eq!(reply["payload"]["name"], "Test");
        assert_eq!(reply["payload"]["creator"], "u1");
        assert_eq!(reply["payload"]["isPublic"], true);
        assert!(broker.bound_user_id(s1).await.is_none(), "create must not bind");
    }

    #[tokio::test]
    async fn create_room_rejects_bad_and_taken_ids() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;

        send(&broker, s1, &o1, json!({"type": "create_room", "roomId": "short", "payload": {}})).await;
        let reply = next(&mut rx1);
        assert_eq!(reply["type"], "error");
        assert!(reply["payload"].as_str().unwrap().starts_with("Invalid room ID format"));

        send(&broker, s1, &o1, json!({"type": "create_room", "roomId": "abcd1234", "payload": {}})).await;
        assert_eq!(next(&mut rx1)["roomId"], "abcd1234");

        send(&broker, s1, &o1, json!({"type": "create_room", "roomId": "abcd1234", "payload": {}})).await;
        let reply = next(&mut rx1);
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["payload"], "Room ID already exists");

        send(&broker, s1, &o1, json!({"type": "create_room", "payload": "nope"})).await;
        assert_eq!(next(&mut rx1)["payload"], "Invalid payload");
    }

    #[tokio::test]
    async fn join_room_validates_every_field() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;
        let room_id = create_public(&broker, s1, &o1, &mut rx1).await;

        let cases = [
            (json!({"type": "join_room", "roomId": "bad", "userId": "u1", "payload": {"username": "a", "avatarId": "diluc"}}), "Invalid room ID format"),
            (json!({"type": "join_room", "roomId": room_id, "payload": {"username": "a", "avatarId": "diluc"}}), "UserID is required"),
            (json!({"type": "join_room", "roomId": room_id, "userId": "u1", "payload": 3}), "Invalid payload"),
            (json!({"type": "join_room", "roomId": room_id, "userId": "u1", "payload": {"avatarId": "diluc"}}), "Username is required"),
            (json!({"type": "join_room", "roomId": room_id, "userId": "u1", "payload": {"username": "a"}}), "AvatarID is required"),
            (json!({"type": "join_room", "roomId": room_id, "userId": "u1", "payload": {"username": "a", "avatarId": "pikachu"}}), "Invalid avatar ID"),
        ];
        for (frame, expected) in cases {
            send(&broker, s1, &o1, frame).await;
            let reply = next(&mut rx1);
            assert_eq!(reply["type"], "error");
            assert_eq!(reply["payload"], expected);
        }

        assert!(broker.bound_user_id(s1).await.is_none());
        assert_eq!(broker.members(&room_id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn join_unknown_room_offers_creation() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;

        send(
            &broker,
            s1,
            &o1,
            json!({"type": "join_room", "roomId": "zzzzzzzz", "userId": "u1", "payload": {"username": "a", "avatarId": "diluc"}}),
        )
        .await;

        let reply = next(&mut rx1);
        assert_eq!(reply["type"], "room_not_found");
        assert_eq!(reply["roomId"], "zzzzzzzz");
        assert_eq!(reply["payload"]["createRoom"], true);
        assert!(reply["payload"]["suggestedName"].is_string());
        assert_eq!(broker.room_count().await, 0);
        assert!(broker.bound_user_id(s1).await.is_none());
    }

    #[tokio::test]
    async fn private_room_rejects_wrong_password() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;
        send(
            &broker,
            s1,
            &o1,
            json!({"type": "create_room", "roomId": "secret01", "userId": "u1", "payload": {"isPublic": false, "password": "pw"}}),
        )
        .await;
        next(&mut rx1);

        send(
            &broker,
            s1,
            &o1,
            json!({"type": "join_room", "roomId": "secret01", "userId": "u1", "payload": {"username": "a", "avatarId": "diluc", "password": "nope"}}),
        )
        .await;
        assert_eq!(next(&mut rx1)["payload"], "Invalid password");

        send(
            &broker,
            s1,
            &o1,
            json!({"type": "join_room", "roomId": "secret01", "userId": "u1", "payload": {"username": "a", "avatarId": "diluc", "password": "pw"}}),
        )
        .await;
        let reply = next(&mut rx1);
        assert_eq!(reply["type"], "room_joined");
        assert_eq!(reply["payload"]["isPublic"], false);
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_are_dropped() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;

        dispatch(&broker, s1, &o1, "{not json").await;
        dispatch(&broker, s1, &o1, r#"{"type":"dance"}"#).await;
        dispatch(&broker, s1, &o1, r#"{"type":"signal","roomId":"zzzzzzzz","payload":{}}"#).await;
        dispatch(&broker, s1, &o1, r#"{"type":"leave_room","roomId":"zzzzzzzz"}"#).await;

        assert!(rx1.frames.try_recv().is_err());
        assert_eq!(broker.session_count().await, 1);
    }

    #[tokio::test]
    async fn leave_twice_notifies_once() {
        let broker = Broker::new();
        let (s1, o1, mut rx1) = connect(&broker).await;
        let (s2, o2, mut rx2) = connect(&broker).await;
        let room_id = create_public(&broker, s1, &o1, &mut rx1).await;

        for (session, outbound, user) in [(s1, &o1, "u1"), (s2, &o2, "u2")] {
            send(
                &broker,
                session,
                outbound,
                json!({"type": "join_room", "roomId": room_id, "userId": user, "payload": {"username": user, "avatarId": "shenhe"}}),
            )
            .await;
        }
        while rx1.frames.try_recv().is_ok() {}
        while rx2.frames.try_recv().is_ok() {}

        let leave = json!({"type": "leave_room", "roomId": room_id});
        send(&broker, s2, &o2, leave.clone()).await;
        send(&broker, s2, &o2, leave).await;

        let notice = next(&mut rx1);
        assert_eq!(notice["type"], "user_left");
        assert_eq!(notice["userId"], "u2");
        assert!(rx1.frames.try_recv().is_err());
        assert!(rx2.frames.try_recv().is_err(), "leaving never replies");
        assert!(broker.audit().await.is_empty());
    }
}
