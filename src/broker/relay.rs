use serde_json::Value;

use crate::protocol::Envelope;

use super::{
    Outbound, Outbox,
    state::{BrokerState, SessionId},
};

impl BrokerState {
    /// Queues `payload` for every member of `room_id` except the sender.
    /// `None` when the room does not exist.
    pub(crate) fn relay_signal(
        &self,
        sender: SessionId,
        room_id: &str,
        claimed_user_id: &str,
        payload: Value,
        outbox: &mut Outbox,
    ) -> Option<usize> {
        let room = self.rooms.get(room_id)?;

        let user_id = self
            .sessions
            .get(&sender)
            .filter(|s| s.is_bound())
            .map_or(claimed_user_id, |s| s.user_id.as_str());

        if !room.has_member(sender) {
            tracing::debug!(session = %sender, room_id, "relaying signal from a non-member");
        }

        let targets: Vec<Outbound> = room
            .members
            .iter()
            .filter(|m| m.session != sender)
            .filter_map(|m| self.sessions.get(&m.session))
            .map(|s| s.outbound.clone())
            .collect();
        let count = targets.len();

        outbox.broadcast(targets, Envelope::signal(room_id, user_id, payload));
        Some(count)
    }
}
