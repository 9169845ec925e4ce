use crate::protocol::MemberInfo;

use super::{
    Outbound, Outbox,
    state::{BrokerState, Session, SessionId},
};

impl BrokerState {
    pub(crate) fn accept(&mut self, outbound: Outbound) -> SessionId {
        let id = self.next_session_id();
        self.sessions.insert(id, Session::new(outbound));
        id
    }

    /// Installs `identity` on `session`, first evicting any other session
    /// already bound to the same user id. Returns the evicted session.
    pub(crate) fn bind_identity(
        &mut self,
        session: SessionId,
        identity: MemberInfo,
        outbox: &mut Outbox,
        spare: Option<&str>,
    ) -> Option<SessionId> {
        let previous = if identity.user_id.is_empty() {
            None
        } else {
            self.sessions
                .iter()
                .find(|(id, s)| **id != session && s.user_id == identity.user_id)
                .map(|(id, _)| *id)
        };

        if let Some(previous) = previous {
            tracing::info!(
                session = %previous,
                replaced_by = %session,
                user_id = %identity.user_id,
                "evicting older session of reconnecting user"
            );
            if let Some(evicted) = self.teardown(previous, outbox, spare) {
                outbox.close(evicted.outbound);
            }
        }

        if let Some(s) = self.sessions.get_mut(&session) {
            s.user_id = identity.user_id;
            s.username = identity.username;
            s.avatar_id = identity.avatar_id;
        }

        previous
    }

    /// Connection teardown. Safe to call more than once.
    pub(crate) fn release(&mut self, session: SessionId, outbox: &mut Outbox) -> bool {
        self.teardown(session, outbox, None).is_some()
    }

    fn teardown(&mut self, session: SessionId, outbox: &mut Outbox, spare: Option<&str>) -> Option<Session> {
        let room_ids = self.sessions.get(&session)?.room_ids.clone();
        for room_id in &room_ids {
            self.remove_member(session, room_id, outbox, spare);
        }
        self.sessions.remove(&session)
    }
}
