//! Live sessions and rooms, behind a single lock.
//!
//! Every mutation runs as one write critical section over [`BrokerState`].
//! Envelopes produced inside it are collected in an [`Outbox`] and handed to
//! the per-connection queues only after the lock is released.

mod directory;
mod registry;
mod relay;
mod state;
pub mod sweeper;

use std::{sync::Arc, time::Duration, time::Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Notify, RwLock, mpsc, mpsc::error::TrySendError};

use crate::protocol::{Envelope, MemberInfo};

pub use directory::{JoinOutcome, JoinRequest, NewRoom, RoomUpdate};
pub use state::{RoomInfo, RoomListing, RoomSummary, SessionId};

use state::BrokerState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Invalid room ID format. Must be 8 characters long and contain only letters and numbers")]
    InvalidIdentifier,
    #[error("Room ID already exists")]
    AlreadyExists,
    #[error("Room not found")]
    NotFound,
    #[error("Invalid password")]
    Forbidden,
    #[error("UserID does not match this connection")]
    IdentityMismatch,
    #[error("Only the room creator can update the room")]
    NotCreator,
    #[error("connection is closed")]
    SessionClosed,
}

/// Sending half of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    frames: mpsc::Sender<String>,
    close: Arc<Notify>,
}

/// Receiving half, owned by the connection's writer and reader.
#[derive(Debug)]
pub struct OutboundRx {
    pub frames: mpsc::Receiver<String>,
    /// Notified when the broker wants the connection gone.
    pub close: Arc<Notify>,
}

impl Outbound {
    pub fn channel(capacity: usize) -> (Self, OutboundRx) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = Arc::new(Notify::new());
        (
            Self {
                frames: tx,
                close: close.clone(),
            },
            OutboundRx { frames: rx, close },
        )
    }

    /// Never waits. A peer whose queue is full gets disconnected.
    pub fn send_frame(&self, frame: String) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("outbound queue full, disconnecting slow peer");
                self.close();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn send(&self, envelope: &Envelope) -> bool {
        match envelope.encode() {
            Ok(frame) => self.send_frame(frame),
            Err(e) => {
                tracing::error!(kind = %envelope.kind, "failed to encode envelope: {e}");
                false
            }
        }
    }

    pub fn close(&self) {
        self.close.notify_one();
    }
}

/// Deliveries gathered during a critical section.
#[derive(Default)]
pub(crate) struct Outbox {
    batches: Vec<(Vec<Outbound>, Envelope)>,
    closes: Vec<Outbound>,
}

impl Outbox {
    pub(crate) fn push(&mut self, to: Outbound, envelope: Envelope) {
        self.batches.push((vec![to], envelope));
    }

    pub(crate) fn broadcast(&mut self, to: Vec<Outbound>, envelope: Envelope) {
        if !to.is_empty() {
            self.batches.push((to, envelope));
        }
    }

    pub(crate) fn close(&mut self, to: Outbound) {
        self.closes.push(to);
    }

    /// Returns how many frames were queued.
    pub(crate) fn deliver(self) -> usize {
        let mut delivered = 0;
        for (targets, envelope) in self.batches {
            let frame = match envelope.encode() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(kind = %envelope.kind, "failed to encode envelope: {e}");
                    continue;
                }
            };
            for target in targets {
                if target.send_frame(frame.clone()) {
                    delivered += 1;
                }
            }
        }
        for target in self.closes {
            target.close();
        }
        delivered
    }
}

#[derive(Clone, Default)]
pub struct Broker {
    state: Arc<RwLock<BrokerState>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn accept(&self, outbound: Outbound) -> SessionId {
        let session = self.state.write().await.accept(outbound);
        tracing::info!(%session, "connection accepted");
        session
    }

    pub async fn release(&self, session: SessionId) {
        let mut outbox = Outbox::default();
        let released = self.state.write().await.release(session, &mut outbox);
        outbox.deliver();
        if released {
            tracing::info!(%session, "connection released");
        }
    }

    /// Binds the session's identity on its first successful join, evicting
    /// any older session of the same user before doing so.
    pub async fn join(&self, session: SessionId, req: JoinRequest) -> Result<JoinOutcome, RoomError> {
        let room_id = req.room_id.clone();
        let mut outbox = Outbox::default();
        let outcome = self.state.write().await.join_room(session, req, &mut outbox);
        outbox.deliver();

        if let Ok(outcome) = &outcome {
            tracing::info!(
                %session,
                room_id = %room_id,
                members = outcome.members.len() + 1,
                rejoined = outcome.rejoined,
                "joined room"
            );
        }
        outcome
    }

    pub async fn create(&self, new: NewRoom) -> Result<RoomInfo, RoomError> {
        let info = self.state.write().await.create_room(new)?;
        tracing::info!(room_id = %info.room_id, creator = %info.creator, public = info.is_public, "room created");
        Ok(info)
    }

    pub async fn leave(&self, session: SessionId, room_id: &str) -> bool {
        let mut outbox = Outbox::default();
        let left = self.state.write().await.leave_room(session, room_id, &mut outbox);
        outbox.deliver();
        if left {
            tracing::debug!(%session, room_id, "left room");
        }
        left
    }

    /// Fire and forget. `None` if the room does not exist.
    pub async fn signal(
        &self,
        session: SessionId,
        room_id: &str,
        claimed_user_id: &str,
        payload: Value,
    ) -> Option<usize> {
        let mut outbox = Outbox::default();
        let count = self
            .state
            .read()
            .await
            .relay_signal(session, room_id, claimed_user_id, payload, &mut outbox);
        outbox.deliver();
        count
    }

    pub async fn bound_user_id(&self, session: SessionId) -> Option<String> {
        self.state
            .read()
            .await
            .sessions
            .get(&session)
            .filter(|s| s.is_bound())
            .map(|s| s.user_id.clone())
    }

    pub async fn exists(&self, room_id: &str) -> bool {
        self.state.read().await.rooms.contains_key(room_id)
    }

    pub async fn list_public(&self) -> Vec<RoomListing> {
        self.state.read().await.list_public()
    }

    pub async fn summary(&self, room_id: &str) -> Result<RoomSummary, RoomError> {
        self.state.read().await.room_summary(room_id)
    }

    pub async fn update(&self, room_id: &str, by_user: &str, update: RoomUpdate) -> Result<RoomInfo, RoomError> {
        self.state.write().await.update_room(room_id, by_user, update)
    }

    pub async fn members(&self, room_id: &str) -> Option<Vec<MemberInfo>> {
        let state = self.state.read().await;
        let room = state.rooms.get(room_id)?;
        Some(
            room.members
                .iter()
                .filter_map(|m| state.sessions.get(&m.session))
                .map(|s| s.member_info())
                .collect(),
        )
    }

    pub async fn rooms_of(&self, session: SessionId) -> Vec<String> {
        self.state
            .read()
            .await
            .sessions
            .get(&session)
            .map(|s| s.room_ids.clone())
            .unwrap_or_default()
    }

    pub async fn sweep(&self, grace: Duration) -> usize {
        let removed = self.state.write().await.sweep_empty_rooms(grace, Instant::now());
        for room_id in &removed {
            tracing::debug!(room_id = %room_id, "removed empty room");
        }
        removed.len()
    }

    /// Every inconsistency between sessions and rooms; empty when healthy.
    pub async fn audit(&self) -> Vec<String> {
        self.state.read().await.audit()
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }
}
