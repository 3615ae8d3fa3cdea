//! The signaling relay: what each packet does to the shared state and
//! who hears about it.
//!
//! All state sits in one [`Registry`] behind one mutex. Every handler
//! below runs with that lock held, and enqueues its outbound packets
//! before releasing it. Two consequences:
//!
//! - a peer can never be told `peer-left` for someone it was not first
//!   told `peer-joined` about, since both notifications are queued in
//!   the order the registry changed;
//! - handlers never wait on the network. Outboxes are unbounded queues
//!   drained by each connection's writer task.

use huddle_protocol::{
    Handshake, HandshakeAck, Notice, Packet, PacketType, Payload, PeerId, RoomEvent,
    RoomId, RoomRequest, FROM_FIELD, TARGET_FIELD,
};
use huddle_room::{JoinMode, LeaveOutcome, Registry};
use huddle_session::Outbox;
use huddle_transport::ConnectionId;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::RelayConfig;

/// Shared relay state. One per server, shared by every connection task.
pub struct Relay {
    registry: Mutex<Registry>,
    config: RelayConfig,
    shutdown: watch::Sender<bool>,
}

impl Relay {
    /// Creates a relay with an empty registry.
    pub fn new(config: RelayConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Mutex::new(Registry::new(config.room.clone())),
            config,
            shutdown,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registers a newly accepted connection. Packets for it will be
    /// queued on `outbox`.
    pub async fn connect(&self, conn_id: ConnectionId, outbox: Outbox) -> PeerId {
        let peer_id = self.registry.lock().await.register(conn_id, outbox);
        tracing::info!(%peer_id, %conn_id, "peer connected");
        peer_id
    }

    /// Handles one inbound packet from `peer_id`.
    ///
    /// Never fails: problems caused by the packet are answered with an
    /// error notice to the sender, anything else is logged.
    pub async fn dispatch(&self, peer_id: &PeerId, packet: Packet) {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.sessions().get(peer_id) else {
            tracing::debug!(%peer_id, kind = %packet.kind, "packet from unregistered peer dropped");
            return;
        };
        let handshaken = session.is_handshaken();

        match packet.kind {
            PacketType::Keepalive | PacketType::Benchmark => {
                registry.send(peer_id, packet);
            }
            PacketType::Handshake => handle_handshake(&mut registry, peer_id, &packet.payload),
            kind @ (PacketType::RoomControl | PacketType::Signaling) if !handshaken => {
                tracing::debug!(%peer_id, %kind, "packet before handshake rejected");
                send_error(&registry, peer_id, kind, "Handshake required");
            }
            PacketType::RoomControl => {
                handle_room_control(&mut registry, peer_id, &packet.payload, self.config.room.join_mode);
            }
            PacketType::Signaling => handle_signaling(&registry, peer_id, packet.payload),
        }
    }

    /// Removes a peer: out of its room (notifying the remaining members),
    /// then out of the registry.
    ///
    /// Idempotent. Returns `false` if the peer was already gone.
    pub async fn disconnect(&self, peer_id: &PeerId) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(departure) = registry.unregister(peer_id) else {
            return false;
        };
        if let Some(left) = &departure.left {
            notify_peer_left(&registry, peer_id, left);
        }
        tracing::info!(
            %peer_id,
            conn_id = %departure.session.conn_id,
            connected_for = ?departure.session.connected_at.elapsed(),
            "peer disconnected"
        );
        true
    }

    /// Members of a room in join order.
    pub async fn members_of(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.registry.lock().await.members_of(room_id)
    }

    /// Number of connected peers.
    pub async fn peer_count(&self) -> usize {
        self.registry.lock().await.peer_count()
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.room_count()
    }

    /// Names of every live room, sorted.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.registry.lock().await.room_ids()
    }

    /// A receiver that turns `true` once [`shutdown`](Self::shutdown) runs.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signals every task to stop and drops all rooms and sessions.
    ///
    /// No `peer-left` notifications are sent; everyone is going away.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let dropped = self.registry.lock().await.shutdown();
        tracing::info!(peers = dropped, "relay shut down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_handshake(registry: &mut Registry, peer_id: &PeerId, payload: &Payload) {
    // The handshake body is informational; anything unparseable counts as
    // an empty one.
    let hello: Handshake = payload.parse().unwrap_or_default();
    let agent = hello.agent.unwrap_or_default();

    match registry.mark_handshaken(peer_id, hello.name) {
        Ok(session) => {
            tracing::info!(%peer_id, name = %session.name, %agent, "handshake complete");
        }
        Err(e) => {
            tracing::debug!(%peer_id, error = %e, "handshake for unknown peer");
            return;
        }
    }
    send_json(registry, peer_id, PacketType::Handshake, &HandshakeAck::ok(peer_id.clone()));
}

fn handle_room_control(
    registry: &mut Registry,
    peer_id: &PeerId,
    payload: &Payload,
    join_mode: JoinMode,
) {
    let request: RoomRequest = match payload.parse() {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(%peer_id, error = %e, "malformed room request");
            send_error(registry, peer_id, PacketType::RoomControl, "Invalid room request");
            return;
        }
    };

    match request {
        RoomRequest::Join { room_id, name } => {
            let allow_create = join_mode == JoinMode::Create;
            handle_join(registry, peer_id, &room_id, name, allow_create);
        }
        RoomRequest::Create { room_id, name } => {
            handle_join(registry, peer_id, &room_id, name, true);
        }
        RoomRequest::Leave => match registry.leave_room(peer_id) {
            Some(left) => {
                notify_peer_left(registry, peer_id, &left);
                send_json(
                    registry,
                    peer_id,
                    PacketType::RoomControl,
                    &RoomEvent::Left { room_id: left.room_id },
                );
            }
            None => tracing::debug!(%peer_id, "leave while not in a room ignored"),
        },
    }
}

fn handle_join(
    registry: &mut Registry,
    peer_id: &PeerId,
    room_id: &RoomId,
    name: Option<String>,
    allow_create: bool,
) {
    let outcome = match registry.join_room(peer_id, room_id, name, allow_create) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(%peer_id, %room_id, error = %e, "join refused");
            send_error(registry, peer_id, PacketType::RoomControl, &e.to_string());
            return;
        }
    };

    if let Some(previous) = &outcome.previous {
        notify_peer_left(registry, peer_id, previous);
    }

    send_json(
        registry,
        peer_id,
        PacketType::RoomControl,
        &RoomEvent::Joined {
            room_id: outcome.room_id.clone(),
            client_id: peer_id.clone(),
            peers: outcome.peers.clone(),
        },
    );

    if outcome.rejoined {
        return;
    }
    let name = registry.sessions().get(peer_id).map(|s| s.name.clone());
    let event = RoomEvent::PeerJoined {
        peer_id: peer_id.clone(),
        name,
    };
    for peer in &outcome.peers {
        send_json(registry, &peer.client_id, PacketType::RoomControl, &event);
    }
}

fn handle_signaling(registry: &Registry, peer_id: &PeerId, payload: Payload) {
    let Some(room_id) = registry.sessions().get(peer_id).and_then(|s| s.room()).cloned() else {
        tracing::debug!(%peer_id, "signaling outside a room dropped");
        return;
    };

    let Payload::Json(Value::Object(mut body)) = payload else {
        send_error(registry, peer_id, PacketType::Signaling, "Signaling payload must be a JSON object");
        return;
    };
    // Overwrites any client-supplied value, so `from` cannot be spoofed.
    body.insert(FROM_FIELD.into(), Value::String(peer_id.to_string()));

    let target = match body.get(TARGET_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(target)) => Some(target.clone()),
        Some(_) => {
            send_error(registry, peer_id, PacketType::Signaling, "targetId must be a string");
            return;
        }
    };
    let packet = Packet::new(PacketType::Signaling, Value::Object(body));

    let Some(target) = target else {
        let recipients: Vec<PeerId> = registry
            .members_of(&room_id)
            .into_iter()
            .filter(|m| m != peer_id)
            .collect();
        tracing::debug!(%peer_id, %room_id, recipients = recipients.len(), "signaling broadcast");
        for recipient in &recipients {
            registry.send(recipient, packet.clone());
        }
        return;
    };

    match registry.find_by_display_id(&target) {
        Some(session) => {
            tracing::debug!(%peer_id, %target, "signaling relayed");
            registry.send(&session.peer_id, packet);
        }
        None => {
            let message = format!("Unknown target: {target}");
            send_error(registry, peer_id, PacketType::Signaling, &message);
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound helpers
// ---------------------------------------------------------------------------

fn notify_peer_left(registry: &Registry, peer_id: &PeerId, left: &LeaveOutcome) {
    let event = RoomEvent::PeerLeft {
        peer_id: peer_id.clone(),
    };
    for member in &left.remaining {
        send_json(registry, member, PacketType::RoomControl, &event);
    }
}

fn send_error(registry: &Registry, peer_id: &PeerId, kind: PacketType, message: &str) {
    send_json(registry, peer_id, kind, &Notice::error(message));
}

fn send_json<T: Serialize>(registry: &Registry, to: &PeerId, kind: PacketType, body: &T) {
    match Packet::json(kind, body) {
        Ok(packet) => {
            registry.send(to, packet);
        }
        Err(e) => tracing::warn!(peer_id = %to, %kind, error = %e, "failed to encode reply"),
    }
}

// =========================================================================
// Tests
// =========================================================================
