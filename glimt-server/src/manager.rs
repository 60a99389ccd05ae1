//! Relay state machine.
//!
//! `RelayManager` is pure bookkeeping: packets and lifecycle events go
//! in, `(recipient, packet)` pairs come out. The network layer in
//! [`crate::server`] owns the sockets and feeds it from one task, so
//! no locking happens here.
//!
//! Rect payloads are never inflated on this side. The relay forwards
//! them byte for byte, which is what lets one sharer's compression
//! stream serve every viewer in the session.

use std::collections::HashMap;

use glimt_core::{GlimtError, JoinStatus, Packet};
use tracing::{debug, info, warn};

use crate::session::{ClientId, Session};

#[derive(Debug)]
struct ClientMeta {
    /// Peer address string, used as the client's name in broadcasts.
    name: String,
    session: Option<String>,
}

pub struct RelayManager {
    sessions: HashMap<String, Session>,
    clients: HashMap<ClientId, ClientMeta>,
    next_id: ClientId,
}

impl RelayManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            clients: HashMap::new(),
            next_id: 1,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn client_connected(&mut self, name: String) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        info!("client {name} connected as #{id}");
        self.clients.insert(
            id,
            ClientMeta {
                name,
                session: None,
            },
        );
        id
    }

    pub fn client_disconnected(&mut self, id: ClientId) -> Vec<(ClientId, Packet)> {
        let Some(meta) = self.clients.remove(&id) else {
            return Vec::new();
        };
        info!("client {} (#{id}) disconnected", meta.name);
        match meta.session {
            Some(session_name) => self.leave_session(id, &meta.name, &session_name),
            None => Vec::new(),
        }
    }

    // ── Packet handling ──────────────────────────────────────────

    /// Route one inbound packet. An `Err` means the sender broke the
    /// protocol and must be disconnected.
    pub fn handle_packet(
        &mut self,
        id: ClientId,
        packet: Packet,
    ) -> Result<Vec<(ClientId, Packet)>, GlimtError> {
        match packet {
            Packet::JoinRequest { session, password } => {
                Ok(self.handle_join(id, session, password))
            }
            Packet::JoinResponse { .. } => Err(GlimtError::ProtocolViolation(
                "join response sent by a client",
            )),
            Packet::ShareStart { width, height } => Ok(self.handle_share_start(id, width, height)),
            packet @ (Packet::CursorInfo { .. } | Packet::FramebufferUpdate { .. }) => {
                Ok(self.relay_to_others(id, packet))
            }
        }
    }

    fn handle_join(
        &mut self,
        id: ClientId,
        session_name: String,
        password: String,
    ) -> Vec<(ClientId, Packet)> {
        let Some((client_name, current)) = self
            .clients
            .get(&id)
            .map(|meta| (meta.name.clone(), meta.session.clone()))
        else {
            return Vec::new();
        };

        // Password gate comes first: a refused join must leave the
        // client's existing membership untouched.
        if let Some(existing) = self.sessions.get(&session_name) {
            if !existing.password_matches(&password) {
                warn!("client {client_name} gave a wrong password for session {session_name:?}");
                return vec![(
                    id,
                    Packet::JoinResponse {
                        status: JoinStatus::InvalidPassword,
                        client: None,
                    },
                )];
            }
        }

        let mut out = Vec::new();
        if let Some(previous) = current {
            out.extend(self.leave_session(id, &client_name, &previous));
        }

        // Look up again: leaving may have destroyed the target when
        // the client rejoins a room it was the last member of.
        let session = self.sessions.entry(session_name.clone()).or_insert_with(|| {
            info!("session {session_name:?} created");
            Session::new(&password)
        });
        session.join(id);
        let others: Vec<ClientId> = session.others(id).collect();
        let share = session.share();

        if let Some(meta) = self.clients.get_mut(&id) {
            meta.session = Some(session_name.clone());
        }
        info!("client {client_name} joined session {session_name:?}");

        out.push((
            id,
            Packet::JoinResponse {
                status: JoinStatus::Ok,
                client: None,
            },
        ));
        for other in others {
            out.push((
                other,
                Packet::JoinResponse {
                    status: JoinStatus::ClientJoined,
                    client: Some(client_name.clone()),
                },
            ));
        }
        // Late joiners need the screen geometry before any rects.
        if let Some((width, height)) = share {
            out.push((id, Packet::ShareStart { width, height }));
        }
        out
    }

    fn handle_share_start(
        &mut self,
        id: ClientId,
        width: u16,
        height: u16,
    ) -> Vec<(ClientId, Packet)> {
        if let Some(session_name) = self.clients.get(&id).and_then(|meta| meta.session.clone()) {
            if let Some(session) = self.sessions.get_mut(&session_name) {
                debug!("session {session_name:?} now shares a {width}×{height} screen");
                session.set_share(width, height);
            }
        }
        self.relay_to_others(id, Packet::ShareStart { width, height })
    }

    /// Forward `packet` to every other member of the sender's session.
    /// Data from a client that is in no session is dropped, not fatal.
    fn relay_to_others(&mut self, id: ClientId, packet: Packet) -> Vec<(ClientId, Packet)> {
        let Some(meta) = self.clients.get(&id) else {
            return Vec::new();
        };
        let Some(session_name) = meta.session.as_deref() else {
            warn!(
                "client {} sent {} outside any session",
                meta.name,
                packet.packet_type()
            );
            return Vec::new();
        };
        let Some(session) = self.sessions.get(session_name) else {
            return Vec::new();
        };
        session
            .others(id)
            .map(|other| (other, packet.clone()))
            .collect()
    }

    fn leave_session(
        &mut self,
        id: ClientId,
        client_name: &str,
        session_name: &str,
    ) -> Vec<(ClientId, Packet)> {
        let Some(session) = self.sessions.get_mut(session_name) else {
            return Vec::new();
        };
        if !session.leave(id) {
            return Vec::new();
        }
        if session.is_empty() {
            self.sessions.remove(session_name);
            info!("session {session_name:?} destroyed");
            return Vec::new();
        }
        session
            .members()
            .iter()
            .map(|&other| {
                (
                    other,
                    Packet::JoinResponse {
                        status: JoinStatus::ClientLeft,
                        client: Some(client_name.to_string()),
                    },
                )
            })
            .collect()
    }
}

impl Default for RelayManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glimt_core::WireRect;

    use super::*;

    fn join(
        manager: &mut RelayManager,
        id: ClientId,
        session: &str,
        password: &str,
    ) -> Vec<(ClientId, Packet)> {
        manager
            .handle_packet(
                id,
                Packet::JoinRequest {
                    session: session.into(),
                    password: password.into(),
                },
            )
            .unwrap()
    }

    fn update() -> Packet {
        Packet::FramebufferUpdate {
            rects: vec![WireRect {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
                data: vec![1, 2, 3].into(),
            }],
        }
    }

    fn member_count(manager: &RelayManager, name: &str) -> usize {
        manager
            .sessions
            .get(name)
            .map_or(0, |session| session.members().len())
    }

    fn session_of(manager: &RelayManager, id: ClientId) -> Option<&str> {
        manager.clients.get(&id).and_then(|meta| meta.session.as_deref())
    }

    #[test]
    fn first_join_creates_session() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());

        let out = join(&mut manager, a, "room", "pw");
        assert_eq!(
            out,
            vec![(
                a,
                Packet::JoinResponse {
                    status: JoinStatus::Ok,
                    client: None,
                }
            )]
        );
        assert_eq!(manager.sessions.len(), 1);
        assert_eq!(member_count(&manager, "room"), 1);
        assert_eq!(session_of(&manager, a), Some("room"));
    }

    #[test]
    fn second_join_notifies_existing_members() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "room", "pw");

        let out = join(&mut manager, b, "room", "pw");
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            (
                b,
                Packet::JoinResponse {
                    status: JoinStatus::Ok,
                    client: None,
                }
            )
        );
        assert_eq!(
            out[1],
            (
                a,
                Packet::JoinResponse {
                    status: JoinStatus::ClientJoined,
                    client: Some("10.0.0.2:2222".into()),
                }
            )
        );
    }

    #[test]
    fn wrong_password_keeps_previous_membership() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "locked", "secret");
        join(&mut manager, b, "open", "");

        let out = join(&mut manager, b, "locked", "wrong");
        assert_eq!(
            out,
            vec![(
                b,
                Packet::JoinResponse {
                    status: JoinStatus::InvalidPassword,
                    client: None,
                }
            )]
        );
        // b stays exactly where it was.
        assert_eq!(session_of(&manager, b), Some("open"));
        assert_eq!(member_count(&manager, "open"), 1);
        assert_eq!(member_count(&manager, "locked"), 1);
    }

    #[test]
    fn open_session_ignores_the_attempted_password() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "open", "");

        // A stale or habitual password must not lock b out of a
        // session that was created without one.
        let out = join(&mut manager, b, "open", "habit");
        assert_eq!(
            out[0],
            (
                b,
                Packet::JoinResponse {
                    status: JoinStatus::Ok,
                    client: None,
                }
            )
        );
        assert_eq!(member_count(&manager, "open"), 2);
        assert_eq!(session_of(&manager, b), Some("open"));
    }

    #[test]
    fn switching_sessions_broadcasts_a_leave() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "one", "");
        join(&mut manager, b, "one", "");

        let out = join(&mut manager, b, "two", "");
        assert!(out.contains(&(
            a,
            Packet::JoinResponse {
                status: JoinStatus::ClientLeft,
                client: Some("10.0.0.2:2222".into()),
            }
        )));
        assert!(out.contains(&(
            b,
            Packet::JoinResponse {
                status: JoinStatus::Ok,
                client: None,
            }
        )));
        assert_eq!(member_count(&manager, "one"), 1);
        assert_eq!(member_count(&manager, "two"), 1);
    }

    #[test]
    fn last_leave_destroys_the_session() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        join(&mut manager, a, "solo", "");
        assert_eq!(manager.sessions.len(), 1);

        let out = manager.client_disconnected(a);
        assert!(out.is_empty());
        assert!(manager.sessions.is_empty());
    }

    #[test]
    fn disconnect_notifies_remaining_members() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "room", "");
        join(&mut manager, b, "room", "");

        let out = manager.client_disconnected(a);
        assert_eq!(
            out,
            vec![(
                b,
                Packet::JoinResponse {
                    status: JoinStatus::ClientLeft,
                    client: Some("10.0.0.1:1111".into()),
                }
            )]
        );
        assert_eq!(member_count(&manager, "room"), 1);
    }

    #[test]
    fn relay_reaches_only_session_peers() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        let c = manager.client_connected("10.0.0.3:3333".into());
        join(&mut manager, a, "room", "");
        join(&mut manager, b, "room", "");
        join(&mut manager, c, "elsewhere", "");

        let out = manager.handle_packet(a, update()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, b);
        assert!(matches!(out[0].1, Packet::FramebufferUpdate { .. }));
    }

    #[test]
    fn relay_preserves_rect_bytes() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "room", "");
        join(&mut manager, b, "room", "");

        let out = manager.handle_packet(a, update()).unwrap();
        assert_eq!(out[0].1, update());
    }

    #[test]
    fn sessionless_data_is_dropped_quietly() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());

        let out = manager.handle_packet(a, update()).unwrap();
        assert!(out.is_empty());
        let out = manager
            .handle_packet(a, Packet::CursorInfo { x: 1, y: 2, icon: 0 })
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn share_start_is_recorded_and_replayed() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "room", "");

        let out = manager
            .handle_packet(
                a,
                Packet::ShareStart {
                    width: 800,
                    height: 600,
                },
            )
            .unwrap();
        assert!(out.is_empty(), "nobody else to relay to yet");

        // The late joiner gets Ok, then the recorded geometry.
        let out = join(&mut manager, b, "room", "");
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[2],
            (
                b,
                Packet::ShareStart {
                    width: 800,
                    height: 600,
                }
            )
        );
    }

    #[test]
    fn cursor_info_relays_to_peers() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let b = manager.client_connected("10.0.0.2:2222".into());
        join(&mut manager, a, "room", "");
        join(&mut manager, b, "room", "");

        let out = manager
            .handle_packet(b, Packet::CursorInfo { x: 9, y: 8, icon: 1 })
            .unwrap();
        assert_eq!(out, vec![(a, Packet::CursorInfo { x: 9, y: 8, icon: 1 })]);
    }

    #[test]
    fn join_response_from_client_is_a_violation() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        let result = manager.handle_packet(
            a,
            Packet::JoinResponse {
                status: JoinStatus::Ok,
                client: None,
            },
        );
        assert!(matches!(result, Err(GlimtError::ProtocolViolation(_))));
    }

    #[test]
    fn sole_member_can_rejoin_its_own_session() {
        let mut manager = RelayManager::new();
        let a = manager.client_connected("10.0.0.1:1111".into());
        join(&mut manager, a, "room", "pw");

        // The old instance is destroyed on leave and recreated, so the
        // recorded share geometry resets with it.
        let out = join(&mut manager, a, "room", "pw");
        assert!(out.contains(&(
            a,
            Packet::JoinResponse {
                status: JoinStatus::Ok,
                client: None,
            }
        )));
        assert_eq!(manager.sessions.len(), 1);
        assert_eq!(member_count(&manager, "room"), 1);
    }

    #[test]
    fn unknown_client_ids_are_ignored() {
        let mut manager = RelayManager::new();
        assert!(manager.client_disconnected(42).is_empty());
        let out = manager.handle_packet(42, update()).unwrap();
        assert!(out.is_empty());
    }
}
