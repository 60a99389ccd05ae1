//! TCP front end for the relay.
//!
//! One task owns all state:
//!
//! 1. Accepts connections and hands each a [`ClientId`].
//! 2. Spawns a reader task per client that feeds inbound packets into
//!    a shared event channel.
//! 3. Runs [`RelayManager`] on every event and queues the routed
//!    packets onto per-client writer tasks.
//!
//! Writer queues are bounded and sends are awaited: a short burst
//! rides the queue, while a peer that stays slow throttles the relay
//! to its drain rate. Updates are never skipped, since a connection's
//! compressed stream decodes only as an unbroken whole.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use glimt_core::{Connection, ConnectionReader, ConnectionWriter, GlimtError, Packet};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::manager::RelayManager;
use crate::session::ClientId;

/// Outbound packets buffered per client before the relay throttles.
const WRITE_QUEUE_DEPTH: usize = 64;
/// Inbound events buffered across all clients.
const EVENT_QUEUE_DEPTH: usize = 256;

enum ServerEvent {
    Inbound { id: ClientId, packet: Packet },
    Closed { id: ClientId, error: Option<GlimtError> },
}

struct ClientHandle {
    tx: mpsc::Sender<Packet>,
    reader: JoinHandle<()>,
}

pub struct Server {
    listener: TcpListener,
    local: SocketAddr,
    manager: RelayManager,
    handles: HashMap<ClientId, ClientHandle>,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self, GlimtError> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        Ok(Self {
            listener,
            local,
            manager: RelayManager::new(),
            handles: HashMap::new(),
        })
    }

    /// The address the listener actually bound, which is only known after
    /// the fact when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Accept clients and route packets until the task is dropped.
    pub async fn run(mut self) {
        let (event_tx, mut events) = mpsc::channel(EVENT_QUEUE_DEPTH);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer, &event_tx),
                    Err(e) => warn!("accept error: {e}"),
                },
                // `event_tx` lives in this scope, so recv() cannot
                // return None while the loop runs.
                Some(event) = events.recv() => match event {
                    ServerEvent::Inbound { id, packet } => self.route(id, packet).await,
                    ServerEvent::Closed { id, error } => {
                        if let Some(error) = error {
                            warn!("client #{id} read error: {error}");
                        }
                        let outbound = self.disconnect(id);
                        self.deliver(outbound).await;
                    }
                },
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr, event_tx: &mpsc::Sender<ServerEvent>) {
        let conn = match Connection::new(stream) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("dropping connection from {peer}: {e}");
                return;
            }
        };
        let id = self.manager.client_connected(peer.to_string());
        let (reader, writer) = conn.split();
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let reader = tokio::spawn(reader_task(id, reader, event_tx.clone()));
        tokio::spawn(writer_task(id, writer, rx));
        self.handles.insert(id, ClientHandle { tx, reader });
    }

    async fn route(&mut self, id: ClientId, packet: Packet) {
        match self.manager.handle_packet(id, packet) {
            Ok(outbound) => self.deliver(outbound).await,
            Err(e) => {
                warn!("client #{id} broke protocol: {e}");
                let outbound = self.disconnect(id);
                self.deliver(outbound).await;
            }
        }
    }

    /// Send routed packets to their writer tasks, waiting while a
    /// queue is full. Disconnecting a dead client here produces leave
    /// broadcasts, which join the same queue rather than recursing.
    async fn deliver(&mut self, outbound: Vec<(ClientId, Packet)>) {
        let mut pending: VecDeque<(ClientId, Packet)> = outbound.into();
        while let Some((target, packet)) = pending.pop_front() {
            let Some(handle) = self.handles.get(&target) else {
                continue;
            };
            if handle.tx.send(packet).await.is_err() {
                // Writer already gone: the socket died before its
                // Closed event was serviced.
                pending.extend(self.disconnect(target));
            }
        }
    }

    /// Tear down one client and return the resulting broadcasts.
    fn disconnect(&mut self, id: ClientId) -> Vec<(ClientId, Packet)> {
        if let Some(handle) = self.handles.remove(&id) {
            handle.reader.abort();
        }
        self.manager.client_disconnected(id)
    }
}

async fn reader_task(
    id: ClientId,
    mut reader: ConnectionReader,
    events: mpsc::Sender<ServerEvent>,
) {
    let error = loop {
        match reader.recv().await {
            Ok(Some(packet)) => {
                if events.send(ServerEvent::Inbound { id, packet }).await.is_err() {
                    return;
                }
            }
            Ok(None) => break None,
            Err(e) => break Some(e),
        }
    };
    let _ = events.send(ServerEvent::Closed { id, error }).await;
}

async fn writer_task(id: ClientId, mut writer: ConnectionWriter, mut rx: mpsc::Receiver<Packet>) {
    while let Some(packet) = rx.recv().await {
        if let Err(e) = writer.send(packet).await {
            debug!("client #{id} write failed: {e}");
            return;
        }
    }
    // Queue dropped server-side: flush what went out and say goodbye.
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glimt_core::JoinStatus;
    use tokio::time::timeout;

    use super::*;

    async fn spawn_relay() -> SocketAddr {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(server.run());
        addr
    }

    async fn recv(conn: &mut Connection) -> Packet {
        timeout(Duration::from_secs(5), conn.recv())
            .await
            .expect("timeout")
            .expect("recv error")
            .expect("server closed the connection")
    }

    async fn join(conn: &mut Connection, session: &str, password: &str) -> JoinStatus {
        conn.send(Packet::JoinRequest {
            session: session.into(),
            password: password.into(),
        })
        .await
        .unwrap();
        match recv(conn).await {
            Packet::JoinResponse { status, .. } => status,
            other => panic!("expected a join response, got {other:?}"),
        }
    }

    fn cursor(x: u16, y: u16) -> Packet {
        Packet::CursorInfo { x, y, icon: 0 }
    }

    #[tokio::test]
    async fn join_acknowledged() {
        let addr = spawn_relay().await;
        let mut conn = Connection::connect(addr).await.unwrap();
        assert_eq!(join(&mut conn, "room", "pw").await, JoinStatus::Ok);
    }

    #[tokio::test]
    async fn data_relays_to_session_peers_only() {
        let addr = spawn_relay().await;
        let mut a = Connection::connect(addr).await.unwrap();
        let mut b = Connection::connect(addr).await.unwrap();
        let mut c = Connection::connect(addr).await.unwrap();
        join(&mut a, "room", "").await;
        join(&mut b, "room", "").await;
        join(&mut c, "elsewhere", "").await;

        // a learns that b arrived.
        assert!(matches!(
            recv(&mut a).await,
            Packet::JoinResponse {
                status: JoinStatus::ClientJoined,
                client: Some(_),
            }
        ));

        a.send(cursor(5, 6)).await.unwrap();
        assert_eq!(recv(&mut b).await, cursor(5, 6));

        // The other session hears nothing.
        let quiet = timeout(Duration::from_millis(200), c.recv()).await;
        assert!(quiet.is_err(), "c must not receive relayed data");
    }

    #[tokio::test]
    async fn wrong_password_is_refused() {
        let addr = spawn_relay().await;
        let mut owner = Connection::connect(addr).await.unwrap();
        join(&mut owner, "locked", "secret").await;

        let mut intruder = Connection::connect(addr).await.unwrap();
        assert_eq!(
            join(&mut intruder, "locked", "nope").await,
            JoinStatus::InvalidPassword
        );

        // The refused client can still join elsewhere.
        assert_eq!(join(&mut intruder, "other", "").await, JoinStatus::Ok);
    }

    #[tokio::test]
    async fn disconnect_broadcasts_client_left() {
        let addr = spawn_relay().await;
        let mut a = Connection::connect(addr).await.unwrap();
        let b = {
            let mut b = Connection::connect(addr).await.unwrap();
            join(&mut b, "room", "").await;
            b
        };
        join(&mut a, "room", "").await;

        // b sees a arrive, then a sees b leave.
        drop(b);
        let packet = recv(&mut a).await;
        assert!(matches!(
            packet,
            Packet::JoinResponse {
                status: JoinStatus::ClientLeft,
                client: Some(_),
            }
        ));
    }

    #[tokio::test]
    async fn share_geometry_replays_to_late_joiner() {
        let addr = spawn_relay().await;
        let mut sharer = Connection::connect(addr).await.unwrap();
        join(&mut sharer, "room", "").await;
        sharer
            .send(Packet::ShareStart {
                width: 1024,
                height: 768,
            })
            .await
            .unwrap();

        let mut viewer = Connection::connect(addr).await.unwrap();
        assert_eq!(join(&mut viewer, "room", "").await, JoinStatus::Ok);
        assert_eq!(
            recv(&mut viewer).await,
            Packet::ShareStart {
                width: 1024,
                height: 768,
            }
        );
    }

    #[tokio::test]
    async fn sessionless_data_is_not_fatal() {
        let addr = spawn_relay().await;
        let mut conn = Connection::connect(addr).await.unwrap();
        conn.send(cursor(1, 1)).await.unwrap();

        // The connection survives and a later join still works.
        assert_eq!(join(&mut conn, "room", "").await, JoinStatus::Ok);
    }

    #[tokio::test]
    async fn client_sending_join_response_is_disconnected() {
        let addr = spawn_relay().await;
        let mut conn = Connection::connect(addr).await.unwrap();
        conn.send(Packet::JoinResponse {
            status: JoinStatus::Ok,
            client: None,
        })
        .await
        .unwrap();

        let next = timeout(Duration::from_secs(5), conn.recv())
            .await
            .expect("timeout");
        assert!(matches!(next, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn relay_carries_updates_between_peers() {
        let addr = spawn_relay().await;
        let mut sharer = Connection::connect(addr).await.unwrap();
        let mut viewer = Connection::connect(addr).await.unwrap();
        join(&mut sharer, "room", "").await;
        join(&mut viewer, "room", "").await;
        assert!(matches!(
            recv(&mut sharer).await,
            Packet::JoinResponse {
                status: JoinStatus::ClientJoined,
                ..
            }
        ));

        let update = Packet::FramebufferUpdate {
            rects: vec![glimt_core::WireRect {
                x: 64,
                y: 0,
                width: 32,
                height: 64,
                data: vec![0xab; 100].into(),
            }],
        };
        sharer.send(update.clone()).await.unwrap();
        assert_eq!(recv(&mut viewer).await, update);
    }
}
