//! The client session loop.
//!
//! `SessionClient` owns one connection to the relay plus both halves
//! of the compression context: an encoder for frames this client
//! shares, a decoder for frames it views. The two streams live as
//! long as the connection, never per update, so every rect builds on
//! the dictionary of the ones before it.
//!
//! [`run`] interleaves two things on one task: a capture ticker that
//! fires only while sharing, and inbound packets from the relay.
//! Sends are awaited inline, so a congested uplink slows the ticker
//! down instead of queueing stale frames.
//!
//! [`run`]: SessionClient::run

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use glimt_core::{
    Connection, GlimtError, JoinStatus, Packet, PixelBuffer, ScreenUpdate, ViewCanvas, WireRect,
    ZrleDecoder, ZrleEncoder, compare_screens,
};

use crate::events::SessionEvent;
use crate::grab::ScreenGrabber;

/// Everything the capture ticker needs while this client shares.
struct ShareState {
    grabber: Box<dyn ScreenGrabber>,
    current: PixelBuffer,
    previous: Option<PixelBuffer>,
    cursor: Option<(u16, u16)>,
}

/// What one pass of the select loop decided to do.
enum Step {
    Tick,
    Inbound(Option<Packet>),
}

pub struct SessionClient {
    conn: Connection,
    encoder: ZrleEncoder,
    decoder: ZrleDecoder,
    canvas: ViewCanvas,
    share: Option<ShareState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    capture_interval: Duration,
}

impl SessionClient {
    /// Connect to a relay. Returns the client and the receiving end
    /// of its event stream.
    pub async fn connect(
        addr: &str,
        capture_interval: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), GlimtError> {
        let conn = Connection::connect(addr).await?;
        // A zero period would panic the timer.
        let capture_interval = capture_interval.max(Duration::from_millis(1));
        let (events, events_rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                conn,
                encoder: ZrleEncoder::new(),
                decoder: ZrleDecoder::new(),
                canvas: ViewCanvas::new(0, 0),
                share: None,
                events,
                capture_interval,
            },
            events_rx,
        ))
    }

    /// Ask the relay for a session and wait for its verdict.
    ///
    /// Membership broadcasts that arrive while waiting are forwarded
    /// as events; anything else is processed as usual.
    pub async fn join(&mut self, session: &str, password: &str) -> Result<JoinStatus, GlimtError> {
        self.conn
            .send(Packet::JoinRequest {
                session: session.to_string(),
                password: password.to_string(),
            })
            .await?;

        loop {
            let Some(packet) = self.conn.recv().await? else {
                return Err(GlimtError::ConnectionClosed);
            };
            match packet {
                Packet::JoinResponse { status, client } => match status {
                    JoinStatus::ClientJoined => {
                        self.emit(SessionEvent::PeerJoined(client.unwrap_or_default()));
                    }
                    JoinStatus::ClientLeft => {
                        self.emit(SessionEvent::PeerLeft(client.unwrap_or_default()));
                    }
                    verdict => return Ok(verdict),
                },
                other => self.process_packet(other)?,
            }
        }
    }

    /// Announce this client's screen and arm the capture ticker.
    pub async fn start_share(
        &mut self,
        grabber: Box<dyn ScreenGrabber>,
    ) -> Result<(), GlimtError> {
        let (width, height) = grabber.size();
        self.conn.send(Packet::ShareStart { width, height }).await?;
        self.share = Some(ShareState {
            grabber,
            current: PixelBuffer::new(width, height),
            previous: None,
            cursor: None,
        });
        Ok(())
    }

    /// Stop capturing. The connection and its streams stay up.
    pub fn stop_share(&mut self) {
        self.share = None;
    }

    pub fn is_sharing(&self) -> bool {
        self.share.is_some()
    }

    /// The viewed screen as of the last applied update.
    pub fn canvas(&self) -> &ViewCanvas {
        &self.canvas
    }

    /// Drive the session until the server closes the connection or a
    /// protocol error ends it.
    pub async fn run(&mut self) -> Result<(), GlimtError> {
        let mut ticker = tokio::time::interval(self.capture_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Decide, then act: the handlers below need `&mut self`,
            // so the select arms themselves stay borrow-free.
            let step = tokio::select! {
                _ = ticker.tick(), if self.share.is_some() => Step::Tick,
                packet = self.conn.recv() => Step::Inbound(packet?),
            };

            match step {
                Step::Tick => self.share_tick().await?,
                Step::Inbound(Some(packet)) => self.process_packet(packet)?,
                Step::Inbound(None) => {
                    self.emit(SessionEvent::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    // ── Sharing ──────────────────────────────────────────────────

    /// One capture beat: cursor if it moved, then the frame delta.
    async fn share_tick(&mut self) -> Result<(), GlimtError> {
        let Some(share) = self.share.as_mut() else {
            return Ok(());
        };

        if let Some((x, y)) = share.grabber.cursor_position() {
            if share.cursor != Some((x, y)) {
                share.cursor = Some((x, y));
                self.conn.send(Packet::CursorInfo { x, y, icon: 0 }).await?;
            }
        }

        // A failed grab skips the beat; the session survives.
        if let Err(e) = share.grabber.capture(&mut share.current) {
            warn!("screen capture failed: {e}");
            return Ok(());
        }

        let update = compare_screens(&share.current, share.previous.as_ref());

        // Rotate buffers without reallocating.
        let (width, height) = (share.current.width, share.current.height);
        match share.previous.as_mut() {
            Some(previous) => std::mem::swap(previous, &mut share.current),
            None => {
                share.previous = Some(std::mem::replace(
                    &mut share.current,
                    PixelBuffer::new(width, height),
                ));
            }
        }

        let Some(update) = update else {
            return Ok(());
        };
        let rects = update
            .rects
            .iter()
            .map(|rect| {
                Ok(WireRect {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    data: self.encoder.encode_rect(rect)?,
                })
            })
            .collect::<Result<Vec<_>, GlimtError>>()?;
        debug!("sending {} changed rects", rects.len());
        self.conn.send(Packet::FramebufferUpdate { rects }).await?;
        Ok(())
    }

    // ── Viewing ──────────────────────────────────────────────────

    fn process_packet(&mut self, packet: Packet) -> Result<(), GlimtError> {
        match packet {
            Packet::JoinResponse { status, client } => {
                match status {
                    JoinStatus::ClientJoined => {
                        self.emit(SessionEvent::PeerJoined(client.unwrap_or_default()));
                    }
                    JoinStatus::ClientLeft => {
                        self.emit(SessionEvent::PeerLeft(client.unwrap_or_default()));
                    }
                    verdict => debug!("stray join verdict {verdict} outside a join"),
                }
                Ok(())
            }
            Packet::ShareStart { width, height } => {
                // A new share reuses the connection's streams; only
                // the canvas geometry resets.
                self.canvas.resize(width, height);
                self.emit(SessionEvent::ShareStarted { width, height });
                Ok(())
            }
            Packet::CursorInfo { x, y, icon } => {
                self.emit(SessionEvent::CursorMoved { x, y, icon });
                Ok(())
            }
            Packet::FramebufferUpdate { rects } => {
                let mut decoded = Vec::with_capacity(rects.len());
                for wire_rect in &rects {
                    decoded.push(self.decoder.decode_rect(
                        wire_rect.x,
                        wire_rect.y,
                        wire_rect.width,
                        wire_rect.height,
                        &wire_rect.data,
                    )?);
                }
                let rect_count = decoded.len();
                self.canvas.apply(&ScreenUpdate { rects: decoded });
                self.emit(SessionEvent::FrameUpdated { rect_count });
                Ok(())
            }
            Packet::JoinRequest { .. } => Err(GlimtError::ProtocolViolation(
                "join request sent by the server",
            )),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
