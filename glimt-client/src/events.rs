//! Session events surfaced to whatever is driving the client: the CLI
//! prints them, an embedding UI would repaint from them.

/// Things that happen while a [`crate::session::SessionClient`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Another client joined the session.
    PeerJoined(String),
    /// Another client left the session.
    PeerLeft(String),
    /// A peer began sharing; the canvas was resized to fit.
    ShareStarted { width: u16, height: u16 },
    /// A peer moved its cursor.
    CursorMoved { x: u16, y: u16, icon: u8 },
    /// Rects were decoded and painted onto the canvas.
    FrameUpdated { rect_count: usize },
    /// The server closed the connection.
    Disconnected,
}
