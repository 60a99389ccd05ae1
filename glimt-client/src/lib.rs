//! # glimt-client — share or view a glimt session
//!
//! Connects to a `glimt-server` relay, joins a named session, and
//! either streams the local screen as compressed tile updates or
//! paints incoming updates into an in-memory canvas.
//!
//! The binary drives [`session::SessionClient`] from the terminal; an
//! embedding UI would do the same and repaint from the event stream.

pub mod config;
pub mod events;
pub mod grab;
pub mod session;
