//! Client-server plumbing around the dispatcher.
//!
//! Encoded queries travel inside bincode [`Frame`]s over any bidirectional stream. A frame is
//! either binary or text, mirroring the two kinds of output a codec produces, or a close
//! request. The [`QueryServer`] accepts TCP connections and serves each one from a worker
//! thread with its own single-owner dispatcher; the [`QueryClient`] is the matching blocking
//! client.
//!
//! # Session protocol
//!
//! - PING is answered with PONG.
//! - CONFIGURATION carries [`SessionOptions`](crate::SessionOptions). The server replies with
//!   SUCCESS in the current format and only then switches; an unusable combination gets an
//!   ERROR reply and nothing changes.
//! - Everything else is passed to a [`QueryHandler`].
//! - A message no codec can read is answered with ERROR and the connection stays open.
//!
//! # Frame format
//!
//! Frames use bincode's big-endian fixed-int encoding: a 4 byte variant tag followed, for
//! binary and text frames, by an 8 byte length and the message bytes. Frames larger than
//! [`MAX_FRAME_SIZE`](transport::MAX_FRAME_SIZE) are rejected.
mod client;
mod server;
mod thread;
pub mod transport;

use thread::ThreadPool;

pub use client::QueryClient;
pub use server::{EchoHandler, QueryHandler, QueryServer};
pub use transport::{Frame, FrameSink, FrameTransport, TransportError};
