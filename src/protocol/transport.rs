use std::{
    io::{self, Read, Write},
    sync::{Mutex, PoisonError},
};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint, Limit},
    decode_from_std_read, encode_into_std_write,
};
use bytes::Bytes;
use thiserror::Error;

use crate::{
    error::{ConfigurationError, DecodeError, TransferError},
    transfer::{Inbound, MessageSink},
};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

type FrameConfig = Configuration<BigEndian, Fixint, Limit<MAX_FRAME_SIZE>>;

fn frame_config() -> FrameConfig {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<MAX_FRAME_SIZE>()
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode frame: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode frame: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    /// Whether the peer went away, as opposed to sending something broken.
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            TransportError::Closed => return true,
            TransportError::Io(e) => e,
            TransportError::Deserialize(bincode::error::DecodeError::Io { inner, .. }) => inner,
            _ => return false,
        };
        matches!(
            io.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }
}

/// Transport level envelope around an encoded query.
#[derive(Debug, Clone, Encode, Decode, PartialEq, Eq)]
pub enum Frame {
    Binary(Vec<u8>),
    Text(String),
    Close,
}

impl Frame {
    /// The message carried by this frame, `None` for [`Frame::Close`].
    pub fn inbound(&self) -> Option<Inbound<'_>> {
        match self {
            Frame::Binary(bytes) => Some(Inbound::Binary(bytes)),
            Frame::Text(text) => Some(Inbound::Text(text)),
            Frame::Close => None,
        }
    }
}

pub struct FrameTransport<T: Read + Write> {
    stream: T,
    config: FrameConfig,
}

impl<T: Read + Write> FrameTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            config: frame_config(),
        }
    }

    pub fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        encode_into_std_write(frame, &mut self.stream, self.config)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let frame: Frame = decode_from_std_read(&mut self.stream, self.config)?;
        Ok(frame)
    }

    pub fn into_inner(self) -> T {
        self.stream
    }
}

/// Writing half of a connection, shared by everything that replies on it.
pub struct FrameSink<W: Write> {
    writer: Mutex<W>,
    config: FrameConfig,
}

impl<W: Write> FrameSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            config: frame_config(),
        }
    }

    pub fn close(&self) -> io::Result<()> {
        self.write(Frame::Close)
    }

    fn write(&self, frame: Frame) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        encode_into_std_write(frame, &mut *writer, self.config).map_err(io::Error::other)?;
        writer.flush()
    }
}

impl<W: Write + Send> MessageSink for FrameSink<W> {
    fn send_binary(&self, message: Bytes) -> io::Result<()> {
        self.write(Frame::Binary(message.to_vec()))
    }

    fn send_text(&self, message: String) -> io::Result<()> {
        self.write(Frame::Text(message))
    }
}
