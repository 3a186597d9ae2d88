//! Per-connection transfer dispatcher.
//!
//! A [`Dispatcher`] owns the active codec of one connection. Outbound queries are encoded with
//! it and handed to a [`MessageSink`] as text or binary depending on what the codec produces.
//! Inbound messages are decoded with the active codec first; when that fails every other codec
//! is tried in a fixed order, so both peers keep working while one of them has already switched
//! format and the other has not yet seen the switch.
//!
//! The dispatcher is never unconfigured: it starts on uncompressed BSON and only
//! [`Dispatcher::set_format`] moves it to another combination. A rejected combination leaves
//! the previous one in place.
pub mod observer;

use std::{fmt, io, sync::Arc};

use bytes::Bytes;
use log::{debug, error, info, warn};

use crate::{
    codec::{Codec, Compression, Concurrency, Encoded, Format, Reentrant},
    error::{ConfigurationError, DecodeError, EncodeError, TransferError},
    query::{Query, QueryType},
};

pub use observer::{Direction, LogObserver, TransferEvent, TransferObserver, TransferStats};

/// Order in which codecs are tried after the active one failed.
const FALLBACK_ORDER: [(Format, Compression); 4] = [
    (Format::Bson, Compression::None),
    (Format::Bson, Compression::Fastest),
    (Format::Json, Compression::Fastest),
    (Format::Json, Compression::None),
];

/// Outbound half of a transport. Implementations deliver one complete message per call.
pub trait MessageSink: Send + Sync {
    fn send_binary(&self, message: Bytes) -> io::Result<()>;
    fn send_text(&self, message: String) -> io::Result<()>;
}

/// An inbound message as delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    Binary(&'a [u8]),
    Text(&'a str),
}

impl<'a> Inbound<'a> {
    pub fn as_bytes(self) -> &'a [u8] {
        match self {
            Inbound::Binary(bytes) => bytes,
            Inbound::Text(text) => text.as_bytes(),
        }
    }
}

impl<'a> From<&'a [u8]> for Inbound<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Inbound::Binary(bytes)
    }
}

impl<'a> From<&'a str> for Inbound<'a> {
    fn from(text: &'a str) -> Self {
        Inbound::Text(text)
    }
}

impl<'a> From<&'a Encoded> for Inbound<'a> {
    fn from(encoded: &'a Encoded) -> Self {
        match encoded {
            Encoded::Binary(bytes) => Inbound::Binary(bytes),
            Encoded::Text(text) => Inbound::Text(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    pub format: Format,
    pub compression: Compression,
    /// Whether the transport can carry text messages. Without it uncompressed JSON is
    /// unavailable, since it is the only combination sent as text.
    pub text_transfer: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            format: Format::Bson,
            compression: Compression::None,
            text_transfer: true,
        }
    }
}

impl TransferConfig {
    pub fn new(format: Format, compression: Compression) -> Self {
        Self {
            format,
            compression,
            ..Self::default()
        }
    }

    pub fn with_text_transfer(mut self, text_transfer: bool) -> Self {
        self.text_transfer = text_transfer;
        self
    }

    /// Checks that the configured combination can be used.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.check(self.format, self.compression)
    }

    fn check(&self, format: Format, compression: Compression) -> Result<(), ConfigurationError> {
        if format == Format::Json && !compression.is_compressed() && !self.text_transfer {
            return Err(ConfigurationError::Unsupported {
                format,
                compression,
            });
        }
        Ok(())
    }
}

pub struct Dispatcher<S: MessageSink, M: Concurrency = Reentrant> {
    sink: Arc<S>,
    config: TransferConfig,
    primary: Codec<M>,
    fallbacks: Vec<Codec<M>>,
    observer: Option<Arc<dyn TransferObserver>>,
}

impl<S: MessageSink, M: Concurrency> Dispatcher<S, M> {
    /// Creates a dispatcher on uncompressed BSON.
    pub fn new(sink: Arc<S>) -> Self {
        let config = TransferConfig::default();
        Self {
            sink,
            config,
            primary: Codec::new(config.format, config.compression),
            fallbacks: fallbacks_for(config.format, config.compression),
            observer: None,
        }
    }

    pub fn with_config(sink: Arc<S>, config: TransferConfig) -> Result<Self, ConfigurationError> {
        let mut dispatcher = Self::new(sink);
        dispatcher.config.text_transfer = config.text_transfer;
        dispatcher.configure(config.format, config.compression)?;
        Ok(dispatcher)
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn config(&self) -> TransferConfig {
        self.config
    }

    pub fn format(&self) -> Format {
        self.config.format
    }

    pub fn compression(&self) -> Compression {
        self.config.compression
    }

    /// Whether outbound messages need byte framing.
    pub fn binary_transfer(&self) -> bool {
        self.primary.is_binary()
    }

    /// Switches to the named combination, e.g. `("json", "fastest")`.
    ///
    /// Unknown names and unsupported combinations are logged and leave the active codec as it
    /// was.
    pub fn set_format(&mut self, format: &str, compression: &str) -> Result<(), ConfigurationError> {
        let parsed = format
            .parse::<Format>()
            .and_then(|format| Ok((format, compression.parse::<Compression>()?)));

        match parsed {
            Ok((format, compression)) => self.configure(format, compression),
            Err(e) => {
                error!("invalid format {format} / {compression}: {e}");
                Err(e)
            }
        }
    }

    pub fn configure(
        &mut self,
        format: Format,
        compression: Compression,
    ) -> Result<(), ConfigurationError> {
        if let Err(e) = self.config.check(format, compression) {
            error!("invalid format {format} / {compression}: {e}");
            return Err(e);
        }

        self.primary = Codec::new(format, compression);
        self.fallbacks = fallbacks_for(format, compression);
        self.config.format = format;
        self.config.compression = compression;

        info!(
            "transfer format set to {format} / {compression} ({} transfer)",
            if self.binary_transfer() { "binary" } else { "text" }
        );
        Ok(())
    }

    pub fn encode(&self, query: &Query) -> Result<Encoded, EncodeError> {
        let encoded = self.primary.encode(query)?;
        self.notify(Direction::Outbound, query.kind, &self.primary, encoded.len());
        Ok(encoded)
    }

    /// Encodes `query` with the active codec and hands it to the sink.
    pub fn send(&self, query: &Query) -> Result<(), TransferError> {
        let encoded = self.encode(query)?;
        self.deliver(encoded)
    }

    /// Consuming variant of [`Dispatcher::send`]. Native values in the query are moved into
    /// the outgoing document.
    pub fn send_owned(&self, query: Query) -> Result<(), TransferError> {
        let kind = query.kind;
        let encoded = self.primary.encode_owned(query)?;
        self.notify(Direction::Outbound, kind, &self.primary, encoded.len());
        self.deliver(encoded)
    }

    fn deliver(&self, encoded: Encoded) -> Result<(), TransferError> {
        match encoded {
            Encoded::Binary(bytes) => self.sink.send_binary(bytes)?,
            Encoded::Text(text) => self.sink.send_text(text)?,
        }
        Ok(())
    }

    /// Decodes an inbound message, falling back to the rest of the matrix when the active
    /// codec cannot read it.
    pub fn decode<'a>(&self, message: impl Into<Inbound<'a>>) -> Result<Query, DecodeError> {
        let input = message.into().as_bytes();
        let mut attempts = 0;

        for codec in std::iter::once(&self.primary).chain(&self.fallbacks) {
            attempts += 1;
            match codec.decode(input) {
                Ok(query) => {
                    if attempts > 1 {
                        debug!(
                            "decoded with fallback {} / {} after {attempts} attempts",
                            codec.format(),
                            codec.compression()
                        );
                    }
                    self.notify(Direction::Inbound, query.kind, codec, input.len());
                    return Ok(query);
                }
                Err(e) => debug!(
                    "{} / {} could not decode {} bytes: {e}",
                    codec.format(),
                    codec.compression(),
                    input.len()
                ),
            }
        }

        warn!("no codec could decode {} inbound bytes", input.len());
        Err(DecodeError::NoCodecMatched { attempts })
    }

    fn notify(&self, direction: Direction, kind: QueryType, codec: &Codec<M>, bytes: usize) {
        if let Some(observer) = &self.observer {
            observer.observe(&TransferEvent {
                direction,
                kind,
                format: codec.format(),
                compression: codec.compression(),
                bytes,
            });
        }
    }
}

/// The copy is bound to the same sink and configuration but owns fresh codecs.
impl<S: MessageSink, M: Concurrency> Clone for Dispatcher<S, M> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            config: self.config,
            primary: self.primary.clone(),
            fallbacks: self.fallbacks.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<S: MessageSink, M: Concurrency> fmt::Debug for Dispatcher<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("primary", &self.primary)
            .field("fallbacks", &self.fallbacks.len())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// Every codec of the matrix except the one equivalent to the active codec. Compression
/// levels decode alike, so only whether a codec compresses tells two codecs apart here.
fn fallbacks_for<M: Concurrency>(format: Format, compression: Compression) -> Vec<Codec<M>> {
    FALLBACK_ORDER
        .into_iter()
        .filter(|(f, c)| !(*f == format && c.is_compressed() == compression.is_compressed()))
        .map(|(f, c)| Codec::new(f, c))
        .collect()
}
