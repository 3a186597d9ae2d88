use std::{
    net::{SocketAddr, TcpListener, TcpStream},
    sync::Arc,
};

use log::{debug, info, warn};

use crate::{
    codec::SingleOwner,
    query::{Query, QueryType},
    result::ResultSet,
    session::SessionOptions,
    transfer::{Dispatcher, LogObserver, TransferConfig, TransferObserver},
};

use super::{
    ThreadPool,
    transport::{FrameSink, FrameTransport, TransportError},
};

const DEFAULT_WORKERS: usize = 15;

/// Answers queries that are not part of the session protocol itself.
pub trait QueryHandler: Send + Sync {
    /// Returns the reply to send, if any.
    fn handle(&self, query: Query) -> Option<Query>;
}

/// Replies to every query with a single result holding the query's parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl QueryHandler for EchoHandler {
    fn handle(&self, query: Query) -> Option<Query> {
        Some(Query::result(
            query.id,
            &ResultSet::single(query.parameters),
        ))
    }
}

type Connection = Dispatcher<FrameSink<TcpStream>, SingleOwner>;

pub struct QueryServer {
    listener: TcpListener,
    pool: ThreadPool,
    handler: Arc<dyn QueryHandler>,
    observer: Arc<dyn TransferObserver>,
    config: TransferConfig,
}

impl QueryServer {
    pub fn bind(address: SocketAddr, config: TransferConfig) -> Result<Self, TransportError> {
        config.validate()?;

        Ok(Self {
            listener: TcpListener::bind(address)?,
            pool: ThreadPool::new(DEFAULT_WORKERS)?,
            handler: Arc::new(EchoHandler),
            observer: Arc::new(LogObserver),
            config,
        })
    }

    pub fn with_handler(mut self, handler: Arc<dyn QueryHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// # Panics
    /// If `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, TransportError> {
        self.pool = ThreadPool::new(workers)?;
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn listen(self) -> Result<(), TransportError> {
        info!(
            "listening at {} with {} workers, initial format {} / {}",
            self.local_addr()?,
            self.pool.size(),
            self.config.format,
            self.config.compression
        );

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = Arc::clone(&self.handler);
                    let observer = Arc::clone(&self.observer);
                    let config = self.config;
                    self.pool.execute(move || {
                        if let Err(e) = handle_connection(stream, handler, observer, config) {
                            warn!("connection failed: {e}");
                        }
                    });
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }
        }
        Ok(())
    }
}

fn handle_connection(
    stream: TcpStream,
    handler: Arc<dyn QueryHandler>,
    observer: Arc<dyn TransferObserver>,
    config: TransferConfig,
) -> Result<(), TransportError> {
    let peer = stream.peer_addr()?;
    let sink = Arc::new(FrameSink::new(stream.try_clone()?));
    let mut transport = FrameTransport::new(stream);
    let mut dispatcher: Connection = Dispatcher::with_config(sink, config)?.with_observer(observer);
    info!("accepted connection from {peer}");

    loop {
        let frame = match transport.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => {
                info!("{peer} disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let Some(inbound) = frame.inbound() else {
            dispatcher.sink().close()?;
            info!("{peer} closed the connection");
            return Ok(());
        };

        let query = match dispatcher.decode(inbound) {
            Ok(query) => query,
            Err(e) => {
                warn!("undecodable message from {peer}: {e}");
                dispatcher.send(&Query::error(0, e.to_string()))?;
                continue;
            }
        };
        debug!("received {} query {} from {peer}", query.kind, query.id);

        match query.kind {
            QueryType::Ping => dispatcher.send(&Query::new(query.id, QueryType::Pong))?,
            QueryType::Configuration => configure(&mut dispatcher, query)?,
            QueryType::Pong | QueryType::Success | QueryType::Error | QueryType::Result => {
                debug!("ignoring unsolicited {} from {peer}", query.kind);
            }
            _ => {
                if let Some(reply) = handler.handle(query) {
                    dispatcher.send_owned(reply)?;
                }
            }
        }
    }
}

/// Acknowledges in the current format, then switches. Options the query leaves out keep the
/// connection's current values.
fn configure(dispatcher: &mut Connection, query: Query) -> Result<(), TransportError> {
    let mut next = dispatcher.clone();
    let applied = SessionOptions::from_dispatcher(dispatcher)
        .with_parameters(&query.parameters)
        .and_then(|options| options.apply(&mut next));

    match applied {
        Ok(()) => {
            dispatcher.send(&Query::new(query.id, QueryType::Success))?;
            *dispatcher = next;
        }
        Err(e) => dispatcher.send(&Query::error(query.id, e.to_string()))?,
    }
    Ok(())
}
