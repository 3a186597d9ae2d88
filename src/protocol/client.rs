use std::{
    net::{SocketAddr, TcpStream},
    sync::Arc,
};

use log::{debug, info};

use crate::{
    codec::SingleOwner,
    query::{Query, QueryType},
    session::SessionOptions,
    transfer::{Dispatcher, TransferConfig},
};

use super::transport::{Frame, FrameSink, FrameTransport, TransportError};

/// Blocking request/reply client for a [`QueryServer`](super::QueryServer).
pub struct QueryClient {
    transport: FrameTransport<TcpStream>,
    dispatcher: Dispatcher<FrameSink<TcpStream>, SingleOwner>,
    next_id: i32,
}

impl QueryClient {
    pub fn connect(address: SocketAddr, config: TransferConfig) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)?;
        let sink = Arc::new(FrameSink::new(stream.try_clone()?));
        info!("connected to {address}");

        Ok(Self {
            transport: FrameTransport::new(stream),
            dispatcher: Dispatcher::with_config(sink, config)?,
            next_id: 1,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher<FrameSink<TcpStream>, SingleOwner> {
        &self.dispatcher
    }

    /// Sends `query` under a fresh id and waits for the reply.
    pub fn request(&mut self, mut query: Query) -> Result<Query, TransportError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        query.id = id;

        self.dispatcher.send_owned(query)?;
        let reply = self.read_reply()?;
        if reply.id != id {
            debug!("reply {} does not match request {id}", reply.id);
        }
        Ok(reply)
    }

    pub fn ping(&mut self) -> Result<Query, TransportError> {
        self.request(Query::new(0, QueryType::Ping))
    }

    pub fn statement(&mut self, statement: &str) -> Result<Query, TransportError> {
        self.request(Query::new(0, QueryType::DirectCypher).with_parameter("query", statement))
    }

    /// Negotiates new session options. The local format only changes once the server
    /// acknowledged the switch.
    pub fn configure(&mut self, options: &SessionOptions) -> Result<Query, TransportError> {
        let reply = self.request(Query::configuration(0, options))?;
        if reply.kind == QueryType::Success {
            options.apply(&mut self.dispatcher)?;
        }
        Ok(reply)
    }

    pub fn read_reply(&mut self) -> Result<Query, TransportError> {
        let frame = self.transport.read_frame()?;
        let inbound = frame.inbound().ok_or(TransportError::Closed)?;
        Ok(self.dispatcher.decode(inbound)?)
    }

    pub fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.transport.write_frame(frame)
    }

    /// Asks the server to close the connection and waits for it to confirm.
    pub fn close(mut self) -> Result<(), TransportError> {
        self.transport.write_frame(Frame::Close)?;
        match self.transport.read_frame() {
            Ok(Frame::Close) => Ok(()),
            Ok(frame) => {
                debug!("discarding {frame:?} received while closing");
                Ok(())
            }
            Err(e) if e.is_disconnect() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
