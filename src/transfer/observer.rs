//! Hooks for watching traffic through a dispatcher.
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, PoisonError},
};

use log::trace;

use crate::{
    codec::{Compression, Format},
    query::QueryType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// One encoded or decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    pub direction: Direction,
    pub kind: QueryType,
    /// Codec that produced or accepted the message.
    pub format: Format,
    pub compression: Compression,
    /// Size of the message on the wire.
    pub bytes: usize,
}

pub trait TransferObserver: Send + Sync {
    fn observe(&self, event: &TransferEvent);
}

/// Logs every event at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TransferObserver for LogObserver {
    fn observe(&self, event: &TransferEvent) {
        trace!(
            "{} {} query, {} bytes as {}/{}",
            event.direction, event.kind, event.bytes, event.format, event.compression
        );
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub messages: u64,
    pub bytes: u64,
}

/// Message and byte counters per direction and query type.
#[derive(Debug, Default)]
pub struct TransferStats {
    counters: Mutex<BTreeMap<(Direction, QueryType), Counter>>,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, direction: Direction, kind: QueryType) -> Counter {
        self.lock()
            .get(&(direction, kind))
            .copied()
            .unwrap_or_default()
    }

    pub fn total(&self, direction: Direction) -> Counter {
        self.lock()
            .iter()
            .filter(|((dir, _), _)| *dir == direction)
            .fold(Counter::default(), |acc, (_, counter)| Counter {
                messages: acc.messages + counter.messages,
                bytes: acc.bytes + counter.bytes,
            })
    }

    pub fn snapshot(&self) -> Vec<(Direction, QueryType, Counter)> {
        self.lock()
            .iter()
            .map(|((direction, kind), counter)| (*direction, *kind, *counter))
            .collect()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(Direction, QueryType), Counter>> {
        // counters stay usable even if an observer panicked mid-update
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransferObserver for TransferStats {
    fn observe(&self, event: &TransferEvent) {
        let mut counters = self.lock();
        let counter = counters.entry((event.direction, event.kind)).or_default();
        counter.messages += 1;
        counter.bytes += event.bytes as u64;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn event(direction: Direction, kind: QueryType, bytes: usize) -> TransferEvent {
        TransferEvent {
            direction,
            kind,
            format: Format::Bson,
            compression: Compression::None,
            bytes,
        }
    }

    #[test]
    fn counts_per_direction_and_type() {
        let stats = TransferStats::new();
        stats.observe(&event(Direction::Outbound, QueryType::Ping, 10));
        stats.observe(&event(Direction::Outbound, QueryType::Ping, 12));
        stats.observe(&event(Direction::Inbound, QueryType::Pong, 7));

        assert_eq!(
            stats.get(Direction::Outbound, QueryType::Ping),
            Counter {
                messages: 2,
                bytes: 22
            }
        );
        assert_eq!(stats.get(Direction::Inbound, QueryType::Ping), Counter::default());
        assert_eq!(stats.total(Direction::Inbound).bytes, 7);
        assert_eq!(stats.snapshot().len(), 2);

        stats.reset();
        assert!(stats.snapshot().is_empty());
    }

    #[test]
    fn shared_between_threads() {
        let stats = Arc::new(TransferStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.observe(&event(Direction::Inbound, QueryType::Result, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.get(Direction::Inbound, QueryType::Result).messages, 400);
    }
}
