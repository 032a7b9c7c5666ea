//! Lazy, restartable packet listings.

use super::packet_lifecycle::load_packet;
use crate::domain::{PacketKey, RollappPacket, SettlementError, SettlementResult};
use crate::ports::StateReader;
use parking_lot::RwLock;
use std::sync::Arc;

/// Something a cursor can briefly read the store through.
///
/// Shared stores are locked only for the duration of one `read_with` call,
/// so an open cursor never blocks a writer.
pub trait ReadSource {
    type Reader: StateReader + ?Sized;

    /// Run `f` against the current committed state.
    fn read_with<T>(&self, f: impl FnOnce(&Self::Reader) -> T) -> T;
}

impl<R: StateReader + ?Sized> ReadSource for &R {
    type Reader = R;

    fn read_with<T>(&self, f: impl FnOnce(&Self::Reader) -> T) -> T {
        f(*self)
    }
}

impl<S: StateReader> ReadSource for Arc<RwLock<S>> {
    type Reader = S;

    fn read_with<T>(&self, f: impl FnOnce(&Self::Reader) -> T) -> T {
        f(&*self.read())
    }
}

/// Iterator over packets selected by an index scan.
///
/// The index is scanned once, when the cursor is created; each packet is
/// loaded as the cursor reaches it. A packet resolved after the scan is
/// returned with its newer status.
pub struct PacketCursor<P: ReadSource> {
    source: P,
    keys: Vec<PacketKey>,
    position: usize,
}

impl<P: ReadSource> PacketCursor<P> {
    pub(crate) fn new(source: P, keys: Vec<PacketKey>) -> Self {
        Self {
            source,
            keys,
            position: 0,
        }
    }

    /// Restart from the first packet.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Total number of packets selected.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<P: ReadSource> Iterator for PacketCursor<P> {
    type Item = SettlementResult<RollappPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = *self.keys.get(self.position)?;
        self.position += 1;
        let loaded = self.source.read_with(|reader| load_packet(reader, &key));
        Some(match loaded {
            Ok(Some(packet)) => Ok(packet),
            Ok(None) => Err(SettlementError::Serialization(format!(
                "index entry without packet {}",
                key
            ))),
            Err(e) => Err(e),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.keys.len() - self.position;
        (remaining, Some(remaining))
    }
}
