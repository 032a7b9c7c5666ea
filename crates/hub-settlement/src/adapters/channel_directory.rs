//! Static channel -> connection -> client directory.
//!
//! A channel runs over one connection, and a connection is served by one
//! client. Resolving a rollapp's client from its transfer channel follows
//! both hops.

use crate::domain::{ClientId, SettlementError, SettlementResult};
use crate::ports::ChannelClientLookup;
use std::collections::HashMap;

/// In-memory channel and connection tables.
#[derive(Clone, Debug, Default)]
pub struct StaticChannelDirectory {
    channels: HashMap<String, String>,
    connections: HashMap<String, ClientId>,
}

impl StaticChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connection a channel runs over.
    pub fn add_channel(&mut self, channel_id: impl Into<String>, connection_id: impl Into<String>) {
        self.channels.insert(channel_id.into(), connection_id.into());
    }

    /// Register the client behind a connection.
    pub fn add_connection(&mut self, connection_id: impl Into<String>, client_id: ClientId) {
        self.connections.insert(connection_id.into(), client_id);
    }
}

impl ChannelClientLookup for StaticChannelDirectory {
    fn client_for_channel(&self, channel_id: &str) -> SettlementResult<ClientId> {
        let connection = self
            .channels
            .get(channel_id)
            .ok_or_else(|| SettlementError::NotFound(format!("channel {}", channel_id)))?;
        self.connections
            .get(connection)
            .cloned()
            .ok_or_else(|| SettlementError::NotFound(format!("connection {}", connection)))
    }
}
