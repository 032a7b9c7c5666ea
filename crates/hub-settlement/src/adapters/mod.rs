//! # Adapters
//!
//! Concrete implementations of the outbound ports.

pub mod channel_directory;
pub mod dispute_window;
pub mod event_sinks;
pub mod memory_store;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod transfer_decoder;
pub mod trusted_roots;

pub use channel_directory::StaticChannelDirectory;
pub use dispute_window::FixedDisputePeriod;
pub use event_sinks::{RecordingEventSink, TracingEventSink};
pub use memory_store::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
pub use transfer_decoder::JsonTransferDecoder;
pub use trusted_roots::TrustedRootVerifier;
