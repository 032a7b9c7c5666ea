//! # hub-settlement
//!
//! Optimistic settlement core for rollapps anchored on the hub.
//!
//! ## Overview
//!
//! Packets arriving from a rollapp are held PENDING until the state update
//! they were proven against is either finalized (its dispute window elapsed)
//! or reverted (fraud was proven). Three components own the state:
//!
//! - **FinalizationQueue**: state commitments by creation height, grouped
//!   per rollapp
//! - **PacketLifecycleStore**: delayed packets, indexed by status and by
//!   counterparty address
//! - **CanonicalClientBinding**: the one verification client per rollapp
//!
//! ## Lifecycle
//!
//! ```text
//! submit ──→ [queued @H] ──window elapsed──→ [finalized] ──→ packets FINALIZED
//!                 │
//!                 └──fraud proven (canonical client)──→ [reverted] ──→ packets REVERTED
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use hub_settlement::prelude::*;
//!
//! let service = SettlementService::new(
//!     InMemoryKVStore::new(),
//!     FixedDisputePeriod::new(config.dispute_period_blocks),
//!     verifier,
//!     JsonTransferDecoder,
//!     TracingEventSink,
//!     config,
//! )?;
//!
//! service.submit_state_update(update)?;
//! service.end_block()?;
//! ```

pub mod adapters;
pub mod components;
pub mod config;
pub mod domain;
pub mod events;
pub mod genesis;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod staging;

pub use config::SettlementConfig;
pub use domain::{
    CanonicalBinding, ClientId, ErrorKind, FinalizationQueueEntry, Height, KVStoreError,
    PacketDirection, PacketKey, PacketStatus, RollappId, RollappPacket, SettlementError,
    SettlementOutcome, SettlementResult, StateCommitmentRef, StateIndex, TransferPacketData,
};
pub use events::SettlementEvent;
pub use genesis::GenesisState;
pub use service::{PacketQuery, SettlementService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for driving the service.
pub mod prelude {
    pub use crate::adapters::{
        FixedDisputePeriod, InMemoryKVStore, JsonTransferDecoder, RecordingEventSink,
        StaticChannelDirectory, TracingEventSink, TrustedRootVerifier,
    };
    pub use crate::components::BindOutcome;
    pub use crate::config::SettlementConfig;
    pub use crate::domain::*;
    pub use crate::events::SettlementEvent;
    pub use crate::genesis::GenesisState;
    pub use crate::ports::{
        FraudEvidence, FraudOutcome, IncomingPacket, ProofVerdict, RevertSummary, SettlementApi,
        StateUpdate, SubmitReceipt, SweepSummary,
    };
    pub use crate::service::SettlementService;
}
