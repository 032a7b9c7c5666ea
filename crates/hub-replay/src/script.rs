//! Script format.
//!
//! One JSON object per line, tagged by `op`. Blank lines and lines starting
//! with `#` are skipped. Any step may carry `"expect_error": "<KIND>"` to
//! assert that it fails with that error class.
//!
//! ```text
//! {"op":"channel","channel":"channel-0","connection":"connection-0","client":"07-tendermint-0"}
//! {"op":"bind","rollapp":"rollapp-a","channel":"channel-0"}
//! {"op":"submit","rollapp":"rollapp-a","index":1,"packets":[...]}
//! {"op":"advance","blocks":3}
//! {"op":"end_block"}
//! ```

use anyhow::{Context, Result};
use hub_settlement::{ErrorKind, Height, PacketDirection, PacketStatus, StateIndex, TransferPacketData};
use serde::Deserialize;

/// A packet as written in a script; the transfer is encoded on submit.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ScriptPacket {
    pub channel: String,
    pub sequence: u64,
    pub direction: PacketDirection,
    pub transfer: TransferPacketData,
}

/// One scripted operation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Register channel -> connection -> client.
    Channel {
        channel: String,
        connection: String,
        client: String,
    },
    /// Bind a rollapp, either to a named client or to the client behind a
    /// registered channel.
    Bind {
        rollapp: String,
        #[serde(default)]
        client: Option<String>,
        #[serde(default)]
        channel: Option<String>,
    },
    /// Record the root a client trusts for one commitment (hex).
    Trust {
        client: String,
        rollapp: String,
        index: StateIndex,
        root: String,
    },
    Submit {
        rollapp: String,
        index: StateIndex,
        #[serde(default)]
        packets: Vec<ScriptPacket>,
    },
    /// Record one more packet against a queued commitment.
    Packet {
        rollapp: String,
        index: StateIndex,
        packet: ScriptPacket,
    },
    /// Move the clock to `to`, or forward by `blocks` (default 1).
    Advance {
        #[serde(default)]
        to: Option<Height>,
        #[serde(default)]
        blocks: Option<u64>,
    },
    EndBlock,
    Finalize {
        height: Height,
    },
    /// Fraud evidence with a hex proof.
    Fraud {
        rollapp: String,
        index: StateIndex,
        #[serde(default)]
        client: Option<String>,
        proof: String,
    },
    Revert {
        rollapp: String,
        index: StateIndex,
    },
    /// List packets by status or by address, or count each status.
    List {
        #[serde(default)]
        status: Option<PacketStatus>,
        #[serde(default)]
        address: Option<String>,
    },
    Digest,
}

/// A scripted operation and its expected failure class, if any.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Op,
    #[serde(default)]
    pub expect_error: Option<ErrorKind>,
}

/// Parse a script into `(line number, step)` pairs.
pub fn parse_script(text: &str) -> Result<Vec<(usize, Step)>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            let step = serde_json::from_str(line)
                .with_context(|| format!("line {}: malformed step", line_no))?;
            Ok((line_no, step))
        })
        .collect()
}
