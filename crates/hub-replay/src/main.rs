//! # hub-replay
//!
//! Replays a JSON-lines settlement script against an in-memory hub and
//! prints each step's result followed by the final state digest.
//!
//! ```text
//! hub-replay demos/settlement.jsonl
//! cat script.jsonl | hub-replay -
//! ```
//!
//! The dispute period and validation bounds come from `HUB_*` environment
//! variables (see `SettlementConfig::from_env`); logging from `HUB_LOG_LEVEL`.

mod runner;
mod script;

use anyhow::{Context, Result};
use hub_settlement::ports::SettlementApi;
use hub_settlement::SettlementConfig;
use hub_telemetry::{init_tracing, TelemetryConfig};
use std::io::Read;
use tracing::info;

use crate::runner::Replay;
use crate::script::parse_script;

fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let path = std::env::args()
        .nth(1)
        .context("usage: hub-replay <script.jsonl | ->")?;
    let text = read_script(&path)?;
    let steps = parse_script(&text)?;

    let config = SettlementConfig::from_env();
    info!(
        script = %path,
        steps = steps.len(),
        dispute_period_blocks = config.dispute_period_blocks,
        "replaying settlement script"
    );

    let mut replay = Replay::new(config).context("invalid settlement configuration")?;
    for (line_no, step) in steps {
        let output = replay.run_step(line_no, step)?;
        println!("[{:>4}] {}", line_no, output);
    }

    println!("digest {}", replay.service().state_digest()?);
    Ok(())
}

fn read_script(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read script from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
}
