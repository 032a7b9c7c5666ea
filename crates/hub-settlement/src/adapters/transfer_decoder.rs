//! ICS-20 JSON payload decoder.

use crate::domain::{SettlementError, SettlementResult, TransferPacketData};
use crate::ports::TransferDataDecoder;

/// Decodes the ICS-20 `FungibleTokenPacketData` JSON encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTransferDecoder;

impl TransferDataDecoder for JsonTransferDecoder {
    fn decode(&self, payload: &[u8]) -> SettlementResult<TransferPacketData> {
        let data: TransferPacketData = serde_json::from_slice(payload)
            .map_err(|e| SettlementError::InvalidArgument(format!("transfer payload: {}", e)))?;
        if data.sender.is_empty() || data.receiver.is_empty() {
            return Err(SettlementError::InvalidArgument(
                "transfer payload missing sender or receiver".to_string(),
            ));
        }
        Ok(data)
    }
}
