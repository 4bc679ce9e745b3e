//! Event attribute parsing from Cosmos-style transaction logs.
//!
//! The destination HTLC contract emits `wasm` events with string
//! attributes rather than typed topics; this module turns those into the
//! same [`crate::types::ChainEvent`] the EVM adapter produces, so the
//! coordinator never branches on chain family.

use eyre::{eyre, Result};

use crate::types::{ChainEvent, ChainEventKind, ChainTag};

/// A single `wasm` event's attribute list, as found in `tx_response.logs[].events[]`.
pub struct WasmEventAttrs<'a> {
    pub attrs: &'a [(String, String)],
}

impl<'a> WasmEventAttrs<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decode a `wasm` event into a `ChainEvent`, given the block height and
    /// log index it was observed at.
    pub fn decode(&self, height: u64, log_index: u64) -> Result<Option<ChainEvent>> {
        let action = match self.get("action") {
            Some(a) => a,
            None => return Ok(None),
        };

        if !matches!(action, "lock" | "reveal" | "refund") {
            return Ok(None);
        }

        let hashlock_hex = self
            .get("hashlock")
            .ok_or_else(|| eyre!("wasm event missing hashlock attribute"))?;
        let hashlock = parse_hex32(hashlock_hex)?;

        let kind = match action {
            "lock" => ChainEventKind::EscrowLocked {
                escrow_ref: self.get("escrow_ref").unwrap_or(hashlock_hex).to_string(),
            },
            "reveal" => {
                let preimage_hex = self
                    .get("preimage")
                    .ok_or_else(|| eyre!("reveal event missing preimage attribute"))?;
                ChainEventKind::SecretRevealed {
                    preimage: parse_hex32(preimage_hex)?,
                }
            }
            "refund" => ChainEventKind::Refunded,
            _ => unreachable!(),
        };

        Ok(Some(ChainEvent {
            chain: ChainTag::Destination,
            height,
            log_index,
            hashlock,
            kind,
        }))
    }
}

fn parse_hex32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    if bytes.len() != 32 {
        return Err(eyre!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lock_event() {
        let hashlock_hex = "ab".repeat(32);
        let attrs = vec![
            ("action".to_string(), "lock".to_string()),
            ("hashlock".to_string(), hashlock_hex.clone()),
        ];
        let parsed = WasmEventAttrs { attrs: &attrs };
        let event = parsed.decode(10, 0).unwrap().unwrap();
        assert_eq!(event.chain, ChainTag::Destination);
        assert!(matches!(event.kind, ChainEventKind::EscrowLocked { .. }));
    }

    #[test]
    fn test_decode_unknown_action_is_none() {
        let attrs = vec![("action".to_string(), "transfer".to_string())];
        let parsed = WasmEventAttrs { attrs: &attrs };
        assert!(parsed.decode(10, 0).is_err() || parsed.decode(10, 0).unwrap().is_none());
    }
}
