//! Universal cross-chain address encoding.
//!
//! A `UniversalAddress` is the 32-byte form a hashlock/session carries
//! chain-agnostically:
//!
//! ```text
//! | Chain Type (4 bytes) | Raw Address (20 bytes) | Reserved (8 bytes) |
//! ```
//!
//! Only the two chain types this orchestrator coordinates are active; the
//! codes otherwise match the EVM and Cosmos contract-side codecs so a
//! `UniversalAddress` round-trips identically on both chains.

use bech32::{self, FromBase32, ToBase32, Variant};
use eyre::{eyre, Result};
use std::fmt;

pub const CHAIN_TYPE_EVM: u32 = 1;
pub const CHAIN_TYPE_COSMOS: u32 = 2;

/// A chain-agnostic 32-byte address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniversalAddress {
    pub chain_type: u32,
    pub raw_address: [u8; 20],
    pub reserved: [u8; 8],
}

impl UniversalAddress {
    pub fn new(chain_type: u32, raw_address: [u8; 20]) -> Self {
        Self {
            chain_type,
            raw_address,
            reserved: [0u8; 8],
        }
    }

    pub fn from_evm(addr: &str) -> Result<Self> {
        Ok(Self::new(CHAIN_TYPE_EVM, parse_evm_address(addr)?))
    }

    pub fn from_cosmos(addr: &str) -> Result<Self> {
        let (raw, _hrp) = decode_bech32_address(addr)?;
        Ok(Self::new(CHAIN_TYPE_COSMOS, raw))
    }

    pub fn to_bytes32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0..4].copy_from_slice(&self.chain_type.to_be_bytes());
        out[4..24].copy_from_slice(&self.raw_address);
        out[24..32].copy_from_slice(&self.reserved);
        out
    }

    pub fn from_bytes32(bytes: &[u8; 32]) -> Result<Self> {
        let chain_type = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let mut raw_address = [0u8; 20];
        raw_address.copy_from_slice(&bytes[4..24]);
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[24..32]);
        Ok(Self {
            chain_type,
            raw_address,
            reserved,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(eyre!(
                "Invalid length: expected 32 bytes, got {}",
                bytes.len()
            ));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Self::from_bytes32(&arr)
    }

    pub fn to_evm_string(&self) -> Result<String> {
        if self.chain_type != CHAIN_TYPE_EVM {
            return Err(eyre!(
                "Expected EVM chain type (1), got {}",
                self.chain_type
            ));
        }
        Ok(format!("0x{}", hex::encode(self.raw_address)))
    }

    pub fn to_cosmos_string(&self, hrp: &str) -> Result<String> {
        if self.chain_type != CHAIN_TYPE_COSMOS {
            return Err(eyre!(
                "Expected Cosmos chain type (2), got {}",
                self.chain_type
            ));
        }
        encode_bech32_address(&self.raw_address, hrp)
    }

    pub fn is_evm(&self) -> bool {
        self.chain_type == CHAIN_TYPE_EVM
    }

    pub fn is_cosmos(&self) -> bool {
        self.chain_type == CHAIN_TYPE_COSMOS
    }
}

impl fmt::Display for UniversalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain_type {
            CHAIN_TYPE_EVM => write!(f, "EVM:{}", hex::encode(self.raw_address)),
            CHAIN_TYPE_COSMOS => write!(f, "COSMOS:{}", hex::encode(self.raw_address)),
            _ => write!(
                f,
                "UNKNOWN({}){}",
                self.chain_type,
                hex::encode(self.raw_address)
            ),
        }
    }
}

/// Parse a 0x-prefixed hex EVM address to 20 bytes.
pub fn parse_evm_address(addr: &str) -> Result<[u8; 20]> {
    let hex_str = addr.strip_prefix("0x").unwrap_or(addr);

    if hex_str.len() != 40 {
        return Err(eyre!(
            "Invalid EVM address length: expected 40 hex chars, got {}",
            hex_str.len()
        ));
    }

    let bytes = hex::decode(hex_str)?;
    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Encode 20 bytes to an EVM hex string with 0x prefix.
pub fn encode_evm_address(bytes: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a bech32 address to raw 20 bytes. Returns `(raw_bytes, hrp)`.
pub fn decode_bech32_address(addr: &str) -> Result<([u8; 20], String)> {
    let (hrp, data, _variant) =
        bech32::decode(addr).map_err(|e| eyre!("Invalid bech32 address: {}", e))?;

    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| eyre!("Invalid base32 data: {}", e))?;

    if bytes.len() != 20 {
        return Err(eyre!(
            "Invalid address length: expected 20 bytes, got {}",
            bytes.len()
        ));
    }

    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok((result, hrp))
}

/// Encode raw 20 bytes to a bech32 address with the given human-readable prefix.
pub fn encode_bech32_address(bytes: &[u8; 20], hrp: &str) -> Result<String> {
    let encoded = bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| eyre!("Failed to encode bech32: {}", e))?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_encode_decode() {
        let evm_addr = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        let universal = UniversalAddress::from_evm(evm_addr).unwrap();
        assert_eq!(universal.chain_type, CHAIN_TYPE_EVM);
        assert!(universal.is_evm());
    }

    #[test]
    fn test_bytes32_roundtrip() {
        let addr = UniversalAddress::new(CHAIN_TYPE_EVM, [9u8; 20]);
        let bytes = addr.to_bytes32();
        let recovered = UniversalAddress::from_bytes32(&bytes).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn test_cosmos_bech32_roundtrip() {
        let raw = [3u8; 20];
        let encoded = encode_bech32_address(&raw, "terra").unwrap();
        let (decoded, hrp) = decode_bech32_address(&encoded).unwrap();
        assert_eq!(raw, decoded);
        assert_eq!(hrp, "terra");
    }
}
