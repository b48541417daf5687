//! Tron account/contract addresses.
//!
//! A Tron address is 21 bytes: the `0x41` network prefix followed by the same
//! 20 bytes an EVM address would carry. Users see the base58check form
//! (`T...`), the HTTP API uses the hex form (`41...`) and the contract ABI
//! encodes only the trailing 20 bytes.

use anyhow::{anyhow, Result};
use ethers::types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_PREFIX: u8 = 0x41;
pub const ADDRESS_BYTES_LEN: usize = 21;
pub const ADDRESS_HEX_LEN: usize = 42;
pub const ADDRESS_BASE58_LEN: usize = 34;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TronAddress {
    bytes: [u8; ADDRESS_BYTES_LEN],
}

impl TronAddress {
    pub fn from_bytes(bytes: [u8; ADDRESS_BYTES_LEN]) -> Result<Self> {
        if bytes[0] != ADDRESS_PREFIX {
            return Err(anyhow!("Tron address must start with 0x41"));
        }
        Ok(Self { bytes })
    }

    fn from_vec(data: Vec<u8>) -> Result<Self> {
        if data.len() != ADDRESS_BYTES_LEN || data[0] != ADDRESS_PREFIX {
            return Err(anyhow!(
                "Invalid address: expected {} bytes with prefix 0x{:x}",
                ADDRESS_BYTES_LEN,
                ADDRESS_PREFIX
            ));
        }
        let mut bytes = [0u8; ADDRESS_BYTES_LEN];
        bytes.copy_from_slice(&data);
        Ok(Self { bytes })
    }

    /// Parse the base58check form (`T...`), verifying the checksum.
    pub fn from_base58(s: &str) -> Result<Self> {
        let data = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| anyhow!("Invalid base58check address '{}': {}", s, e))?;
        Self::from_vec(data)
    }

    /// Parse the hex form, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let data = hex::decode(s).map_err(|e| anyhow!("Invalid hex address '{}': {}", s, e))?;
        Self::from_vec(data)
    }

    /// Build from the 20-byte ABI representation.
    pub fn from_evm(address: Address) -> Self {
        let mut bytes = [0u8; ADDRESS_BYTES_LEN];
        bytes[0] = ADDRESS_PREFIX;
        bytes[1..].copy_from_slice(address.as_bytes());
        Self { bytes }
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).with_check().into_string()
    }

    /// Lowercase hex with the `41` prefix and no `0x`, as the HTTP API expects.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The 20 bytes used in ABI-encoded parameters and by the JSON-RPC endpoint.
    pub fn to_evm(&self) -> Address {
        Address::from_slice(&self.bytes[1..])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TronAddress({} / {})", self.to_base58(), self.to_hex())
    }
}

impl FromStr for TronAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() == ADDRESS_BASE58_LEN && s.starts_with('T') {
            return Self::from_base58(s);
        }
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        if hex_part.len() == ADDRESS_HEX_LEN && hex_part.starts_with("41") {
            return Self::from_hex(hex_part);
        }
        Err(anyhow!(
            "Invalid Tron address '{}': expected base58 (34 chars starting with 'T') or hex (42 chars starting with '41')",
            s
        ))
    }
}

impl Serialize for TronAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for TronAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TronAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}
