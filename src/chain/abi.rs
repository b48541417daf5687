//! Contract calls used against MockUSDT (TRC20) and GasSaver.
//!
//! Tron contracts use the Solidity ABI; addresses are encoded as their
//! trailing 20 bytes.

use crate::address::TronAddress;
use anyhow::{anyhow, Result};
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};

/// A contract function invocation: target, canonical signature and arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract: TronAddress,
    pub signature: &'static str,
    pub params: Vec<Token>,
}

impl ContractCall {
    pub fn new(contract: TronAddress, signature: &'static str, params: Vec<Token>) -> Self {
        Self {
            contract,
            signature,
            params,
        }
    }

    /// Function name without the parameter list.
    pub fn function_name(&self) -> &'static str {
        self.signature.split('(').next().unwrap_or(self.signature)
    }

    pub fn selector(&self) -> [u8; 4] {
        ethers::utils::id(self.signature)
    }

    /// ABI-encoded arguments without the selector (the HTTP API's `parameter`).
    pub fn encoded_params(&self) -> Vec<u8> {
        abi::encode(&self.params)
    }

    /// Selector followed by the encoded arguments (JSON-RPC `eth_call` data).
    pub fn calldata(&self) -> Vec<u8> {
        let mut data = self.selector().to_vec();
        data.extend(self.encoded_params());
        data
    }
}

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const MINT: &str = "mint(address,uint256)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const BULK_TRANSFER: &str = "bulkTransfer(address[],address[],uint256[])";

fn address_token(address: &TronAddress) -> Token {
    Token::Address(address.to_evm())
}

pub fn balance_of(token: TronAddress, owner: TronAddress) -> ContractCall {
    ContractCall::new(token, BALANCE_OF, vec![address_token(&owner)])
}

pub fn allowance(token: TronAddress, owner: TronAddress, spender: TronAddress) -> ContractCall {
    ContractCall::new(token, ALLOWANCE, vec![address_token(&owner), address_token(&spender)])
}

pub fn mint(token: TronAddress, to: TronAddress, amount: U256) -> ContractCall {
    ContractCall::new(token, MINT, vec![address_token(&to), Token::Uint(amount)])
}

pub fn approve(token: TronAddress, spender: TronAddress, amount: U256) -> ContractCall {
    ContractCall::new(token, APPROVE, vec![address_token(&spender), Token::Uint(amount)])
}

/// `tokens[i]` is the asset sent to `recipients[i]`; the zero address means TRX.
pub fn bulk_transfer(
    gas_saver: TronAddress,
    tokens: &[Address],
    recipients: &[TronAddress],
    amounts: &[U256],
) -> ContractCall {
    ContractCall::new(
        gas_saver,
        BULK_TRANSFER,
        vec![
            Token::Array(tokens.iter().map(|t| Token::Address(*t)).collect()),
            Token::Array(recipients.iter().map(address_token).collect()),
            Token::Array(amounts.iter().map(|a| Token::Uint(*a)).collect()),
        ],
    )
}

/// Decode a single `uint256` return value.
pub fn decode_uint(output: &[u8]) -> Result<U256> {
    let tokens = abi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| anyhow!("Failed to decode uint256 result: {}", e))?;
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| anyhow!("Empty uint256 result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> TronAddress {
        TronAddress::from_str(s).unwrap()
    }

    #[test]
    fn test_selectors() {
        let token = addr(crate::config::MOCK_USDT_ADDRESS);
        // keccak256("balanceOf(address)")[..4]
        assert_eq!(balance_of(token, token).selector(), [0x70, 0xa0, 0x82, 0x31]);
        // keccak256("approve(address,uint256)")[..4]
        assert_eq!(approve(token, token, U256::one()).selector(), [0x09, 0x5e, 0xa7, 0xb3]);
        // keccak256("allowance(address,address)")[..4]
        assert_eq!(allowance(token, token, token).selector(), [0xdd, 0x62, 0xed, 0x3e]);
    }

    #[test]
    fn test_calldata_layout() {
        let owner = addr("TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL");
        let call = balance_of(addr(crate::config::MOCK_USDT_ADDRESS), owner);
        let data = call.calldata();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..], owner.to_evm().as_bytes());
        assert_eq!(call.encoded_params(), data[4..].to_vec());
    }

    #[test]
    fn test_function_name() {
        let token = addr(crate::config::MOCK_USDT_ADDRESS);
        assert_eq!(mint(token, token, U256::one()).function_name(), "mint");
    }

    #[test]
    fn test_bulk_transfer_arrays_aligned() {
        let gas_saver = addr(crate::config::GAS_SAVER_ADDRESS);
        let r = addr("TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL");
        let call = bulk_transfer(
            gas_saver,
            &[Address::zero(), Address::zero()],
            &[r, r],
            &[U256::from(1u64), U256::from(2u64)],
        );
        assert_eq!(call.params.len(), 3);
        for param in &call.params {
            match param {
                Token::Array(items) => assert_eq!(items.len(), 2),
                other => panic!("expected array, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_uint() {
        let encoded = abi::encode(&[Token::Uint(U256::from(15_000_000u64))]);
        assert_eq!(decode_uint(&encoded).unwrap(), U256::from(15_000_000u64));
        assert!(decode_uint(&[]).is_err());
    }
}
