//! Decimal amount parsing and recipient batch aggregation.
//!
//! Amounts are entered as decimal strings ("10", "0.5") and sent on-chain as
//! integers scaled by `10^decimals`. Totals use `BigUint` so that summing many
//! large entries can never wrap.

use crate::address::TronAddress;
use anyhow::{anyhow, Context, Result};
use ethers::types::U256;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One editable row of the recipient list. Validated only when a batch is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    pub address: String,
    pub amount: String,
}

impl RecipientEntry {
    pub fn new(address: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            amount: amount.into(),
        }
    }

    fn is_filled(&self) -> bool {
        !self.address.trim().is_empty() && !self.amount.trim().is_empty()
    }
}

/// Recipients and amounts ready for submission. The two vectors are index-aligned.
///
/// Recipients are kept as the trimmed text of each row; they are only checked
/// as Tron addresses when the batch is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub recipients: Vec<String>,
    pub amounts: Vec<U256>,
    pub total: BigUint,
    /// Filled-in rows that were dropped because their amount did not parse.
    pub skipped: usize,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Recipients that are not valid Tron addresses, in row order.
    pub fn invalid_recipients(&self) -> Vec<&str> {
        self.recipients
            .iter()
            .filter(|r| r.parse::<TronAddress>().is_err())
            .map(String::as_str)
            .collect()
    }

    /// Decode every recipient; fails on the first one that is not a Tron address.
    pub fn resolve_recipients(&self) -> Result<Vec<TronAddress>> {
        self.recipients
            .iter()
            .map(|r| {
                r.parse::<TronAddress>()
                    .with_context(|| format!("Invalid recipient address '{}'", r))
            })
            .collect()
    }
}

/// Parse a decimal string into integer minor units.
///
/// Accepts `digits`, `digits.digits`, `.digits` and `digits.`; rejects signs,
/// exponents and anything else. Fraction digits beyond `decimals` are rounded
/// half-up on the first dropped digit.
pub fn parse_units(input: &str, decimals: u32) -> Result<BigUint> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Amount cannot be empty"));
    }

    let (integer, fraction) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if integer.is_empty() && fraction.is_empty() {
        return Err(anyhow!("Invalid amount '{}'", trimmed));
    }
    if !integer.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(anyhow!("Invalid amount '{}': only digits and one '.' are allowed", trimmed));
    }

    let decimals = decimals as usize;
    let (kept, round_up) = if fraction.len() > decimals {
        (&fraction[..decimals], fraction.as_bytes()[decimals] >= b'5')
    } else {
        (fraction, false)
    };

    let mut digits = String::with_capacity(integer.len() + decimals);
    digits.push_str(integer);
    digits.push_str(kept);
    for _ in kept.len()..decimals {
        digits.push('0');
    }
    if digits.is_empty() {
        digits.push('0');
    }

    let mut value = BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| anyhow!("Invalid amount '{}'", trimmed))?;
    if round_up {
        value += 1u32;
    }
    Ok(value)
}

/// Render integer minor units as a decimal string without trailing zeros.
pub fn format_units(value: &BigUint, decimals: u32) -> String {
    let scale = BigUint::from(10u32).pow(decimals);
    let integer = value / &scale;
    let fraction = value % &scale;
    if fraction.is_zero() {
        return integer.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", integer, fraction.trim_end_matches('0'))
}

pub fn format_u256(value: U256, decimals: u32) -> String {
    format_units(&u256_to_biguint(value), decimals)
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    BigUint::from_bytes_be(&buf)
}

/// `None` when the value does not fit in 256 bits.
pub fn biguint_to_u256(value: &BigUint) -> Option<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return None;
    }
    Some(U256::from_big_endian(&bytes))
}

/// Build a batch from the recipient rows.
///
/// Rows with an empty address or amount are ignored. Filled rows whose amount
/// does not parse are counted in `skipped` and left out; they never abort the
/// rest of the batch. Addresses are taken as typed.
pub fn parse_batch(entries: &[RecipientEntry], decimals: u32) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (row, entry) in entries.iter().enumerate() {
        if !entry.is_filled() {
            continue;
        }
        let parsed = parse_entry(entry, decimals);
        match parsed {
            Ok((address, amount, units)) => {
                batch.recipients.push(address);
                batch.amounts.push(amount);
                batch.total += units;
            }
            Err(e) => {
                debug!("Skipping recipient row {}: {}", row + 1, e);
                batch.skipped += 1;
            }
        }
    }

    batch
}

fn parse_entry(entry: &RecipientEntry, decimals: u32) -> Result<(String, U256, BigUint)> {
    let units = parse_units(&entry.amount, decimals)?;
    let amount = biguint_to_u256(&units)
        .ok_or_else(|| anyhow!("Amount '{}' does not fit in uint256", entry.amount.trim()))?;
    Ok((entry.address.trim().to_string(), amount, units))
}

/// Read `address,amount` rows from CSV text. A first row whose amount column is
/// not a number is treated as a header.
pub fn parse_recipient_csv(contents: &str) -> Result<Vec<RecipientEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut entries = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| anyhow!("CSV line {}: {}", line + 1, e))?;
        let address = record.get(0).unwrap_or("").to_string();
        let amount = record.get(1).unwrap_or("").to_string();

        if line == 0 && !amount.is_empty() && parse_units(&amount, 0).is_err() {
            continue;
        }
        if address.is_empty() && amount.is_empty() {
            continue;
        }
        entries.push(RecipientEntry { address, amount });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A1: &str = "TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL";
    const A2: &str = "TLCuviLXZtgF7JgXxwrUzrHpt4mmbMRTfW";

    fn big(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 10).unwrap()
    }

    // ==================== parse_units tests ====================

    #[test]
    fn test_parse_units_integer() {
        assert_eq!(parse_units("10", 6).unwrap(), big("10000000"));
    }

    #[test]
    fn test_parse_units_fractional() {
        assert_eq!(parse_units("0.5", 6).unwrap(), big("500000"));
        assert_eq!(parse_units(".5", 6).unwrap(), big("500000"));
        assert_eq!(parse_units("5.", 6).unwrap(), big("5000000"));
    }

    #[test]
    fn test_parse_units_whitespace() {
        assert_eq!(parse_units("  1.5  ", 6).unwrap(), big("1500000"));
    }

    #[test]
    fn test_parse_units_rounds_extra_digits() {
        assert_eq!(parse_units("0.1234564", 6).unwrap(), big("123456"));
        assert_eq!(parse_units("0.1234565", 6).unwrap(), big("123457"));
        assert_eq!(parse_units("0.9999999", 6).unwrap(), big("1000000"));
    }

    #[test]
    fn test_parse_units_rejects_malformed() {
        for bad in ["abc", "", "   ", "-1", "-1e400", "1e3", "1.2.3", ".", "+5", "1,5", "0x10"] {
            assert!(parse_units(bad, 6).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_parse_units_zero_decimals() {
        assert_eq!(parse_units("42", 0).unwrap(), big("42"));
        assert_eq!(parse_units("42.5", 0).unwrap(), big("43"));
    }

    // ==================== format_units tests ====================

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(&big("15000000"), 6), "15");
        assert_eq!(format_units(&big("500000"), 6), "0.5");
        assert_eq!(format_units(&big("1"), 6), "0.000001");
        assert_eq!(format_units(&BigUint::zero(), 6), "0");
    }

    #[test]
    fn test_u256_conversions() {
        let v = U256::from(123_456_789u64);
        assert_eq!(u256_to_biguint(v), big("123456789"));
        assert_eq!(biguint_to_u256(&big("123456789")), Some(v));
        assert_eq!(biguint_to_u256(&u256_to_biguint(U256::MAX)), Some(U256::MAX));
        let too_big = u256_to_biguint(U256::MAX) + 1u32;
        assert_eq!(biguint_to_u256(&too_big), None);
    }

    // ==================== parse_batch tests ====================

    #[test]
    fn test_parse_batch_scenario() {
        let entries = vec![RecipientEntry::new("Txxx1", "10"), RecipientEntry::new("Txxx2", "5")];
        let batch = parse_batch(&entries, 6);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.recipients, vec!["Txxx1", "Txxx2"]);
        assert_eq!(batch.amounts, vec![U256::from(10_000_000u64), U256::from(5_000_000u64)]);
        assert_eq!(batch.total, big("15000000"));
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_parse_batch_resolves_valid_addresses() {
        let entries = vec![RecipientEntry::new(format!("  {}  ", A1), "10"), RecipientEntry::new(A2, "5")];
        let batch = parse_batch(&entries, 6);
        assert!(batch.invalid_recipients().is_empty());
        let resolved = batch.resolve_recipients().unwrap();
        assert_eq!(resolved[0].to_base58(), A1);
        assert_eq!(resolved[1].to_base58(), A2);
    }

    #[test]
    fn test_parse_batch_keeps_unchecked_addresses() {
        let entries = vec![RecipientEntry::new(A1, "1"), RecipientEntry::new("Txxx2", "2")];
        let batch = parse_batch(&entries, 6);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.invalid_recipients(), vec!["Txxx2"]);
        let err = batch.resolve_recipients().unwrap_err();
        assert!(format!("{:#}", err).contains("Txxx2"));
    }

    #[test]
    fn test_parse_batch_skips_malformed_without_aborting() {
        let entries = vec![
            RecipientEntry::new(A1, "abc"),
            RecipientEntry::new(A2, "-1e400"),
            RecipientEntry::new(A1, "2"),
            RecipientEntry::new("not-an-address", "3"),
            RecipientEntry::new(A2, "0.25"),
        ];
        let batch = parse_batch(&entries, 6);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.recipients.len(), batch.amounts.len());
        assert_eq!(batch.recipients[1], "not-an-address");
        assert_eq!(
            batch.amounts,
            vec![U256::from(2_000_000u64), U256::from(3_000_000u64), U256::from(250_000u64)]
        );
        assert_eq!(batch.total, big("5250000"));
        assert_eq!(batch.skipped, 2);
    }

    #[test]
    fn test_parse_batch_ignores_blank_rows() {
        let entries = vec![
            RecipientEntry::default(),
            RecipientEntry::new("  ", "1"),
            RecipientEntry::new(A1, "   "),
            RecipientEntry::new(A1, "1"),
        ];
        let batch = parse_batch(&entries, 6);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_parse_batch_empty() {
        let batch = parse_batch(&[RecipientEntry::default()], 6);
        assert!(batch.is_empty());
        assert!(batch.total.is_zero());
    }

    #[test]
    fn test_parse_batch_total_exceeds_u256_without_wrapping() {
        // Each entry is close to the uint256 limit; the sum is not.
        let max = u256_to_biguint(U256::MAX);
        let per_entry = format_units(&(&max / 2u32), 0);
        let entries: Vec<RecipientEntry> = (0..5).map(|_| RecipientEntry::new(A1, per_entry.clone())).collect();
        let batch = parse_batch(&entries, 0);
        assert_eq!(batch.len(), 5);
        let expected: BigUint = batch.amounts.iter().map(|a| u256_to_biguint(*a)).sum();
        assert_eq!(batch.total, expected);
        assert!(batch.total > max);
    }

    #[test]
    fn test_parse_batch_total_many_large_entries() {
        let entries: Vec<RecipientEntry> = (0..250)
            .map(|_| RecipientEntry::new(A2, "123456789012345678901.123456"))
            .collect();
        let batch = parse_batch(&entries, 6);
        assert_eq!(batch.len(), 250);
        let single = big("123456789012345678901123456");
        assert_eq!(batch.total, single * 250u32);
    }

    #[test]
    fn test_parse_batch_drops_amount_above_uint256() {
        let huge = format!("{}0", u256_to_biguint(U256::MAX));
        let entries = vec![RecipientEntry::new(A1, huge), RecipientEntry::new(A2, "1")];
        let batch = parse_batch(&entries, 0);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 1);
    }

    // ==================== parse_recipient_csv tests ====================

    #[test]
    fn test_parse_recipient_csv_with_header() {
        let csv = format!("address,amount\n{},10\n{}, 0.5\n", A1, A2);
        let entries = parse_recipient_csv(&csv).unwrap();
        assert_eq!(entries, vec![RecipientEntry::new(A1, "10"), RecipientEntry::new(A2, "0.5")]);
    }

    #[test]
    fn test_parse_recipient_csv_without_header() {
        let csv = format!("{},1\n\n{},2", A1, A2);
        let entries = parse_recipient_csv(&csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].amount, "2");
    }
}
