// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet address normalisation.
//!
//! Hex addresses are not case-sensitive identities: `0xABC…` and `0xabc…`
//! are the same wallet. Every comparison in the gateway goes through
//! [`addresses_match`] so that a missed normalisation cannot turn into an
//! authorization bypass.

use std::str::FromStr;

use alloy::primitives::Address;

/// Lower-case, `0x`-prefixed hex form of a 20-byte address.
pub fn format_address(address: &Address) -> String {
    format!("0x{}", alloy::hex::encode(address.as_slice()))
}

/// Parse an address string into its canonical lower-case form.
///
/// Accepts `0x` followed by exactly 40 hex digits in any case (EIP-55
/// checksums are not enforced). Returns `None` for anything else.
pub fn normalize_address(raw: &str) -> Option<String> {
    parse_address(raw).map(|address| format_address(&address))
}

/// Parse an address string into an [`Address`].
pub fn parse_address(raw: &str) -> Option<Address> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x")?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Address::from_str(hex).ok()
}

/// Case-insensitive address equality.
///
/// Returns `false` when either side is not a well-formed address, so empty
/// or garbage input never matches anything (not even itself).
pub fn addresses_match(a: &str, b: &str) -> bool {
    match (normalize_address(a), normalize_address(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// The zero address is the contract's sentinel for "no such project".
pub fn is_zero_address(address: &Address) -> bool {
    *address == Address::ZERO
}
