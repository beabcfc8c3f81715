//! Mathematical utility functions for draft transaction calculations
//!
//! This module provides the size and fee estimation used when a draft is
//! assembled. All spends in this workflow come from P2SH multisig outputs,
//! so the input size model is parameterized on the (M, N) policy rather than
//! assuming single-signature inputs.
//!
//! For amount conversions use `bitcoin::Amount` directly:
//! ```
//! use bitcoin::Amount;
//!
//! let sats = Amount::from_btc(1.5).unwrap().to_sat();
//! let btc = Amount::from_sat(150_000_000).to_btc();
//! ```

use crate::types::DUST_THRESHOLD;
use bitcoin::{Amount, Script};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Fixed transaction overhead: version, locktime and the two count prefixes
const TX_OVERHEAD: usize = 10;

/// Outpoint (36) + script length prefix + sequence (4)
const INPUT_OVERHEAD: usize = 41;

/// Worst-case size of one pushed DER signature including the sighash byte
const SIGNATURE_PUSH_SIZE: usize = 74;

/// Size of one pushed compressed public key inside a redeem script
const PUBKEY_PUSH_SIZE: usize = 34;

/// Determines if an amount is considered "dust" (too small to be
/// economically viable as its own output)
pub fn is_dust_amount(amount_sats: u64) -> bool {
    amount_sats < DUST_THRESHOLD
}

/// Size in bytes of an M-of-N redeem script with compressed keys
///
/// OP_M, N pushed keys, OP_N, OP_CHECKMULTISIG.
pub fn redeem_script_size(total_keys: usize) -> usize {
    3 + total_keys * PUBKEY_PUSH_SIZE
}

/// Estimated size of one fully-signed P2SH multisig input
///
/// The signature script is OP_0, M signature pushes, and the pushed redeem
/// script. Signature sizes vary by a byte or two, so this is a worst-case
/// figure; fees estimated from it err slightly high.
pub fn multisig_input_size(required: usize, total_keys: usize) -> usize {
    let redeem = redeem_script_size(total_keys);
    // OP_0 + signatures + one- or two-byte push prefix for the redeem script
    let script_sig = 1 + required * SIGNATURE_PUSH_SIZE + 2 + redeem;
    INPUT_OVERHEAD + script_sig
}

/// Exact size of an output paying to the given locking script
pub fn output_size(script_pubkey: &Script) -> usize {
    // value (8) + script length prefix (1, all standard scripts are short)
    8 + 1 + script_pubkey.len()
}

/// Estimate the size of a draft spending `input_count` coins from one
/// M-of-N address into outputs with the given locking scripts
pub fn estimate_tx_size(
    input_count: usize,
    required: usize,
    total_keys: usize,
    output_scripts: &[&Script],
) -> usize {
    TX_OVERHEAD
        + input_count * multisig_input_size(required, total_keys)
        + output_scripts.iter().map(|s| output_size(s)).sum::<usize>()
}

/// Calculates the fee for a transaction based on size and fee rate
///
/// # Arguments
/// * `tx_size` - The size of the transaction in bytes
/// * `fee_rate` - The fee rate in satoshis per vbyte
///
/// # Returns
/// The calculated fee as a bitcoin Amount
pub fn calculate_fee(tx_size: usize, fee_rate: f32) -> Amount {
    // Decimal keeps the rounding exact for fractional rates
    let rate = Decimal::from_f32(fee_rate).unwrap_or(Decimal::ONE);
    let fee = rate * Decimal::from(tx_size);
    let fee_sats = fee.ceil().to_u64().unwrap_or(u64::MAX);
    Amount::from_sat(fee_sats)
}

/// Minimum change amount worth creating at the given fee rate
///
/// Change below this is cheaper to leave to the miners than to carry as a
/// future input.
pub fn min_economical_change(fee_rate: f32, change_script: &Script) -> u64 {
    let output_fee = calculate_fee(output_size(change_script), fee_rate).to_sat();
    DUST_THRESHOLD + output_fee
}
