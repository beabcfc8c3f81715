//! Unsigned draft transaction assembly
//!
//! Builds the draft that co-signers will pass around: one input per
//! reserved coin with an empty signature slot, one output per recipient,
//! and a change output back to the funding address when the leftover is
//! worth keeping.
//!
//! # Determinism
//!
//! The unsigned draft is exchanged out-of-band and must match bit-for-bit
//! between signer and verifier. Everything that could introduce variation
//! is pinned down: inputs follow the funding set's outpoint order, outputs
//! follow the caller's recipient order with change always last, and version
//! and locktime are constants. Rebuilding from the same recipients and the
//! same funding set yields identical bytes.

use crate::coin_selection::types::FundingSet;
use crate::logging::{log_transaction, LogLevel};
use crate::math;
use crate::types::{MultisigAddress, MultisigError, Recipient};
use bitcoin::absolute::LockTime;
use bitcoin::{ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use serde_json::json;
use std::collections::HashSet;

/// Draft transaction version; legacy P2SH spends have no use for v2 fields
const DRAFT_VERSION: i32 = 1;

/// Assembles unsigned drafts from recipients and reserved coins
pub struct TransactionBuilder {
    /// Fee rate in satoshis per vbyte
    fee_rate: f32,
}

impl TransactionBuilder {
    /// Create a builder with the default fee rate of 1 sat/vB
    pub fn new() -> Self {
        Self { fee_rate: 1.0 }
    }

    /// Create a builder with the specified fee rate
    pub fn with_fee_rate(fee_rate: f32) -> Self {
        Self { fee_rate }
    }

    /// Get the current fee rate
    pub fn fee_rate(&self) -> f32 {
        self.fee_rate
    }

    /// Build an unsigned draft spending the reserved coins
    ///
    /// # Arguments
    /// * `recipients` - Payment destinations, in output order
    /// * `funding` - The session's reserved coins
    /// * `funding_address` - The shared address being spent from; change
    ///   returns here
    ///
    /// # Errors
    /// * `NoFundsReserved` - the funding set is empty
    /// * `DuplicateRecipient` - two recipients share a destination
    /// * `InsufficientFunds` - recipients plus estimated fee exceed the
    ///   reserved total
    pub fn build(
        &self,
        recipients: &[Recipient],
        funding: &FundingSet,
        funding_address: &MultisigAddress,
    ) -> Result<Transaction, MultisigError> {
        if funding.is_empty() {
            return Err(MultisigError::NoFundsReserved);
        }
        if recipients.is_empty() {
            return Err(MultisigError::InvalidAmount(
                "A draft needs at least one recipient".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for recipient in recipients {
            if !seen.insert(recipient.address.to_string()) {
                return Err(MultisigError::DuplicateRecipient(
                    recipient.address.to_string(),
                ));
            }
        }

        let mut payment_total: u64 = 0;
        for recipient in recipients {
            payment_total = payment_total
                .checked_add(recipient.amount.to_sat())
                .ok_or_else(|| {
                    MultisigError::InvalidAmount("Recipient amounts overflow".to_string())
                })?;
        }

        // Fee is estimated against the worst case: every input fully signed
        // and a change output present.
        let change_script = funding_address.script_pubkey();
        let recipient_scripts: Vec<ScriptBuf> = recipients
            .iter()
            .map(|r| r.address.script_pubkey())
            .collect();
        let mut output_scripts: Vec<&bitcoin::Script> =
            recipient_scripts.iter().map(|s| s.as_script()).collect();
        output_scripts.push(change_script.as_script());
        let size = math::estimate_tx_size(
            funding.len(),
            funding_address.required as usize,
            funding_address.total(),
            &output_scripts,
        );
        let fee = math::calculate_fee(size, self.fee_rate).to_sat();

        let available = funding.total.to_sat();
        let needed = payment_total.saturating_add(fee);
        if needed > available {
            return Err(MultisigError::InsufficientFunds { needed, available });
        }

        let inputs: Vec<TxIn> = funding
            .coins
            .iter()
            .map(|coin| TxIn {
                previous_output: coin.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect();

        let mut outputs: Vec<TxOut> = recipients
            .iter()
            .map(|recipient| TxOut {
                value: recipient.amount.to_sat(),
                script_pubkey: recipient.address.script_pubkey(),
            })
            .collect();

        // Leftover below the dust threshold is folded into the fee instead
        // of producing an unspendable change output.
        let leftover = available - payment_total - fee;
        if !math::is_dust_amount(leftover) {
            outputs.push(TxOut {
                value: leftover,
                script_pubkey: change_script,
            });
        }

        let draft = Transaction {
            version: DRAFT_VERSION,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };

        log_transaction(
            LogLevel::Info,
            "draft_built",
            Some(json!({
                "txid": draft.txid().to_string(),
                "inputs": draft.input.len(),
                "outputs": draft.output.len(),
                "fee": fee,
            })),
        );

        Ok(draft)
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
