//! Out-of-band exchange encodings
//!
//! Co-signers are rarely online at the same time, so drafts and shared
//! addresses travel as plain text files. Two encodings are defined here:
//!
//! - **Draft**: the consensus serialization of the transaction (version,
//!   inputs with their current signature scripts, outputs, locktime) as one
//!   newline-free hexadecimal string. Decoding is the exact inverse, for
//!   unsigned, partially signed and fully signed drafts alike.
//! - **Address record**: a JSON mapping with exactly two fields, the
//!   address string and the hex-encoded redeem script. Decoding produces an
//!   UNTRUSTED candidate; callers must push it through
//!   `RedeemScriptRegistry::import_address` before registering anything.
//!
//! Readers tolerate surrounding whitespace so files edited by hand or
//! shipped through mail clients still parse.

use crate::logging::{log_exchange, LogLevel};
use crate::types::{MultisigAddress, MultisigError};
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;

/// Draft transaction wire codec
pub struct DraftCodec;

impl DraftCodec {
    /// Serialize a draft to its hexadecimal exchange form
    pub fn encode(draft: &Transaction) -> String {
        serialize_hex(draft)
    }

    /// Parse a draft from its hexadecimal exchange form
    ///
    /// Fails with `MalformedTransaction` on any hex or consensus parse
    /// error (truncated data, trailing garbage, invalid count prefixes)
    /// without mutating any caller state.
    pub fn decode(text: &str) -> Result<Transaction, MultisigError> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| MultisigError::MalformedTransaction(format!("Invalid hex: {}", e)))?;
        deserialize::<Transaction>(&bytes)
            .map_err(|e| MultisigError::MalformedTransaction(e.to_string()))
    }
}

/// Untrusted address record parsed from an exchange file
///
/// Holds exactly what the counterparty claimed; verification happens in the
/// registry import, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCandidate {
    /// The claimed address string
    pub address: String,
    /// The claimed redeem script bytes
    pub redeem_script: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct AddressRecord {
    address: String,
    redeem_script: String,
}

/// Shared-address exchange codec
pub struct AddressExchangeCodec;

impl AddressExchangeCodec {
    /// Serialize an address and its redeem script as a JSON record
    pub fn encode(address: &MultisigAddress) -> String {
        let record = AddressRecord {
            address: address.address.to_string(),
            redeem_script: address.redeem_script.to_hex_string(),
        };
        // Two plain string fields; serialization cannot fail.
        serde_json::to_string(&record).expect("address record serializes")
    }

    /// Parse an address record into an untrusted candidate
    ///
    /// Fails with `MalformedRecord` when either field is absent or does not
    /// decode.
    pub fn decode(text: &str) -> Result<AddressCandidate, MultisigError> {
        let record: AddressRecord = serde_json::from_str(text.trim())
            .map_err(|e| MultisigError::MalformedRecord(e.to_string()))?;
        let redeem_script = hex::decode(&record.redeem_script).map_err(|e| {
            MultisigError::MalformedRecord(format!("Invalid redeem script hex: {}", e))
        })?;
        Ok(AddressCandidate {
            address: record.address,
            redeem_script,
        })
    }
}

/// Write a draft to a file as one line of hex
pub fn write_draft_file(path: &Path, draft: &Transaction) -> Result<(), MultisigError> {
    fs::write(path, DraftCodec::encode(draft))?;
    log_exchange(
        LogLevel::Info,
        "draft_exported",
        Some(json!({"path": path.display().to_string()})),
    );
    Ok(())
}

/// Read a draft back from a file written by `write_draft_file`
pub fn read_draft_file(path: &Path) -> Result<Transaction, MultisigError> {
    let text = fs::read_to_string(path)?;
    let draft = DraftCodec::decode(&text)?;
    log_exchange(
        LogLevel::Info,
        "draft_imported",
        Some(json!({"path": path.display().to_string()})),
    );
    Ok(draft)
}

/// Write an address record to a file
pub fn write_address_file(path: &Path, address: &MultisigAddress) -> Result<(), MultisigError> {
    fs::write(path, AddressExchangeCodec::encode(address))?;
    log_exchange(
        LogLevel::Info,
        "address_exported",
        Some(json!({"path": path.display().to_string()})),
    );
    Ok(())
}

/// Read an untrusted address record from a file
pub fn read_address_file(path: &Path) -> Result<AddressCandidate, MultisigError> {
    let text = fs::read_to_string(path)?;
    AddressExchangeCodec::decode(&text)
}
