//! Common data types for the CoVault multisig workflow
//!
//! These types represent the shared data structures used across the
//! components of the signing workflow. They are designed to be serializable
//! and to NOT contain sensitive cryptographic material.
//!
//! # Security Boundaries
//!
//! These types are designed to be safely passed across security boundaries:
//! - Between UI and workflow logic
//! - Between co-signers over the file exchange boundary
//!
//! IMPORTANT: These types MUST NOT contain private keys or other sensitive
//! material. Locality of a public key ("does this wallet hold the private
//! key?") is always a query against the key-store collaborator, never state
//! carried here.

use bitcoin::address::Payload;
use bitcoin::{Address, Amount, Network, PublicKey, ScriptBuf, ScriptHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Constants for Bitcoin-specific values

/// Constant for dust threshold (minimum output value)
pub const DUST_THRESHOLD: u64 = 546;

/// Constant for satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Constant for maximum Bitcoin supply in satoshis
pub const MAX_BITCOIN_SUPPLY: u64 = 21_000_000 * SATS_PER_BTC;

/// Smallest number of keys a shared address may carry
pub const MIN_MULTISIG_KEYS: usize = 2;

/// Largest number of keys a shared address may carry
pub const MAX_MULTISIG_KEYS: usize = 3;

/// A shared-custody M-of-N address
///
/// Wraps the redeem script encoding the M-of-N condition together with its
/// derived script hash and pay-to-script-hash address.
///
/// # Invariant
///
/// `address` always equals the P2SH address of `hash160(redeem_script)`.
/// Construction goes through [`MultisigAddress::from_redeem_script`], which
/// derives both fields, so a value of this type can only hold a consistent
/// triple. Imported records must be re-derived and compared before trust is
/// granted (see `script_registry::RedeemScriptRegistry::import_address`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigAddress {
    /// Number of signatures required to spend (M)
    pub required: u8,

    /// The designated public keys, in redeem-script order (N of them)
    pub public_keys: Vec<PublicKey>,

    /// The serialized M-of-N redeem script
    pub redeem_script: ScriptBuf,

    /// hash160 of the redeem script
    pub script_hash: ScriptHash,

    /// The derived pay-to-script-hash address
    pub address: Address,
}

impl MultisigAddress {
    /// Build the derived fields from a redeem script and its decoded policy
    ///
    /// The caller is responsible for having parsed `required` and
    /// `public_keys` out of `redeem_script`; this constructor only derives
    /// the hash and address, so the consistency invariant holds by
    /// construction.
    pub fn from_redeem_script(
        required: u8,
        public_keys: Vec<PublicKey>,
        redeem_script: ScriptBuf,
        network: Network,
    ) -> Result<Self, MultisigError> {
        let script_hash = redeem_script.script_hash();
        let address = Address::p2sh(&redeem_script, network)
            .map_err(|e| MultisigError::NonStandardScript(e.to_string()))?;
        Ok(Self {
            required,
            public_keys,
            redeem_script,
            script_hash,
            address,
        })
    }

    /// Total number of designated keys (N)
    pub fn total(&self) -> usize {
        self.public_keys.len()
    }

    /// The locking script that pays into this address
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2sh(&self.script_hash)
    }

    /// Per-participant P2PKH addresses, in key order
    ///
    /// Used for the "who has to sign" detail display, the same information
    /// the original address view extracts from the stored script.
    pub fn participant_addresses(&self, network: Network) -> Vec<Address> {
        self.public_keys
            .iter()
            .map(|pk| Address::p2pkh(pk, network))
            .collect()
    }

    /// Human-readable spending policy, e.g. "2 of 3 signatures"
    pub fn policy(&self) -> String {
        format!("{} of {} signatures", self.required, self.total())
    }

    /// Get a sanitized string representation for logging
    pub fn to_sanitized_string(&self) -> String {
        let addr_str = self.address.to_string();
        if addr_str.len() <= 12 {
            return addr_str;
        }

        let prefix = &addr_str[0..6];
        let suffix = &addr_str[addr_str.len() - 6..];
        format!("{}...{}", prefix, suffix)
    }
}

impl fmt::Display for MultisigAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.policy())
    }
}

// Custom serialization so the Address type round-trips as a string and the
// derived fields are re-checked on the way back in.
impl Serialize for MultisigAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct MultisigAddressHelper {
            address: String,
            network: Network,
            required: u8,
            public_keys: Vec<String>,
            redeem_script: String,
        }

        let helper = MultisigAddressHelper {
            address: self.address.to_string(),
            network: self.address.network,
            required: self.required,
            public_keys: self.public_keys.iter().map(|k| k.to_string()).collect(),
            redeem_script: self.redeem_script.to_hex_string(),
        };

        helper.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MultisigAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct MultisigAddressHelper {
            address: String,
            network: Network,
            required: u8,
            public_keys: Vec<String>,
            redeem_script: String,
        }

        let helper = MultisigAddressHelper::deserialize(deserializer)?;

        let script_bytes = hex::decode(&helper.redeem_script)
            .map_err(|e| serde::de::Error::custom(format!("Invalid redeem script hex: {}", e)))?;
        let redeem_script = ScriptBuf::from_bytes(script_bytes);

        let public_keys = helper
            .public_keys
            .iter()
            .map(|k| PublicKey::from_str(k))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| serde::de::Error::custom(format!("Invalid public key: {}", e)))?;

        let derived =
            MultisigAddress::from_redeem_script(helper.required, public_keys, redeem_script, helper.network)
                .map_err(serde::de::Error::custom)?;

        // The serialized address string must agree with the re-derived one.
        if derived.address.to_string() != helper.address {
            return Err(serde::de::Error::custom(format!(
                "Address mismatch: got {}, derived {}",
                helper.address, derived.address
            )));
        }

        Ok(derived)
    }
}

/// One payment destination within a draft transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    /// Destination address
    pub address: Address,

    /// Payment amount (must be positive)
    pub amount: Amount,

    /// Optional label for display
    pub label: Option<String>,
}

impl Recipient {
    /// Create a new recipient from an already-validated address
    pub fn new(address: Address, amount: Amount) -> Result<Self, MultisigError> {
        if amount.to_sat() == 0 {
            return Err(MultisigError::InvalidAmount(
                "The amount to pay must be larger than 0".to_string(),
            ));
        }
        if amount.to_sat() > MAX_BITCOIN_SUPPLY {
            return Err(MultisigError::InvalidAmount(format!(
                "Amount {} exceeds maximum supply",
                amount
            )));
        }
        Ok(Self {
            address,
            amount,
            label: None,
        })
    }

    /// Create a new recipient with address string validation
    pub fn new_validated(
        address: &str,
        amount: Amount,
        network: Network,
    ) -> Result<Self, MultisigError> {
        let parsed = parse_address(address, network)?;
        Self::new(parsed, amount)
    }

    /// Add a label to this recipient
    pub fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{} to {} ({})", self.amount, self.address, label)
        } else {
            write!(f, "{} to {}", self.amount, self.address)
        }
    }
}

/// Parse and validate a Bitcoin address against an expected network
pub fn parse_address(address: &str, network: Network) -> Result<Address, MultisigError> {
    let unchecked = Address::from_str(address)
        .map_err(|e| MultisigError::InvalidAddress(format!("Invalid address format: {}", e)))?;

    if unchecked.network != network {
        return Err(MultisigError::InvalidAddress(format!(
            "Address belongs to {} network, but expected {}",
            unchecked.network, network
        )));
    }

    Ok(unchecked.assume_checked())
}

/// Extract the script hash from a P2SH address
///
/// Returns `None` for key-hash or witness addresses; the multisig workflow
/// only ever deals in script-hash destinations for its own shared addresses.
pub fn address_script_hash(address: &Address) -> Option<ScriptHash> {
    match &address.payload {
        Payload::ScriptHash(hash) => Some(*hash),
        _ => None,
    }
}

/// Sanitize a string for display (to avoid leaking sensitive data)
///
/// Keeps the first `prefix_chars` characters and replaces the rest with
/// asterisks.
pub fn sanitize_for_display(input: &str, prefix_chars: usize) -> String {
    if input.len() <= prefix_chars {
        return input.to_string();
    }

    let visible = &input[0..prefix_chars];
    let hidden = "*".repeat(input.len() - prefix_chars);
    format!("{}{}", visible, hidden)
}

/// Common error types for the multisig workflow
///
/// # Security
///
/// These error types are designed to provide meaningful errors without
/// leaking sensitive information. Every failure a caller can recover from is
/// a distinct variant; the session an operation ran against is left
/// unchanged so the operation can be retried after correcting input.
#[derive(Debug, Error)]
pub enum MultisigError {
    /// A supplied public key did not fully decode
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// Threshold M outside 1..=N, or N outside the supported 2..=3 range
    #[error("Invalid signature threshold: {0}")]
    InvalidThreshold(String),

    /// Zero of the keys are local, or all of them are
    #[error("Degenerate ownership: {0}")]
    DegenerateOwnership(String),

    /// An imported redeem script does not hash to the claimed address
    #[error("Address mismatch: claimed {claimed}, derived {derived}")]
    AddressMismatch { claimed: String, derived: String },

    /// A script does not parse as a recognized multisig pattern
    #[error("Non-standard script: {0}")]
    NonStandardScript(String),

    /// A draft was requested with an empty funding set
    #[error("No funds reserved for this draft")]
    NoFundsReserved,

    /// Recipients plus estimated fee exceed the reserved total
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Two recipients share a destination
    #[error("Duplicate recipient: {0}")]
    DuplicateRecipient(String),

    /// A draft byte string failed to parse
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// An address exchange record failed to parse
    #[error("Malformed address record: {0}")]
    MalformedRecord(String),

    /// Submission was attempted before every input was satisfied
    #[error("Transaction is not completely signed")]
    NotComplete,

    /// A session-scoped operation ran without an active draft
    #[error("No draft session is active")]
    NoActiveSession,

    /// Address parse or network validation failure
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount validation failure
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration load/store failure
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File exchange I/O failure
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<bitcoin::address::Error> for MultisigError {
    fn from(err: bitcoin::address::Error) -> Self {
        MultisigError::InvalidAddress(err.to_string())
    }
}

impl From<std::io::Error> for MultisigError {
    fn from(err: std::io::Error) -> Self {
        MultisigError::IoError(err.to_string())
    }
}
