//! Core types for funding-coin selection
//!
//! # Key Types
//!
//! - [`SharedUtxo`]: one unspent output controlled by a shared address
//! - [`FundingSet`]: the coins reserved for an in-progress draft
//!
//! These form the bookkeeping layer between the wallet's coin view and the
//! transaction builder: a draft only ever spends coins that passed through
//! a [`FundingSet`] reservation.

use bitcoin::{Amount, OutPoint, ScriptBuf};
use serde::{Deserialize, Serialize};

/// Unspent transaction output controlled by a shared address
///
/// # Fields
///
/// * `outpoint` - Reference to the transaction output (txid and vout)
/// * `script_pubkey` - The locking script (always P2SH for shared coins)
/// * `amount` - Amount locked in this output
/// * `confirmations` - Number of confirmations (0 for unconfirmed)
/// * `spent` - Whether the wallet already knows this output to be spent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedUtxo {
    /// Reference to the transaction output (txid and vout)
    pub outpoint: OutPoint,

    /// The locking script of this output
    pub script_pubkey: ScriptBuf,

    /// Amount in this output
    pub amount: Amount,

    /// Number of confirmations (0 for unconfirmed)
    pub confirmations: u32,

    /// Already spent according to the wallet
    pub spent: bool,
}

impl SharedUtxo {
    /// Create a new unspent output record
    pub fn new(
        outpoint: OutPoint,
        script_pubkey: ScriptBuf,
        amount: Amount,
        confirmations: u32,
    ) -> Self {
        Self {
            outpoint,
            script_pubkey,
            amount,
            confirmations,
            spent: false,
        }
    }

    /// Check if this output is confirmed
    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }

    /// Get a unique identifier for this output
    pub fn id(&self) -> String {
        format!("{}:{}", self.outpoint.txid, self.outpoint.vout)
    }
}

impl Serialize for SharedUtxo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SharedUtxo", 6)?;
        state.serialize_field("outpoint_txid", &self.outpoint.txid.to_string())?;
        state.serialize_field("outpoint_vout", &self.outpoint.vout)?;
        state.serialize_field("script_pubkey", &self.script_pubkey.to_hex_string())?;
        state.serialize_field("amount_sats", &self.amount.to_sat())?;
        state.serialize_field("confirmations", &self.confirmations)?;
        state.serialize_field("spent", &self.spent)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for SharedUtxo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;
        use std::str::FromStr;

        #[derive(Deserialize)]
        struct SharedUtxoHelper {
            outpoint_txid: String,
            outpoint_vout: u32,
            script_pubkey: String,
            amount_sats: u64,
            confirmations: u32,
            #[serde(default)]
            spent: bool,
        }

        let helper = SharedUtxoHelper::deserialize(deserializer)?;

        let txid = bitcoin::Txid::from_str(&helper.outpoint_txid)
            .map_err(|_| de::Error::custom("Invalid txid"))?;
        let script_bytes = hex::decode(&helper.script_pubkey)
            .map_err(|_| de::Error::custom("Invalid script hex"))?;

        Ok(SharedUtxo {
            outpoint: OutPoint::new(txid, helper.outpoint_vout),
            script_pubkey: ScriptBuf::from_bytes(script_bytes),
            amount: Amount::from_sat(helper.amount_sats),
            confirmations: helper.confirmations,
            spent: helper.spent,
        })
    }
}

/// The coins reserved for one in-progress draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingSet {
    /// Reserved coins, ordered by outpoint for deterministic input layout
    pub coins: Vec<SharedUtxo>,

    /// Sum of the reserved amounts
    pub total: Amount,
}

impl Default for FundingSet {
    fn default() -> Self {
        Self {
            coins: Vec::new(),
            total: Amount::ZERO,
        }
    }
}

impl FundingSet {
    /// Build a funding set, sorting the coins by outpoint
    pub fn new(mut coins: Vec<SharedUtxo>) -> Self {
        coins.sort_by(|a, b| {
            a.outpoint
                .txid
                .cmp(&b.outpoint.txid)
                .then(a.outpoint.vout.cmp(&b.outpoint.vout))
        });
        let total = coins.iter().map(|c| c.amount).sum();
        Self { coins, total }
    }

    /// True when nothing is reserved
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Number of reserved coins
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    /// The reserved outpoints, in input order
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.coins.iter().map(|c| c.outpoint).collect()
    }
}
