//! Coin lookup collaborator interface
//!
//! The selector needs the wallet's view of its unspent outputs; the signer
//! needs previous-output resolution to recover each input's locking script.
//! Both are snapshots: implementations take whatever lock guards the shared
//! wallet state, copy out the data, and release before returning, so no
//! lock is held across signing computation.

use crate::coin_selection::types::SharedUtxo;
use bitcoin::{OutPoint, TxOut, Txid};
use std::collections::HashMap;

/// Read access to known coins and previous outputs
pub trait CoinView {
    /// Snapshot of all known unspent outputs
    fn unspent(&self) -> Vec<SharedUtxo>;

    /// Resolve one output of a previous transaction, or `None` when the
    /// transaction is unknown or has no such output
    fn prev_output(&self, txid: &Txid, vout: u32) -> Option<TxOut>;
}

/// In-memory coin view for tests and single-machine runs
pub struct MemoryCoinView {
    coins: Vec<SharedUtxo>,
    outputs: HashMap<Txid, Vec<TxOut>>,
}

impl MemoryCoinView {
    /// Create an empty view
    pub fn new() -> Self {
        Self {
            coins: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    /// Record a coin together with its previous-output data
    pub fn add_coin(&mut self, coin: SharedUtxo) {
        let entry = self
            .outputs
            .entry(coin.outpoint.txid)
            .or_insert_with(Vec::new);
        let vout = coin.outpoint.vout as usize;
        if entry.len() <= vout {
            entry.resize(
                vout + 1,
                TxOut {
                    value: 0,
                    script_pubkey: bitcoin::ScriptBuf::new(),
                },
            );
        }
        entry[vout] = TxOut {
            value: coin.amount.to_sat(),
            script_pubkey: coin.script_pubkey.clone(),
        };
        self.coins.push(coin);
    }

    /// Flag a coin as spent so it no longer appears in `unspent`
    pub fn mark_spent(&mut self, outpoint: &OutPoint) {
        if let Some(coin) = self.coins.iter_mut().find(|c| c.outpoint == *outpoint) {
            coin.spent = true;
        }
    }
}

impl Default for MemoryCoinView {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinView for MemoryCoinView {
    fn unspent(&self) -> Vec<SharedUtxo> {
        self.coins.iter().filter(|c| !c.spent).cloned().collect()
    }

    fn prev_output(&self, txid: &Txid, vout: u32) -> Option<TxOut> {
        self.outputs.get(txid)?.get(vout as usize).cloned()
    }
}
