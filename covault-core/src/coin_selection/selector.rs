//! Funding selector for shared addresses
//!
//! The selector answers two questions for the workflow:
//!
//! 1. Which registered addresses is this wallet a co-signer of? An address
//!    qualifies when at least one, but not every, designated key is local;
//!    plain owned addresses and fully-foreign ones are filtered out.
//! 2. Which coins fund the next draft for a given shared address? Selection
//!    takes every spendable output locking to the address's script and
//!    reserves it for the requesting session.
//!
//! An empty funding set is a valid answer, not an error; whether the total
//! suffices is the transaction builder's judgement.

use crate::coin_selection::types::{FundingSet, SharedUtxo};
use crate::coin_view::CoinView;
use crate::events::{MultisigEvent, MultisigEventBus, OutPointInfo};
use crate::key_store::KeyStore;
use crate::logging::{log_core, LogLevel};
use crate::script_registry::RedeemScriptRegistry;
use crate::session::SessionId;
use crate::types::MultisigAddress;
use bitcoin::{Amount, OutPoint};
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Selects and reserves funding coins for draft transactions
pub struct CoinSelector {
    /// Confirmations a coin needs before it may fund a draft
    min_confirmations: u32,
    /// Outpoints reserved by any live session
    reserved: HashSet<OutPoint>,
    /// Reservation ownership, per session
    sessions: HashMap<SessionId, Vec<OutPoint>>,
}

impl CoinSelector {
    /// Create a selector requiring the given confirmation depth
    pub fn new(min_confirmations: u32) -> Self {
        Self {
            min_confirmations,
            reserved: HashSet::new(),
            sessions: HashMap::new(),
        }
    }

    /// Addresses this wallet co-signs for
    ///
    /// Filters the registry to scripts where at least one, but not all, of
    /// the designated keys is local.
    pub fn list_owned_addresses(
        &self,
        registry: &RedeemScriptRegistry,
        key_store: &dyn KeyStore,
    ) -> Vec<MultisigAddress> {
        registry
            .list()
            .into_iter()
            .filter(|address| {
                let local = address
                    .public_keys
                    .iter()
                    .filter(|k| key_store.is_mine(k))
                    .count();
                local >= 1 && local < address.total()
            })
            .cloned()
            .collect()
    }

    /// Confirmed balance held by a shared address
    ///
    /// Display-only helper; does not touch reservations.
    pub fn address_balance(&self, address: &MultisigAddress, coins: &dyn CoinView) -> Amount {
        let script_pubkey = address.script_pubkey();
        coins
            .unspent()
            .iter()
            .filter(|c| c.script_pubkey == script_pubkey)
            .filter(|c| c.confirmations >= self.min_confirmations)
            .map(|c| c.amount)
            .sum()
    }

    /// Select and reserve every spendable coin of a shared address
    ///
    /// Idempotent per session: re-invoking for the same session first
    /// releases that session's previous reservation, so switching the
    /// funding address mid-draft does not leak reserved coins.
    ///
    /// Coins reserved by other sessions are skipped. Returns an empty set
    /// when no funding outputs exist.
    pub fn select_funding_set(
        &mut self,
        session: SessionId,
        address: &MultisigAddress,
        coins: &dyn CoinView,
        bus: Option<&MultisigEventBus>,
    ) -> FundingSet {
        let script_pubkey = address.script_pubkey();
        let selected: Vec<SharedUtxo> = coins
            .unspent()
            .into_iter()
            .filter(|c| c.script_pubkey == script_pubkey)
            .filter(|c| c.confirmations >= self.min_confirmations)
            .collect();

        let funding = self.reserve_coins(session, selected, bus);
        log_core(
            LogLevel::Debug,
            "funding_set_selected",
            Some(json!({
                "address": address.to_sanitized_string(),
                "coins": funding.len(),
                "total": funding.total.to_sat(),
            })),
        );

        funding
    }

    /// Reserve a specific set of coins for a session
    ///
    /// Coins already reserved by another session are skipped. Used directly
    /// when a draft arrives from a co-signer and the coins it spends are
    /// known rather than selected.
    pub fn reserve_coins(
        &mut self,
        session: SessionId,
        coins: Vec<SharedUtxo>,
        bus: Option<&MultisigEventBus>,
    ) -> FundingSet {
        // Idempotent per session: drop any previous reservation first.
        self.release(session, bus);

        let available: Vec<SharedUtxo> = coins
            .into_iter()
            .filter(|c| !self.reserved.contains(&c.outpoint))
            .collect();

        let outpoints: Vec<OutPoint> = available.iter().map(|c| c.outpoint).collect();
        for outpoint in &outpoints {
            self.reserved.insert(*outpoint);
        }
        self.sessions.insert(session, outpoints.clone());

        let funding = FundingSet::new(available);
        if let Some(bus) = bus {
            if !funding.is_empty() {
                bus.publish(MultisigEvent::CoinsReserved {
                    coins: outpoints.iter().map(OutPointInfo::from).collect(),
                    total: funding.total.to_sat(),
                });
            }
        }

        funding
    }

    /// Release every coin a session has reserved
    ///
    /// Safe to call for a session with no reservations.
    pub fn release(&mut self, session: SessionId, bus: Option<&MultisigEventBus>) {
        if let Some(outpoints) = self.sessions.remove(&session) {
            for outpoint in &outpoints {
                self.reserved.remove(outpoint);
            }
            if !outpoints.is_empty() {
                log_core(
                    LogLevel::Debug,
                    "reservation_released",
                    Some(json!({"coins": outpoints.len()})),
                );
                if let Some(bus) = bus {
                    bus.publish(MultisigEvent::CoinsReleased {
                        coins: outpoints.iter().map(OutPointInfo::from).collect(),
                    });
                }
            }
        }
    }

    /// Is this outpoint reserved by any session?
    pub fn is_reserved(&self, outpoint: &OutPoint) -> bool {
        self.reserved.contains(outpoint)
    }

    /// Outpoints currently reserved by a session
    pub fn reserved_for(&self, session: SessionId) -> &[OutPoint] {
        self.sessions
            .get(&session)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
