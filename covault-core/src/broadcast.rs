//! Final admission check before network relay
//!
//! A completed draft passes through exactly one gate on its way out: the
//! transaction must be fully signed, and must not already be known, either
//! confirmed in the chain index or sitting in the pending pool. An
//! already-known transaction is a no-op, not an error; that is what makes
//! repeated submission of the same session harmless.
//!
//! Relay fan-out is delegated entirely to the pool collaborator; this core
//! records the outcome and releases the session's coin reservations once
//! the transaction has been handed over.

use crate::coin_selection::CoinSelector;
use crate::coin_view::CoinView;
use crate::events::{MultisigEvent, MultisigEventBus};
use crate::logging::{log_transaction, LogLevel};
use crate::session::SigningSession;
use crate::signing::SignatureCombiner;
use crate::types::MultisigError;
use bitcoin::{Transaction, Txid};
use serde_json::json;
use std::collections::HashMap;
use std::collections::HashSet;

/// Membership queries against chain-confirmed transactions
pub trait ChainIndex {
    /// Is this transaction confirmed in the chain?
    fn contains_tx(&self, txid: &Txid) -> bool;
}

/// The pending pool: membership, submission and relay hand-off
pub trait TxPool {
    /// Is this transaction already pending?
    fn contains(&self, txid: &Txid) -> bool;

    /// Accept a transaction into the pool and fan it out to peers
    fn submit(&mut self, tx: Transaction) -> Result<(), MultisigError>;
}

/// Where an already-known transaction was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownLocation {
    /// Confirmed in the chain index
    Chain,
    /// Pending in the pool
    Pool,
}

/// Outcome of a submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The transaction was handed to the pool and relayed
    Broadcast {
        /// The submitted transaction id
        txid: Txid,
    },
    /// The transaction was already known; nothing was done
    AlreadyKnown {
        /// The known transaction id
        txid: Txid,
        /// Where it was found
        location: KnownLocation,
    },
}

/// Gate between a completed session and the network
pub struct BroadcastGate;

impl BroadcastGate {
    /// Submit a session's draft for network acceptance
    ///
    /// # Errors
    /// * `NotComplete` - some input's signature script does not satisfy its
    ///   locking script
    ///
    /// Completeness is re-verified cryptographically here rather than
    /// trusted from the session flag; a draft mutated since its last
    /// signing pass cannot slip through.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        session: &mut SigningSession,
        combiner: &SignatureCombiner,
        coins: &dyn CoinView,
        chain: &dyn ChainIndex,
        pool: &mut dyn TxPool,
        selector: &mut CoinSelector,
        bus: Option<&MultisigEventBus>,
    ) -> Result<Submission, MultisigError> {
        if !combiner.is_complete(session.draft(), coins) {
            return Err(MultisigError::NotComplete);
        }

        let txid = session.draft().txid();

        if chain.contains_tx(&txid) {
            log_transaction(
                LogLevel::Info,
                "broadcast_skipped",
                Some(json!({"txid": txid.to_string(), "location": "chain"})),
            );
            if let Some(bus) = bus {
                bus.publish(MultisigEvent::BroadcastSkipped {
                    txid: txid.to_string(),
                    location: "chain".to_string(),
                });
            }
            return Ok(Submission::AlreadyKnown {
                txid,
                location: KnownLocation::Chain,
            });
        }

        if pool.contains(&txid) {
            log_transaction(
                LogLevel::Info,
                "broadcast_skipped",
                Some(json!({"txid": txid.to_string(), "location": "pool"})),
            );
            if let Some(bus) = bus {
                bus.publish(MultisigEvent::BroadcastSkipped {
                    txid: txid.to_string(),
                    location: "pool".to_string(),
                });
            }
            return Ok(Submission::AlreadyKnown {
                txid,
                location: KnownLocation::Pool,
            });
        }

        pool.submit(session.draft().clone())?;
        session.mark_broadcast()?;
        selector.release(session.id(), bus);

        log_transaction(
            LogLevel::Info,
            "transaction_broadcast",
            Some(json!({"txid": txid.to_string()})),
        );
        if let Some(bus) = bus {
            bus.publish(MultisigEvent::Broadcast {
                txid: txid.to_string(),
            });
        }

        Ok(Submission::Broadcast { txid })
    }
}

/// In-memory chain index for tests and single-machine runs
#[derive(Default)]
pub struct MemoryChainIndex {
    confirmed: HashSet<Txid>,
}

impl MemoryChainIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction as chain-confirmed
    pub fn confirm(&mut self, txid: Txid) {
        self.confirmed.insert(txid);
    }
}

impl ChainIndex for MemoryChainIndex {
    fn contains_tx(&self, txid: &Txid) -> bool {
        self.confirmed.contains(txid)
    }
}

/// In-memory pending pool for tests and single-machine runs
#[derive(Default)]
pub struct MemoryTxPool {
    pending: HashMap<Txid, Transaction>,
}

impl MemoryTxPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending transactions
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fetch a pending transaction
    pub fn get(&self, txid: &Txid) -> Option<&Transaction> {
        self.pending.get(txid)
    }
}

impl TxPool for MemoryTxPool {
    fn contains(&self, txid: &Txid) -> bool {
        self.pending.contains_key(txid)
    }

    fn submit(&mut self, tx: Transaction) -> Result<(), MultisigError> {
        self.pending.insert(tx.txid(), tx);
        Ok(())
    }
}
