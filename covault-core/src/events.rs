//! Workflow event system
//!
//! Domain-specific events for the multisig workflow, published at the points
//! where the UI (or any other observer) needs to refresh: address
//! registration, coin reservation, draft lifecycle changes, broadcast
//! admission.
//!
//! Events must NOT contain sensitive data (private keys, signature
//! preimages); they carry identifiers and amounts only.

use bitcoin::OutPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Serializable representation of a Bitcoin OutPoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPointInfo {
    /// Transaction ID as a string
    pub txid: String,
    /// Output index
    pub vout: u32,
}

impl From<&OutPoint> for OutPointInfo {
    fn from(outpoint: &OutPoint) -> Self {
        Self {
            txid: outpoint.txid.to_string(),
            vout: outpoint.vout,
        }
    }
}

/// Domain-specific events emitted by the multisig workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultisigEvent {
    /// A new shared address was created and registered
    AddressCreated {
        /// The derived P2SH address
        address: String,
        /// Spending policy, e.g. "2 of 3"
        policy: String,
    },
    /// A shared address arrived over the exchange boundary and verified
    AddressImported {
        /// The verified P2SH address
        address: String,
    },
    /// Coins were reserved for an in-progress draft
    CoinsReserved {
        /// The reserved outpoints
        coins: Vec<OutPointInfo>,
        /// Total reserved amount in satoshis
        total: u64,
    },
    /// A session's reservations were released
    CoinsReleased {
        /// The released outpoints
        coins: Vec<OutPointInfo>,
    },
    /// An unsigned draft was assembled
    DraftBuilt {
        /// Draft transaction id (changes once signatures land)
        txid: String,
        /// Number of inputs
        inputs: usize,
        /// Number of outputs including change
        outputs: usize,
    },
    /// A local signing pass ran over a draft
    DraftSigned {
        /// Inputs fully satisfied after the pass
        satisfied: usize,
        /// Total inputs in the draft
        inputs: usize,
    },
    /// Every input of a draft is satisfied
    DraftCompleted {
        /// Final transaction id
        txid: String,
    },
    /// A completed draft was admitted to the pending pool and relayed
    Broadcast {
        /// Transaction id handed to the pool
        txid: String,
    },
    /// Submission was skipped because the transaction is already known
    BroadcastSkipped {
        /// The already-known transaction id
        txid: String,
        /// Where it was found: "chain" or "pool"
        location: String,
    },
}

impl MultisigEvent {
    fn kind(&self) -> &'static str {
        match self {
            MultisigEvent::AddressCreated { .. } => "address_created",
            MultisigEvent::AddressImported { .. } => "address_imported",
            MultisigEvent::CoinsReserved { .. } => "coins_reserved",
            MultisigEvent::CoinsReleased { .. } => "coins_released",
            MultisigEvent::DraftBuilt { .. } => "draft_built",
            MultisigEvent::DraftSigned { .. } => "draft_signed",
            MultisigEvent::DraftCompleted { .. } => "draft_completed",
            MultisigEvent::Broadcast { .. } => "broadcast",
            MultisigEvent::BroadcastSkipped { .. } => "broadcast_skipped",
        }
    }
}

/// Simple message bus for multisig workflow events
pub struct MultisigEventBus {
    subscribers: Arc<Mutex<HashMap<String, Vec<Sender<MultisigEvent>>>>>,
}

impl MultisigEventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to all workflow events
    pub fn subscribe_all(&self) -> Receiver<MultisigEvent> {
        self.subscribe("all")
    }

    /// Subscribe to a specific event kind
    ///
    /// # Arguments
    ///
    /// * `kind` - e.g. "draft_built", "broadcast", or "all" for everything
    pub fn subscribe(&self, kind: &str) -> Receiver<MultisigEvent> {
        let (sender, receiver) = std::sync::mpsc::channel();

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers
            .entry(kind.to_lowercase())
            .or_insert_with(Vec::new)
            .push(sender);

        receiver
    }

    /// Publish an event to matching subscribers
    pub fn publish(&self, event: MultisigEvent) {
        let kind = event.kind();
        let subscribers = self.subscribers.lock().unwrap();

        if let Some(list) = subscribers.get(kind) {
            for subscriber in list {
                // Ignore errors from closed channels
                let _ = subscriber.send(event.clone());
            }
        }

        if let Some(list) = subscribers.get("all") {
            for subscriber in list {
                let _ = subscriber.send(event.clone());
            }
        }
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock().unwrap();
        subscribers.values().map(|v| v.len()).sum()
    }
}

impl Default for MultisigEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_subscribe_publish() {
        let bus = MultisigEventBus::new();
        let receiver = bus.subscribe("draft_built");

        let event = MultisigEvent::DraftBuilt {
            txid: "0000000000000000000000000000000000000000000000000000000000000000".to_string(),
            inputs: 1,
            outputs: 2,
        };

        bus.publish(event.clone());

        let received = receiver.recv().unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn test_subscribe_all_sees_every_kind() {
        let bus = MultisigEventBus::new();
        let receiver = bus.subscribe_all();

        let event1 = MultisigEvent::AddressImported {
            address: "3abc".to_string(),
        };
        let event2 = MultisigEvent::BroadcastSkipped {
            txid: "00".repeat(32),
            location: "pool".to_string(),
        };

        bus.publish(event1.clone());
        bus.publish(event2.clone());

        assert_eq!(receiver.recv().unwrap(), event1);
        assert_eq!(receiver.recv().unwrap(), event2);
    }

    #[test]
    fn test_unrelated_subscription_receives_nothing() {
        let bus = MultisigEventBus::new();
        let receiver = bus.subscribe("broadcast");

        bus.publish(MultisigEvent::AddressImported {
            address: "3abc".to_string(),
        });

        assert!(receiver
            .recv_timeout(std::time::Duration::from_millis(50))
            .is_err());
    }
}
