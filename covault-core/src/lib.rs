//! CoVault Core Library
//!
//! This crate implements the offline M-of-N multisignature transaction
//! workflow for the CoVault shared-custody wallet: building shared
//! addresses, selecting and reserving funding coins, assembling
//! deterministic draft transactions, accumulating partial signatures across
//! machines, and gating broadcast.
//!
//! # Modules
//!
//! - `types`: Core domain types and the workflow error enum
//! - `math`: Size and fee estimation for P2SH multisig spends
//! - `logging`: Security-aware logging infrastructure
//! - `config`: TOML configuration management
//! - `events`: Workflow event bus
//! - `key_store`: Key-store collaborator boundary
//! - `coin_view`: Coin lookup collaborator boundary
//! - `script_registry`: Redeem script construction, verification, storage
//! - `coin_selection`: Funding selection and coin reservation
//! - `builder`: Unsigned draft assembly
//! - `session`: Per-draft signing session state
//! - `signing`: Signature production, combination and completeness
//! - `codec`: Draft and address exchange encodings
//! - `broadcast`: Final admission gate before relay
//! - `workflow`: Facade owning the components and the active session
//!
//! # Security Considerations
//!
//! - Private key material never enters this crate; signing goes through
//!   the key-store collaborator
//! - Imported scripts and drafts are verified before trust is granted
//! - Logging sanitizes addresses and transaction ids

/// Core domain types for the multisig workflow
pub mod types;

/// Size and fee calculations
pub mod math;

/// Secure logging functionality
pub mod logging;

/// Configuration management
pub mod config;

/// Workflow event bus
pub mod events;

/// Key-store collaborator boundary
pub mod key_store;

/// Coin lookup collaborator boundary
pub mod coin_view;

/// Redeem script registry
pub mod script_registry;

/// Funding selection and reservation
pub mod coin_selection;

/// Draft transaction assembly
pub mod builder;

/// Signing session state
pub mod session;

/// Signature combination
pub mod signing;

/// Out-of-band exchange codecs
pub mod codec;

/// Broadcast admission gate
pub mod broadcast;

/// Workflow facade
pub mod workflow;

/// Re-export core types for convenience
pub use types::{
    sanitize_for_display, MultisigAddress, MultisigError, Recipient, DUST_THRESHOLD,
    MAX_BITCOIN_SUPPLY, SATS_PER_BTC,
};

/// Re-export coin selection types
pub use coin_selection::{CoinSelector, FundingSet, SharedUtxo};

/// Re-export the collaborator boundaries
pub use coin_view::{CoinView, MemoryCoinView};
pub use key_store::{KeyStore, MemoryKeyStore};

/// Re-export the component surface
pub use broadcast::{
    BroadcastGate, ChainIndex, KnownLocation, MemoryChainIndex, MemoryTxPool, Submission, TxPool,
};
pub use builder::TransactionBuilder;
pub use codec::{AddressCandidate, AddressExchangeCodec, DraftCodec};
pub use script_registry::RedeemScriptRegistry;
pub use session::{SessionId, SessionState, SigningSession};
pub use signing::{InputStatus, SignatureCombiner, SigningOutcome};
pub use workflow::MultisigWorkflow;

/// Re-export events
pub use events::{MultisigEvent, MultisigEventBus, OutPointInfo};

// Re-export important Bitcoin types
pub use bitcoin::{Address, Amount, Network, OutPoint, Transaction, Txid};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if the library was built in debug mode
pub const fn is_debug_build() -> bool {
    cfg!(debug_assertions)
}

/// Library initialization
///
/// Sets up logging with the default configuration. Safe to call multiple
/// times; only the first call has an effect.
pub fn init() -> Result<(), String> {
    logging::init(&logging::LogConfig::default())
}

// No test modules declared here - integration tests are in the tests/ directory
