//! The multisig workflow facade
//!
//! One [`MultisigWorkflow`] value wires the components together and owns
//! the single in-flight [`SigningSession`]. It exposes the surface the
//! original send dialog had (create or import a shared address, pick one,
//! build a draft, sign, export, import a co-signer's copy, submit, clear)
//! with every UI concern stripped away: operations return typed results
//! and publish events instead of touching widgets.
//!
//! Collaborators (key store, coin view, chain index, pending pool) are
//! passed per call rather than owned, so the workflow itself holds no
//! shared wallet state beyond its advisory reservations.

use crate::broadcast::{BroadcastGate, ChainIndex, Submission, TxPool};
use crate::builder::TransactionBuilder;
use crate::codec::{AddressExchangeCodec, DraftCodec};
use crate::coin_selection::types::SharedUtxo;
use crate::coin_selection::CoinSelector;
use crate::coin_view::CoinView;
use crate::config::Config;
use crate::events::{MultisigEvent, MultisigEventBus};
use crate::key_store::KeyStore;
use crate::script_registry::RedeemScriptRegistry;
use crate::session::{SessionId, SigningSession};
use crate::signing::{SignatureCombiner, SigningOutcome};
use crate::types::{MultisigAddress, MultisigError, Recipient};
use bitcoin::{Amount, Network};
use std::path::{Path, PathBuf};

/// Owns the components and the current signing session
pub struct MultisigWorkflow {
    registry: RedeemScriptRegistry,
    selector: CoinSelector,
    builder: TransactionBuilder,
    combiner: SignatureCombiner,
    bus: MultisigEventBus,
    draft_dir: PathBuf,
    current: Option<ActiveDraft>,
}

/// The in-flight draft and the shared address it spends from
struct ActiveDraft {
    session: SigningSession,
    address: MultisigAddress,
}

impl MultisigWorkflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &Config) -> Result<Self, MultisigError> {
        config.validate()?;
        let network = config.parsed_network()?;
        Ok(Self {
            registry: RedeemScriptRegistry::new(network),
            selector: CoinSelector::new(config.wallet.min_confirmations),
            builder: TransactionBuilder::with_fee_rate(config.wallet.fee_rate),
            combiner: SignatureCombiner::new(),
            bus: MultisigEventBus::new(),
            draft_dir: PathBuf::from(&config.exchange.draft_dir),
            current: None,
        })
    }

    /// Create a workflow with default settings on the given network
    pub fn new(network: Network) -> Self {
        Self {
            registry: RedeemScriptRegistry::new(network),
            selector: CoinSelector::new(1),
            builder: TransactionBuilder::new(),
            combiner: SignatureCombiner::new(),
            bus: MultisigEventBus::new(),
            draft_dir: PathBuf::from("."),
            current: None,
        }
    }

    /// The event bus observers subscribe to
    pub fn bus(&self) -> &MultisigEventBus {
        &self.bus
    }

    /// The script registry
    pub fn registry(&self) -> &RedeemScriptRegistry {
        &self.registry
    }

    /// The current session, if a draft is in flight
    pub fn session(&self) -> Option<&SigningSession> {
        self.current.as_ref().map(|d| &d.session)
    }

    /// Build and register a new shared address
    pub fn create_address(
        &mut self,
        required: u8,
        keys_hex: &[&str],
        key_store: &dyn KeyStore,
        label: Option<&str>,
    ) -> Result<MultisigAddress, MultisigError> {
        let address = self.registry.create(required, keys_hex, key_store, label)?;
        self.bus.publish(MultisigEvent::AddressCreated {
            address: address.address.to_string(),
            policy: address.policy(),
        });
        Ok(address)
    }

    /// Verify and register an address record received from a co-signer
    pub fn import_address_record(&mut self, text: &str) -> Result<MultisigAddress, MultisigError> {
        let candidate = AddressExchangeCodec::decode(text)?;
        let address = self
            .registry
            .import_address(&candidate.address, &candidate.redeem_script)?;
        self.bus.publish(MultisigEvent::AddressImported {
            address: address.address.to_string(),
        });
        Ok(address)
    }

    /// Serialize a registered address for out-of-band sharing
    pub fn export_address(&self, address: &MultisigAddress) -> String {
        AddressExchangeCodec::encode(address)
    }

    /// Shared addresses this wallet co-signs for
    pub fn shared_addresses(&self, key_store: &dyn KeyStore) -> Vec<MultisigAddress> {
        self.selector.list_owned_addresses(&self.registry, key_store)
    }

    /// Confirmed balance of a shared address
    pub fn address_balance(&self, address: &MultisigAddress, coins: &dyn CoinView) -> Amount {
        self.selector.address_balance(address, coins)
    }

    /// Select funding and build an unsigned draft, starting a new session
    ///
    /// Any previously active session is discarded first, releasing its
    /// reservations, exactly as clearing the form did in the original. On
    /// failure nothing is left reserved and no session is active.
    pub fn start_draft(
        &mut self,
        address: &MultisigAddress,
        recipients: &[Recipient],
        coins: &dyn CoinView,
    ) -> Result<&SigningSession, MultisigError> {
        self.clear();

        let id = SessionId::next();
        let funding = self
            .selector
            .select_funding_set(id, address, coins, Some(&self.bus));

        let draft = match self.builder.build(recipients, &funding, address) {
            Ok(draft) => draft,
            Err(e) => {
                self.selector.release(id, Some(&self.bus));
                return Err(e);
            }
        };

        self.bus.publish(MultisigEvent::DraftBuilt {
            txid: draft.txid().to_string(),
            inputs: draft.input.len(),
            outputs: draft.output.len(),
        });

        let active = self.current.insert(ActiveDraft {
            session: SigningSession::new(id, draft, funding),
            address: address.clone(),
        });
        Ok(&active.session)
    }

    /// Import a draft a co-signer exported, starting a new session
    ///
    /// The draft's inputs are matched against the wallet's coin view; the
    /// coins found there are reserved for this session so a concurrently
    /// started local draft cannot double-select them.
    pub fn import_draft(
        &mut self,
        text: &str,
        coins: &dyn CoinView,
    ) -> Result<&SigningSession, MultisigError> {
        let draft = DraftCodec::decode(text)?;

        // Resolve the funding address from the first recognizable input.
        let unspent = coins.unspent();
        let mut address = None;
        let mut spent_coins: Vec<SharedUtxo> = Vec::new();
        for input in &draft.input {
            if let Some(coin) = unspent.iter().find(|c| c.outpoint == input.previous_output) {
                if address.is_none() {
                    address = self.registry.for_script_pubkey(&coin.script_pubkey).cloned();
                }
                spent_coins.push(coin.clone());
            }
        }
        let address = address.ok_or_else(|| {
            MultisigError::MalformedTransaction(
                "Draft spends no coin of a registered shared address".to_string(),
            )
        })?;

        self.clear();
        let id = SessionId::next();
        let funding = self.selector.reserve_coins(id, spent_coins, Some(&self.bus));

        let mut session = SigningSession::new(id, draft, funding);
        let signed_slots = session
            .draft()
            .input
            .iter()
            .any(|i| !i.script_sig.is_empty());
        if signed_slots {
            let complete = self.combiner.is_complete(session.draft(), coins);
            session.record_signing(complete);
        }

        let active = self.current.insert(ActiveDraft { session, address });
        Ok(&active.session)
    }

    /// Sign the active draft with every local key and merge
    pub fn sign(
        &mut self,
        key_store: &dyn KeyStore,
        coins: &dyn CoinView,
    ) -> Result<SigningOutcome, MultisigError> {
        let active = self.current.as_mut().ok_or(MultisigError::NoActiveSession)?;

        let outcome =
            self.combiner
                .sign(active.session.draft_mut(), &self.registry, key_store, coins)?;
        active.session.record_signing(outcome.is_complete());

        self.bus.publish(MultisigEvent::DraftSigned {
            satisfied: outcome.satisfied(),
            inputs: outcome.statuses.len(),
        });
        if outcome.is_complete() {
            self.bus.publish(MultisigEvent::DraftCompleted {
                txid: active.session.draft().txid().to_string(),
            });
        }

        Ok(outcome)
    }

    /// Serialize the active draft for out-of-band exchange
    pub fn export_draft(&self) -> Result<String, MultisigError> {
        let active = self.current.as_ref().ok_or(MultisigError::NoActiveSession)?;
        Ok(DraftCodec::encode(active.session.draft()))
    }

    /// Write the active draft into the configured exchange directory
    ///
    /// Returns the path of the written file.
    pub fn export_draft_file(&self, file_name: &str) -> Result<PathBuf, MultisigError> {
        let active = self.current.as_ref().ok_or(MultisigError::NoActiveSession)?;
        let path = self.draft_dir.join(file_name);
        crate::codec::write_draft_file(&path, active.session.draft())?;
        Ok(path)
    }

    /// Import a draft from a file a co-signer shipped over
    pub fn import_draft_file(
        &mut self,
        path: &Path,
        coins: &dyn CoinView,
    ) -> Result<&SigningSession, MultisigError> {
        let text = std::fs::read_to_string(path)?;
        self.import_draft(&text, coins)
    }

    /// Submit the active draft through the broadcast gate
    ///
    /// On successful broadcast (or when the transaction turns out to be
    /// already known) the session stays available for inspection; `clear`
    /// disposes of it.
    pub fn submit(
        &mut self,
        coins: &dyn CoinView,
        chain: &dyn ChainIndex,
        pool: &mut dyn TxPool,
    ) -> Result<Submission, MultisigError> {
        let active = self.current.as_mut().ok_or(MultisigError::NoActiveSession)?;
        BroadcastGate::submit(
            &mut active.session,
            &self.combiner,
            coins,
            chain,
            pool,
            &mut self.selector,
            Some(&self.bus),
        )
    }

    /// Discard the active session and release its reservations
    pub fn clear(&mut self) {
        if let Some(mut active) = self.current.take() {
            let id = active.session.id();
            active.session.discard();
            self.selector.release(id, Some(&self.bus));
        }
    }

    /// The shared address the active draft spends from
    pub fn funding_address(&self) -> Option<&MultisigAddress> {
        self.current.as_ref().map(|d| &d.address)
    }
}
