//! Signature production, combination and completeness
//!
//! Each input of a draft moves through three states:
//! `Unsigned -> PartiallySatisfied -> Satisfied`. A signing pass resolves
//! the input's previous locking script, signs with every local key, and
//! merges the result with whatever signatures the slot already carries,
//! typically ones a co-signer produced on another machine and shipped back
//! through the draft codec. Merging never discards a previously valid
//! signature.
//!
//! # Combination algorithm
//!
//! Signatures are matched to redeem-script keys in script order: a
//! candidate is tried against keys front to back and accepted at the first
//! position whose public key verifies it, never reused. Existing
//! signatures are offered before newly produced ones, so a re-signing pass
//! is stable. Up to M matches are kept; fewer than M leaves the input
//! partially satisfied.
//!
//! # Completeness
//!
//! An input counts as satisfied only when its assembled signature script
//! actually satisfies the previous output under the P2SH path: the trailing
//! push must hash to the committed script hash, the inner script must be
//! the expected multisig pattern, and exactly M signatures must verify in
//! key order, the same order `OP_CHECKMULTISIG` enforces.

use crate::coin_view::CoinView;
use crate::key_store::KeyStore;
use crate::logging::{log_transaction, LogLevel};
use crate::script_registry::{parse_multisig_script, RedeemScriptRegistry};
use crate::types::MultisigError;
use bitcoin::blockdata::opcodes::all as opcodes;
use bitcoin::blockdata::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PublicKey, Script, ScriptBuf, ScriptHash, Transaction};
use serde_json::json;

/// Signing state of a single input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    /// The signature slot is empty
    Unsigned,
    /// Some signatures are present but the input does not yet satisfy its
    /// locking script
    PartiallySatisfied,
    /// The combined signature script satisfies the locking script
    Satisfied,
}

/// Result of one signing pass over a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningOutcome {
    /// Per-input states after the pass, in input order
    pub statuses: Vec<InputStatus>,
}

impl SigningOutcome {
    /// True when every input is satisfied
    pub fn is_complete(&self) -> bool {
        !self.statuses.is_empty()
            && self
                .statuses
                .iter()
                .all(|s| *s == InputStatus::Satisfied)
    }

    /// Number of satisfied inputs
    pub fn satisfied(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == InputStatus::Satisfied)
            .count()
    }
}

/// Signs draft inputs with local keys and merges co-signer signatures
pub struct SignatureCombiner {
    secp: Secp256k1<All>,
}

impl SignatureCombiner {
    /// Create a combiner with a fresh verification context
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Run a signing pass over every input of the draft
    ///
    /// For each input this resolves the previous output via the coin lookup
    /// collaborator, recovers the redeem script (from the slot itself for
    /// imported drafts, falling back to the registry), signs with every
    /// local key and writes the merged signature script back into the slot.
    ///
    /// Reservation state is never touched here; only the in-memory
    /// signature slots change, and only once the whole pass has succeeded.
    /// A failure on any input leaves the draft exactly as it was.
    pub fn sign(
        &self,
        draft: &mut Transaction,
        registry: &RedeemScriptRegistry,
        key_store: &dyn KeyStore,
        coins: &dyn CoinView,
    ) -> Result<SigningOutcome, MultisigError> {
        let mut work = draft.clone();
        let mut statuses = Vec::with_capacity(work.input.len());

        for index in 0..work.input.len() {
            let outpoint = work.input[index].previous_output;
            // Snapshot the previous output, then work without the
            // collaborator; no lock is held across the signing math.
            let prev = coins
                .prev_output(&outpoint.txid, outpoint.vout)
                .ok_or_else(|| {
                    MultisigError::MalformedTransaction(format!(
                        "Previous output {} not found",
                        outpoint
                    ))
                })?;

            let prev_hash = p2sh_script_hash(&prev.script_pubkey).ok_or_else(|| {
                MultisigError::NonStandardScript(format!(
                    "Input {} does not spend a script-hash output",
                    index
                ))
            })?;

            let (existing_sigs, slot_redeem) = parse_signature_slot(&work.input[index].script_sig);
            let redeem_script = match slot_redeem {
                Some(script) => script,
                None => registry
                    .get(&prev_hash)
                    .map(|a| a.redeem_script.clone())
                    .ok_or_else(|| {
                        MultisigError::NonStandardScript(format!(
                            "No redeem script known for input {}",
                            index
                        ))
                    })?,
            };
            if redeem_script.script_hash() != prev_hash {
                return Err(MultisigError::NonStandardScript(format!(
                    "Redeem script for input {} does not match its locking script",
                    index
                )));
            }

            let (required, keys) = parse_multisig_script(&redeem_script).ok_or_else(|| {
                MultisigError::NonStandardScript(format!(
                    "Input {} redeem script is not a multisig pattern",
                    index
                ))
            })?;

            let digest = self.input_digest(&work, index, &redeem_script)?;

            let mut new_sigs = Vec::new();
            for key in &keys {
                if let Some(signature) = key_store.sign(key, &digest) {
                    new_sigs.push(encode_signature(&signature));
                }
            }

            let merged = self.merge_signatures(
                required as usize,
                &keys,
                &digest,
                &existing_sigs,
                &new_sigs,
            );

            work.input[index].script_sig = if merged.is_empty() {
                ScriptBuf::new()
            } else {
                assemble_signature_slot(&merged, &redeem_script)
            };

            statuses.push(self.input_status(&work, index, &prev.script_pubkey));
        }

        *draft = work;
        let outcome = SigningOutcome { statuses };
        log_transaction(
            LogLevel::Info,
            "draft_signed",
            Some(json!({
                "satisfied": outcome.satisfied(),
                "inputs": outcome.statuses.len(),
                "complete": outcome.is_complete(),
            })),
        );

        Ok(outcome)
    }

    /// Current state of one input against its previous locking script
    pub fn input_status(
        &self,
        draft: &Transaction,
        index: usize,
        prev_script_pubkey: &Script,
    ) -> InputStatus {
        if draft.input[index].script_sig.is_empty() {
            return InputStatus::Unsigned;
        }
        if self.verify_input(draft, index, prev_script_pubkey) {
            InputStatus::Satisfied
        } else {
            InputStatus::PartiallySatisfied
        }
    }

    /// Does this input's signature script satisfy its locking script?
    ///
    /// Mirrors standard script verification for the P2SH multisig case:
    /// hash commitment, pattern check, and ordered `OP_CHECKMULTISIG`
    /// signature validation.
    pub fn verify_input(
        &self,
        draft: &Transaction,
        index: usize,
        prev_script_pubkey: &Script,
    ) -> bool {
        let prev_hash = match p2sh_script_hash(prev_script_pubkey) {
            Some(hash) => hash,
            None => return false,
        };

        let (signatures, redeem) = parse_signature_slot(&draft.input[index].script_sig);
        let redeem = match redeem {
            Some(script) => script,
            None => return false,
        };
        if redeem.script_hash() != prev_hash {
            return false;
        }

        let (required, keys) = match parse_multisig_script(&redeem) {
            Some(parsed) => parsed,
            None => return false,
        };
        // OP_CHECKMULTISIG pops exactly M signatures; anything else leaves
        // the stack in a failing state.
        if signatures.len() != required as usize {
            return false;
        }

        let digest = match self.input_digest(draft, index, &redeem) {
            Ok(digest) => digest,
            Err(_) => return false,
        };

        // Signatures must verify in key order, consuming keys as they go.
        let mut key_index = 0;
        for signature in &signatures {
            let mut matched = false;
            while key_index < keys.len() {
                let key = &keys[key_index];
                key_index += 1;
                if self.signature_verifies(signature, key, &digest) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return false;
            }
        }

        true
    }

    /// Is every input of the draft satisfied?
    pub fn is_complete(&self, draft: &Transaction, coins: &dyn CoinView) -> bool {
        if draft.input.is_empty() {
            return false;
        }
        for index in 0..draft.input.len() {
            let outpoint = draft.input[index].previous_output;
            let prev = match coins.prev_output(&outpoint.txid, outpoint.vout) {
                Some(prev) => prev,
                None => return false,
            };
            if !self.verify_input(draft, index, &prev.script_pubkey) {
                return false;
            }
        }
        true
    }

    /// Legacy SIGHASH_ALL digest for one input against its redeem script
    fn input_digest(
        &self,
        draft: &Transaction,
        index: usize,
        redeem_script: &Script,
    ) -> Result<Message, MultisigError> {
        let sighash = SighashCache::new(draft)
            .legacy_signature_hash(index, redeem_script, EcdsaSighashType::All.to_u32())
            .map_err(|e| MultisigError::MalformedTransaction(e.to_string()))?;
        Message::from_slice(&sighash.to_byte_array())
            .map_err(|e| MultisigError::MalformedTransaction(e.to_string()))
    }

    /// Merge existing and new signatures into key order, capped at M
    fn merge_signatures(
        &self,
        required: usize,
        keys: &[PublicKey],
        digest: &Message,
        existing: &[Vec<u8>],
        new: &[Vec<u8>],
    ) -> Vec<Vec<u8>> {
        // Existing signatures first, so a prior co-signer's work survives a
        // local re-signing pass unchanged.
        let mut candidates: Vec<(Vec<u8>, bool)> = existing
            .iter()
            .chain(new.iter())
            .map(|s| (s.clone(), false))
            .collect();

        let mut merged: Vec<Vec<u8>> = Vec::new();
        for key in keys {
            if merged.len() == required {
                break;
            }
            for (candidate, used) in candidates.iter_mut() {
                if *used {
                    continue;
                }
                if self.signature_verifies(candidate, key, digest) {
                    *used = true;
                    merged.push(candidate.clone());
                    break;
                }
            }
        }

        merged
    }

    /// Check one encoded signature (DER + sighash byte) against a key
    fn signature_verifies(&self, encoded: &[u8], key: &PublicKey, digest: &Message) -> bool {
        if encoded.len() < 2 {
            return false;
        }
        let der = &encoded[..encoded.len() - 1];
        match Signature::from_der(der) {
            Ok(signature) => self
                .secp
                .verify_ecdsa(digest, &signature, &key.inner)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl Default for SignatureCombiner {
    fn default() -> Self {
        Self::new()
    }
}

/// DER-encode a signature and append the SIGHASH_ALL byte
fn encode_signature(signature: &Signature) -> Vec<u8> {
    let mut encoded = signature.serialize_der().to_vec();
    encoded.push(EcdsaSighashType::All.to_u32() as u8);
    encoded
}

/// Extract the script hash committed to by a P2SH locking script
fn p2sh_script_hash(script_pubkey: &Script) -> Option<ScriptHash> {
    if !script_pubkey.is_p2sh() {
        return None;
    }
    let bytes = script_pubkey.as_bytes();
    // OP_HASH160 OP_PUSHBYTES_20 <hash> OP_EQUAL
    ScriptHash::from_slice(&bytes[2..22]).ok()
}

/// Split a signature slot into its signature pushes and trailing redeem
/// script
///
/// The leading `OP_0` dummy is represented as an empty push and skipped.
/// The trailing push only counts as the redeem script when it parses as a
/// multisig pattern; a slot holding bare signatures comes back with `None`.
fn parse_signature_slot(script_sig: &Script) -> (Vec<Vec<u8>>, Option<ScriptBuf>) {
    let mut pushes: Vec<Vec<u8>> = Vec::new();
    for instruction in script_sig.instructions() {
        match instruction {
            Ok(Instruction::PushBytes(push)) => {
                if !push.as_bytes().is_empty() {
                    pushes.push(push.as_bytes().to_vec());
                }
            }
            Ok(Instruction::Op(_)) => {}
            Err(_) => return (Vec::new(), None),
        }
    }

    if let Some(last) = pushes.last() {
        let candidate = ScriptBuf::from_bytes(last.clone());
        if parse_multisig_script(&candidate).is_some() {
            pushes.pop();
            return (pushes, Some(candidate));
        }
    }

    (pushes, None)
}

/// Build `OP_0 <sigs...> <redeem>` for a (possibly partial) signature set
fn assemble_signature_slot(signatures: &[Vec<u8>], redeem_script: &Script) -> ScriptBuf {
    let mut builder = Builder::new().push_opcode(opcodes::OP_PUSHBYTES_0);
    for signature in signatures {
        let push = PushBytesBuf::try_from(signature.clone())
            .expect("signature encoding fits a script push");
        builder = builder.push_slice(push);
    }
    let redeem_push = PushBytesBuf::try_from(redeem_script.to_bytes())
        .expect("redeem script fits a script push");
    builder.push_slice(redeem_push).into_script()
}
