//! M-of-N redeem script construction, verification and storage
//!
//! This module owns every redeem script the wallet participates in. A
//! script enters the registry by one of two doors:
//!
//! - [`RedeemScriptRegistry::create`]: built locally from a set of
//!   participant public keys, after ownership validation
//! - [`RedeemScriptRegistry::import_address`]: received out-of-band from a
//!   co-signer and verified against the claimed address before any trust is
//!   granted
//!
//! Entries are keyed by the script hash, which is also what ties a funding
//! output's P2SH locking script back to its spending policy.
//!
//! # Security Considerations
//!
//! - Imported scripts are NEVER registered before the derived address has
//!   been recomputed and compared against the claimed one
//! - Ownership validation rejects degenerate sets where either nothing or
//!   everything is locally signable; shared custody requires both sides

use crate::key_store::KeyStore;
use crate::logging::{log_security, LogLevel};
use crate::types::{
    address_script_hash, parse_address, MultisigAddress, MultisigError, MAX_MULTISIG_KEYS,
    MIN_MULTISIG_KEYS,
};
use bitcoin::blockdata::opcodes::all as opcodes;
use bitcoin::blockdata::script::{Builder, Instruction};
use bitcoin::{Network, PublicKey, Script, ScriptBuf, ScriptHash};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;

/// Build the `OP_M <keys...> OP_N OP_CHECKMULTISIG` redeem script
pub fn build_multisig_script(required: u8, keys: &[PublicKey]) -> ScriptBuf {
    let mut builder = Builder::new().push_int(required as i64);
    for key in keys {
        builder = builder.push_key(key);
    }
    builder
        .push_int(keys.len() as i64)
        .push_opcode(opcodes::OP_CHECKMULTISIG)
        .into_script()
}

/// Decode OP_PUSHNUM_1..=OP_PUSHNUM_16 into its small-integer value
fn decode_pushnum(op: bitcoin::blockdata::opcodes::All) -> Option<u8> {
    let code = op.to_u8();
    let base = opcodes::OP_PUSHNUM_1.to_u8();
    let top = opcodes::OP_PUSHNUM_16.to_u8();
    if code >= base && code <= top {
        Some(code - base + 1)
    } else {
        None
    }
}

/// Parse a script as the standard M-of-N multisig pattern
///
/// Returns `None` for anything that is not exactly
/// `OP_M <pubkey>*N OP_N OP_CHECKMULTISIG` with fully-decodable keys and a
/// sane threshold.
pub fn parse_multisig_script(script: &Script) -> Option<(u8, Vec<PublicKey>)> {
    let mut instructions = script.instructions();

    let required = match instructions.next()? {
        Ok(Instruction::Op(op)) => decode_pushnum(op)?,
        _ => return None,
    };

    let mut keys = Vec::new();
    let mut declared_total = None;
    for item in instructions.by_ref() {
        match item {
            Ok(Instruction::PushBytes(push)) => {
                let key = PublicKey::from_slice(push.as_bytes()).ok()?;
                keys.push(key);
            }
            Ok(Instruction::Op(op)) => {
                declared_total = Some(decode_pushnum(op)?);
                break;
            }
            Err(_) => return None,
        }
    }

    match instructions.next()? {
        Ok(Instruction::Op(op)) if op == opcodes::OP_CHECKMULTISIG => {}
        _ => return None,
    }
    if instructions.next().is_some() {
        return None;
    }

    let total = declared_total?;
    if keys.is_empty() || keys.len() != total as usize {
        return None;
    }
    if required < 1 || required > total {
        return None;
    }

    Some((required, keys))
}

/// Store of the wallet's shared-custody redeem scripts
///
/// Mirrors the wallet-side pairing of script store and address book: each
/// registered script carries an optional label under the same script-hash
/// key.
pub struct RedeemScriptRegistry {
    network: Network,
    scripts: HashMap<ScriptHash, MultisigAddress>,
    labels: HashMap<ScriptHash, String>,
}

impl RedeemScriptRegistry {
    /// Create an empty registry for the given network
    pub fn new(network: Network) -> Self {
        Self {
            network,
            scripts: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    /// The network this registry validates addresses against
    pub fn network(&self) -> Network {
        self.network
    }

    /// Build and register a new M-of-N address from participant keys
    ///
    /// # Arguments
    /// * `required` - Signatures needed to spend (M)
    /// * `keys_hex` - Hex-encoded participant public keys, in script order
    /// * `key_store` - Used to classify each key as local or foreign
    /// * `label` - Optional address book label
    ///
    /// # Errors
    /// * `InvalidKey` - a key is not a valid, fully-decodable public key,
    ///   or the same key appears twice
    /// * `InvalidThreshold` - M < 1, M > N, or N outside the supported range
    /// * `DegenerateOwnership` - no key is local (nothing to ever sign) or
    ///   every key is local (defeats shared custody)
    pub fn create(
        &mut self,
        required: u8,
        keys_hex: &[&str],
        key_store: &dyn KeyStore,
        label: Option<&str>,
    ) -> Result<MultisigAddress, MultisigError> {
        let total = keys_hex.len();
        if !(MIN_MULTISIG_KEYS..=MAX_MULTISIG_KEYS).contains(&total) {
            return Err(MultisigError::InvalidThreshold(format!(
                "Supported key counts are {} to {}, got {}",
                MIN_MULTISIG_KEYS, MAX_MULTISIG_KEYS, total
            )));
        }
        if required < 1 || required as usize > total {
            return Err(MultisigError::InvalidThreshold(format!(
                "Require {} of {} signatures",
                required, total
            )));
        }

        let mut keys = Vec::with_capacity(total);
        for hex_key in keys_hex {
            let key = PublicKey::from_str(hex_key)
                .map_err(|e| MultisigError::InvalidKey(format!("\"{}\": {}", hex_key, e)))?;
            if keys.contains(&key) {
                return Err(MultisigError::InvalidKey(format!(
                    "Duplicate public key \"{}\"",
                    hex_key
                )));
            }
            keys.push(key);
        }

        let local = keys.iter().filter(|k| key_store.is_mine(k)).count();
        if local == 0 {
            return Err(MultisigError::DegenerateOwnership(
                "No public key belongs to this wallet".to_string(),
            ));
        }
        if local == total {
            return Err(MultisigError::DegenerateOwnership(
                "All public keys belong to this wallet".to_string(),
            ));
        }

        let redeem_script = build_multisig_script(required, &keys);
        let address =
            MultisigAddress::from_redeem_script(required, keys, redeem_script, self.network)?;

        self.register(address.clone(), label);
        log_security(
            LogLevel::Info,
            "multisig_address_created",
            Some(json!({
                "address": address.to_sanitized_string(),
                "policy": address.policy(),
                "local_keys": local,
            })),
        );

        Ok(address)
    }

    /// Verify and register an address received from a co-signer
    ///
    /// Recomputes the script hash from `redeem_script_bytes` and compares it
    /// against the hash carried by `claimed_address`; nothing is registered
    /// unless they agree and the script is a recognized multisig pattern.
    ///
    /// # Errors
    /// * `AddressMismatch` - the script does not hash to the claimed address
    /// * `NonStandardScript` - the bytes are not an M-of-N multisig script
    pub fn import_address(
        &mut self,
        claimed_address: &str,
        redeem_script_bytes: &[u8],
    ) -> Result<MultisigAddress, MultisigError> {
        let claimed = parse_address(claimed_address, self.network)?;
        let redeem_script = ScriptBuf::from_bytes(redeem_script_bytes.to_vec());
        let derived_hash = redeem_script.script_hash();

        let claimed_hash = address_script_hash(&claimed);
        if claimed_hash != Some(derived_hash) {
            let derived = bitcoin::Address::new(
                self.network,
                bitcoin::address::Payload::ScriptHash(derived_hash),
            )
            .to_string();
            log_security(
                LogLevel::Warn,
                "multisig_import_rejected",
                Some(json!({"reason": "address_mismatch"})),
            );
            return Err(MultisigError::AddressMismatch {
                claimed: claimed.to_string(),
                derived,
            });
        }

        let (required, keys) = parse_multisig_script(&redeem_script).ok_or_else(|| {
            MultisigError::NonStandardScript(
                "Script is not a recognized multisig pattern".to_string(),
            )
        })?;
        if !(MIN_MULTISIG_KEYS..=MAX_MULTISIG_KEYS).contains(&keys.len()) {
            return Err(MultisigError::NonStandardScript(format!(
                "Unsupported participant count {}",
                keys.len()
            )));
        }

        let address =
            MultisigAddress::from_redeem_script(required, keys, redeem_script, self.network)?;
        self.register(address.clone(), None);
        log_security(
            LogLevel::Info,
            "multisig_address_imported",
            Some(json!({
                "address": address.to_sanitized_string(),
                "policy": address.policy(),
            })),
        );

        Ok(address)
    }

    fn register(&mut self, address: MultisigAddress, label: Option<&str>) {
        if let Some(label) = label {
            self.labels.insert(address.script_hash, label.to_string());
        }
        self.scripts.insert(address.script_hash, address);
    }

    /// Look up a registered address by script hash
    pub fn get(&self, script_hash: &ScriptHash) -> Option<&MultisigAddress> {
        self.scripts.get(script_hash)
    }

    /// Resolve a P2SH locking script back to its registered address
    pub fn for_script_pubkey(&self, script_pubkey: &Script) -> Option<&MultisigAddress> {
        self.scripts
            .values()
            .find(|a| a.script_pubkey().as_script() == script_pubkey)
    }

    /// All registered addresses, in unspecified order
    pub fn list(&self) -> Vec<&MultisigAddress> {
        self.scripts.values().collect()
    }

    /// Label registered for a script hash, if any
    pub fn label(&self, script_hash: &ScriptHash) -> Option<&str> {
        self.labels.get(script_hash).map(|s| s.as_str())
    }

    /// Set or replace the label of a registered address
    pub fn set_label(&mut self, script_hash: ScriptHash, label: String) {
        self.labels.insert(script_hash, label);
    }

    /// Number of registered scripts
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
