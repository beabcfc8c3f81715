
use bitcoin::Address;
use covault_core::script_registry::{build_multisig_script, parse_multisig_script};
use covault_core::{MultisigError, RedeemScriptRegistry};
use test_helpers::*;

#[test]
fn create_succeeds_for_every_supported_policy() {
    setup();
    let (k1, k2, k3) = three_secrets();
    let all = [k1, k2, k3];

    // Every (M, N) with N in {2, 3}, M in 1..=N, and a wallet holding one
    // key but never all of them.
    for total in 2..=3usize {
        for required in 1..=total as u8 {
            let mut registry = RedeemScriptRegistry::new(NETWORK);
            let store = store_with(&all[..1]);
            let keys_hex: Vec<String> = all[..total].iter().map(public_hex).collect();
            let keys_ref: Vec<&str> = keys_hex.iter().map(|s| s.as_str()).collect();

            let address = registry
                .create(required, &keys_ref, &store, None)
                .unwrap_or_else(|e| panic!("{} of {} failed: {}", required, total, e));

            assert_eq!(address.required, required);
            assert_eq!(address.total(), total);
            // The address must commit to hash160 of the produced script.
            assert_eq!(address.script_hash, address.redeem_script.script_hash());
            assert_eq!(
                address.address,
                Address::p2sh(&address.redeem_script, NETWORK).unwrap()
            );
            assert_eq!(address.participant_addresses(NETWORK).len(), total);
            assert_eq!(
                address.policy(),
                format!("{} of {} signatures", required, total)
            );
            assert!(registry.get(&address.script_hash).is_some());
        }
    }
}

#[test]
fn create_rejects_undecodable_key() {
    setup();
    let (k1, _, _) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);

    let good = public_hex(&k1);
    let result = registry.create(1, &[&good, "02deadbeef"], &store, None);
    assert!(matches!(result, Err(MultisigError::InvalidKey(_))));
    assert!(registry.is_empty());
}

#[test]
fn create_rejects_duplicate_key() {
    setup();
    let (k1, _, _) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);

    let hex = public_hex(&k1);
    let result = registry.create(1, &[&hex, &hex], &store, None);
    assert!(matches!(result, Err(MultisigError::InvalidKey(_))));
}

#[test]
fn create_rejects_bad_thresholds() {
    setup();
    let (k1, k2, k3) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);
    let hexes = [public_hex(&k1), public_hex(&k2), public_hex(&k3)];

    // M = 0
    let result = registry.create(0, &[&hexes[0], &hexes[1]], &store, None);
    assert!(matches!(result, Err(MultisigError::InvalidThreshold(_))));

    // M > N
    let result = registry.create(3, &[&hexes[0], &hexes[1]], &store, None);
    assert!(matches!(result, Err(MultisigError::InvalidThreshold(_))));

    // N = 1 is below the supported range
    let result = registry.create(1, &[&hexes[0]], &store, None);
    assert!(matches!(result, Err(MultisigError::InvalidThreshold(_))));
}

#[test]
fn create_rejects_degenerate_ownership() {
    setup();
    let (k1, k2, _) = three_secrets();
    let hexes = [public_hex(&k1), public_hex(&k2)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();

    // Nothing local: the wallet could never sign.
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let empty_store = store_with(&[]);
    let result = registry.create(1, &keys, &empty_store, None);
    assert!(matches!(result, Err(MultisigError::DegenerateOwnership(_))));

    // Everything local: no shared custody.
    let full_store = store_with(&[k1, k2]);
    let result = registry.create(1, &keys, &full_store, None);
    assert!(matches!(result, Err(MultisigError::DegenerateOwnership(_))));
}

#[test]
fn import_registers_matching_script() {
    setup();
    let (k1, k2, k3) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);
    let hexes = [public_hex(&k1), public_hex(&k2), public_hex(&k3)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();
    let created = registry.create(2, &keys, &store, None).unwrap();

    let mut other = RedeemScriptRegistry::new(NETWORK);
    let imported = other
        .import_address(
            &created.address.to_string(),
            created.redeem_script.as_bytes(),
        )
        .unwrap();

    assert_eq!(imported, created);
    assert!(other.get(&created.script_hash).is_some());
}

#[test]
fn import_rejects_mismatched_address() {
    setup();
    let (k1, k2, k3) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);
    let hexes = [public_hex(&k1), public_hex(&k2), public_hex(&k3)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();
    let created = registry.create(2, &keys, &store, None).unwrap();

    // Same address claim, different script: the 1-of-3 variant.
    let other_script = build_multisig_script(
        1,
        &[public_key(&k1), public_key(&k2), public_key(&k3)],
    );

    let mut other = RedeemScriptRegistry::new(NETWORK);
    let result = other.import_address(&created.address.to_string(), other_script.as_bytes());
    assert!(matches!(result, Err(MultisigError::AddressMismatch { .. })));
    // Nothing may be registered after a rejected import.
    assert!(other.is_empty());
}

#[test]
fn import_rejects_non_multisig_script() {
    setup();
    let (k1, _, _) = three_secrets();

    // A P2PKH script wrapped in P2SH: the hash matches the claim but the
    // inner script is not a multisig pattern.
    let inner = Address::p2pkh(&public_key(&k1), NETWORK).script_pubkey();
    let claimed = Address::p2sh(&inner, NETWORK).unwrap();

    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let result = registry.import_address(&claimed.to_string(), inner.as_bytes());
    assert!(matches!(result, Err(MultisigError::NonStandardScript(_))));
    assert!(registry.is_empty());
}

#[test]
fn multisig_pattern_round_trips() {
    setup();
    let (k1, k2, k3) = three_secrets();
    let keys = vec![public_key(&k1), public_key(&k2), public_key(&k3)];

    let script = build_multisig_script(2, &keys);
    let (required, parsed) = parse_multisig_script(&script).expect("pattern parses");
    assert_eq!(required, 2);
    assert_eq!(parsed, keys);
}

#[test]
fn labels_follow_script_hash() {
    setup();
    let (k1, k2, _) = three_secrets();
    let mut registry = RedeemScriptRegistry::new(NETWORK);
    let store = store_with(&[k1]);
    let hexes = [public_hex(&k1), public_hex(&k2)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();

    let address = registry.create(2, &keys, &store, Some("escrow")).unwrap();
    assert_eq!(registry.label(&address.script_hash), Some("escrow"));

    registry.set_label(address.script_hash, "escrow-2024".to_string());
    assert_eq!(registry.label(&address.script_hash), Some("escrow-2024"));
}
