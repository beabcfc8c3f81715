
use bitcoin::Amount;
use covault_core::signing::InputStatus;
use covault_core::{
    DraftCodec, FundingSet, MemoryCoinView, MultisigAddress, Recipient, RedeemScriptRegistry,
    SignatureCombiner, TransactionBuilder,
};
use test_helpers::*;

/// Two co-signing wallets sharing one 2-of-3 address
struct TwoSigners {
    registry1: RedeemScriptRegistry,
    registry2: RedeemScriptRegistry,
    store1: covault_core::MemoryKeyStore,
    store2: covault_core::MemoryKeyStore,
    address: MultisigAddress,
    view: MemoryCoinView,
    funding: FundingSet,
}

fn two_signers(funded_sats: u64) -> TwoSigners {
    let (k1, k2, _) = three_secrets();
    let k3 = random_secret(); // nobody in the test holds this one

    let store1 = store_with(&[k1]);
    let store2 = store_with(&[k2]);
    let hexes = [public_hex(&k1), public_hex(&k2), public_hex(&k3)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();

    let mut registry1 = RedeemScriptRegistry::new(NETWORK);
    let address = registry1.create(2, &keys, &store1, None).unwrap();
    let mut registry2 = RedeemScriptRegistry::new(NETWORK);
    let address2 = registry2.create(2, &keys, &store2, None).unwrap();
    assert_eq!(address, address2);

    let mut view = MemoryCoinView::new();
    fund_address(&mut view, &address, 0xe1, 0, funded_sats, 6);
    use covault_core::CoinView;
    let funding = FundingSet::new(view.unspent());

    TwoSigners {
        registry1,
        registry2,
        store1,
        store2,
        address,
        view,
        funding,
    }
}

fn draft_paying(fx: &TwoSigners, sats: u64) -> bitcoin::Transaction {
    let recipients = vec![Recipient::new(payment_address(), Amount::from_sat(sats)).unwrap()];
    TransactionBuilder::new()
        .build(&recipients, &fx.funding, &fx.address)
        .unwrap()
}

#[test]
fn single_signer_leaves_draft_partial() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    let outcome = combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();

    assert_eq!(outcome.statuses, vec![InputStatus::PartiallySatisfied]);
    assert!(!outcome.is_complete());
    assert!(!combiner.is_complete(&draft, &fx.view));
    // The slot now carries one signature and the redeem script.
    assert!(!draft.input[0].script_sig.is_empty());
}

#[test]
fn export_import_resign_completes() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();

    // Machine boundary: hex out, hex in.
    let exported = DraftCodec::encode(&draft);
    let mut imported = DraftCodec::decode(&exported).unwrap();

    let outcome = combiner
        .sign(&mut imported, &fx.registry2, &fx.store2, &fx.view)
        .unwrap();

    assert_eq!(outcome.statuses, vec![InputStatus::Satisfied]);
    assert!(outcome.is_complete());
    assert!(combiner.is_complete(&imported, &fx.view));
}

#[test]
fn merge_order_does_not_matter() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    // Second participant signs first this time.
    let combiner = SignatureCombiner::new();
    combiner
        .sign(&mut draft, &fx.registry2, &fx.store2, &fx.view)
        .unwrap();
    let mut imported = DraftCodec::decode(&DraftCodec::encode(&draft)).unwrap();
    let outcome = combiner
        .sign(&mut imported, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();

    assert!(outcome.is_complete());
    assert!(combiner.is_complete(&imported, &fx.view));
}

#[test]
fn resigning_with_same_key_stays_partial() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();
    let first_slot = draft.input[0].script_sig.clone();

    // A second pass with the same key merges with itself and changes
    // nothing.
    let outcome = combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();
    assert_eq!(outcome.statuses, vec![InputStatus::PartiallySatisfied]);
    assert_eq!(draft.input[0].script_sig, first_slot);
}

#[test]
fn existing_signature_survives_merge() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();
    let after_first = draft.input[0].script_sig.clone();

    combiner
        .sign(&mut draft, &fx.registry2, &fx.store2, &fx.view)
        .unwrap();

    // The first signer's work must still be embedded in the final slot.
    let first_bytes = after_first.as_bytes();
    let sig_push = &first_bytes[1..first_bytes.len() - 107]; // skip OP_0, drop redeem push
    let final_bytes = draft.input[0].script_sig.as_bytes();
    assert!(final_bytes
        .windows(sig_push.len())
        .any(|w| w == sig_push));
}

#[test]
fn multi_input_drafts_track_inputs_independently() {
    setup();
    let mut fx = two_signers(4_000_000);
    fund_address(&mut fx.view, &fx.address, 0xe2, 1, 6_000_000, 6);
    use covault_core::CoinView;
    fx.funding = FundingSet::new(fx.view.unspent());

    let mut draft = draft_paying(&fx, 8_000_000);
    assert_eq!(draft.input.len(), 2);

    let combiner = SignatureCombiner::new();
    let outcome = combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();
    assert_eq!(
        outcome.statuses,
        vec![
            InputStatus::PartiallySatisfied,
            InputStatus::PartiallySatisfied
        ]
    );

    let outcome = combiner
        .sign(&mut draft, &fx.registry2, &fx.store2, &fx.view)
        .unwrap();
    assert_eq!(
        outcome.statuses,
        vec![InputStatus::Satisfied, InputStatus::Satisfied]
    );
    assert!(combiner.is_complete(&draft, &fx.view));
}

#[test]
fn tampered_output_invalidates_signatures() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    combiner
        .sign(&mut draft, &fx.registry1, &fx.store1, &fx.view)
        .unwrap();
    combiner
        .sign(&mut draft, &fx.registry2, &fx.store2, &fx.view)
        .unwrap();
    assert!(combiner.is_complete(&draft, &fx.view));

    // Redirect value after signing; completeness must collapse.
    draft.output[0].value += 1;
    assert!(!combiner.is_complete(&draft, &fx.view));
}

#[test]
fn signing_unknown_prevout_fails_cleanly() {
    setup();
    let fx = two_signers(10_000_000);
    let mut draft = draft_paying(&fx, 5_000_000);

    let empty_view = MemoryCoinView::new();
    let combiner = SignatureCombiner::new();
    let result = combiner.sign(&mut draft, &fx.registry1, &fx.store1, &empty_view);
    assert!(matches!(
        result,
        Err(covault_core::MultisigError::MalformedTransaction(_))
    ));
}

#[test]
fn unsigned_draft_reports_unsigned_inputs() {
    setup();
    let fx = two_signers(10_000_000);
    let draft = draft_paying(&fx, 5_000_000);

    let combiner = SignatureCombiner::new();
    let prev = fx.address.script_pubkey();
    assert_eq!(
        combiner.input_status(&draft, 0, &prev),
        InputStatus::Unsigned
    );
    assert!(!combiner.is_complete(&draft, &fx.view));
}
