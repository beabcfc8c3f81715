
use bitcoin::Amount;
use covault_core::{
    KnownLocation, MemoryChainIndex, MemoryCoinView, MemoryKeyStore, MultisigError, MultisigEvent,
    MemoryTxPool, MultisigWorkflow, Recipient, SessionState, Submission,
};
use test_helpers::*;

/// Two wallets, each holding one key of a shared 2-of-3 address, with the
/// same funded coin in view
struct TwoWallets {
    wf1: MultisigWorkflow,
    wf2: MultisigWorkflow,
    store1: MemoryKeyStore,
    store2: MemoryKeyStore,
    view1: MemoryCoinView,
    view2: MemoryCoinView,
    address: covault_core::MultisigAddress,
}

fn two_wallets() -> TwoWallets {
    let (k1, k2, _) = three_secrets();
    let k3 = random_secret();
    let store1 = store_with(&[k1]);
    let store2 = store_with(&[k2]);
    let hexes = [public_hex(&k1), public_hex(&k2), public_hex(&k3)];
    let keys: Vec<&str> = hexes.iter().map(|s| s.as_str()).collect();

    let mut wf1 = MultisigWorkflow::new(NETWORK);
    let address = wf1.create_address(2, &keys, &store1, Some("shared")).unwrap();
    let mut wf2 = MultisigWorkflow::new(NETWORK);
    wf2.create_address(2, &keys, &store2, None).unwrap();

    let mut view1 = MemoryCoinView::new();
    fund_address(&mut view1, &address, 0xaa, 0, 1_000_000_000, 10);
    let mut view2 = MemoryCoinView::new();
    fund_address(&mut view2, &address, 0xaa, 0, 1_000_000_000, 10);

    TwoWallets {
        wf1,
        wf2,
        store1,
        store2,
        view1,
        view2,
        address,
    }
}

#[test]
fn full_two_signer_round_trip_broadcasts_once() {
    setup();
    let mut w = two_wallets();
    let events = w.wf2.bus().subscribe_all();

    // First signer builds, signs and exports.
    let recipients =
        vec![Recipient::new(payment_address(), Amount::from_sat(500_000_000)).unwrap()];
    w.wf1
        .start_draft(&w.address, &recipients, &w.view1)
        .unwrap();
    let outcome = w.wf1.sign(&w.store1, &w.view1).unwrap();
    assert!(!outcome.is_complete());
    assert_eq!(
        w.wf1.session().unwrap().state(),
        SessionState::PartiallySigned
    );
    let exported = w.wf1.export_draft().unwrap();

    // Second signer imports, signs, completes.
    w.wf2.import_draft(&exported, &w.view2).unwrap();
    assert_eq!(
        w.wf2.session().unwrap().state(),
        SessionState::PartiallySigned
    );
    let outcome = w.wf2.sign(&w.store2, &w.view2).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(w.wf2.session().unwrap().state(), SessionState::Complete);

    // Admission: first call broadcasts, second no-ops.
    let chain = MemoryChainIndex::new();
    let mut pool = MemoryTxPool::new();
    let submission = w.wf2.submit(&w.view2, &chain, &mut pool).unwrap();
    let txid = match submission {
        Submission::Broadcast { txid } => txid,
        other => panic!("expected broadcast, got {:?}", other),
    };
    assert!(pool.get(&txid).is_some());
    assert_eq!(w.wf2.session().unwrap().state(), SessionState::Broadcast);

    let second = w.wf2.submit(&w.view2, &chain, &mut pool).unwrap();
    assert_eq!(
        second,
        Submission::AlreadyKnown {
            txid,
            location: KnownLocation::Pool,
        }
    );
    assert_eq!(w.wf2.session().unwrap().state(), SessionState::Broadcast);
    assert_eq!(pool.len(), 1);

    // The reservation must have been released exactly once along the way,
    // and exactly one broadcast event observed.
    let received: Vec<MultisigEvent> = events.try_iter().collect();
    let released = received
        .iter()
        .filter(|e| matches!(e, MultisigEvent::CoinsReleased { .. }))
        .count();
    assert_eq!(released, 1);
    let broadcasts = received
        .iter()
        .filter(|e| matches!(e, MultisigEvent::Broadcast { .. }))
        .count();
    assert_eq!(broadcasts, 1);
    let skipped = received
        .iter()
        .filter(|e| matches!(e, MultisigEvent::BroadcastSkipped { .. }))
        .count();
    assert_eq!(skipped, 1);
}

#[test]
fn submit_rejects_incomplete_draft() {
    setup();
    let mut w = two_wallets();

    let recipients =
        vec![Recipient::new(payment_address(), Amount::from_sat(100_000_000)).unwrap()];
    w.wf1
        .start_draft(&w.address, &recipients, &w.view1)
        .unwrap();
    w.wf1.sign(&w.store1, &w.view1).unwrap();

    let chain = MemoryChainIndex::new();
    let mut pool = MemoryTxPool::new();
    let result = w.wf1.submit(&w.view1, &chain, &mut pool);
    assert!(matches!(result, Err(MultisigError::NotComplete)));
    assert!(pool.is_empty());
    // The session is left as it was for another signing round.
    assert_eq!(
        w.wf1.session().unwrap().state(),
        SessionState::PartiallySigned
    );
}

#[test]
fn chain_confirmed_transaction_is_not_resubmitted() {
    setup();
    let mut w = two_wallets();

    let recipients =
        vec![Recipient::new(payment_address(), Amount::from_sat(100_000_000)).unwrap()];
    w.wf1
        .start_draft(&w.address, &recipients, &w.view1)
        .unwrap();
    w.wf1.sign(&w.store1, &w.view1).unwrap();
    let exported = w.wf1.export_draft().unwrap();
    w.wf2.import_draft(&exported, &w.view2).unwrap();
    w.wf2.sign(&w.store2, &w.view2).unwrap();

    let txid = w.wf2.session().unwrap().draft().txid();
    let mut chain = MemoryChainIndex::new();
    chain.confirm(txid);
    let mut pool = MemoryTxPool::new();

    let submission = w.wf2.submit(&w.view2, &chain, &mut pool).unwrap();
    assert_eq!(
        submission,
        Submission::AlreadyKnown {
            txid,
            location: KnownLocation::Chain,
        }
    );
    assert!(pool.is_empty());
}

#[test]
fn clear_releases_reservations_for_a_new_draft() {
    setup();
    let mut w = two_wallets();

    let recipients =
        vec![Recipient::new(payment_address(), Amount::from_sat(100_000_000)).unwrap()];
    w.wf1
        .start_draft(&w.address, &recipients, &w.view1)
        .unwrap();
    w.wf1.clear();
    assert!(w.wf1.session().is_none());

    // Starting over finds the coin free again.
    w.wf1
        .start_draft(&w.address, &recipients, &w.view1)
        .unwrap();
    assert_eq!(w.wf1.session().unwrap().funding().len(), 1);
}

#[test]
fn address_exchange_feeds_a_watching_wallet() {
    setup();
    let w = two_wallets();

    // A third wallet learns the address out-of-band and verifies it.
    let record = w.wf1.export_address(&w.address);
    let mut wf3 = MultisigWorkflow::new(NETWORK);
    let imported = wf3.import_address_record(&record).unwrap();
    assert_eq!(imported, w.address);

    // But a tampered record must not register anything.
    let tampered = record.replace(
        &w.address.redeem_script.to_hex_string(),
        &w.address.script_pubkey().to_hex_string(),
    );
    let mut wf4 = MultisigWorkflow::new(NETWORK);
    assert!(wf4.import_address_record(&tampered).is_err());
    assert!(wf4.registry().is_empty());
}

#[test]
fn workflow_lists_shared_addresses() {
    setup();
    let w = two_wallets();
    let shared = w.wf1.shared_addresses(&w.store1);
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].address, w.address.address);

    // A store with no matching keys sees nothing to co-sign.
    let unrelated = store_with(&[random_secret()]);
    assert!(w.wf1.shared_addresses(&unrelated).is_empty());

    assert_eq!(
        w.wf1.address_balance(&w.address, &w.view1),
        Amount::from_sat(1_000_000_000)
    );
}
