use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use ledger_core::{
    generate_keypair, public_key_hex, CancelToken, Ledger, LedgerError, TicketPayload,
    TicketStatus, Timestamp, Transaction, TransactionType,
};

fn signed(kind: TransactionType, sk: &SigningKey, payload: TicketPayload) -> Transaction {
    Transaction::signed(kind, payload, sk).unwrap()
}

#[test]
fn short_ticket_expires_without_new_transaction() {
    let ledger = Ledger::new(1);
    let (pk, sk) = generate_keypair();
    let id = public_key_hex(&pk);

    ledger
        .submit_transaction(signed(
            TransactionType::Mint,
            &sk,
            TicketPayload::new(Timestamp::now()).with_duration(10),
        ))
        .unwrap();
    ledger.seal_pending_transactions(&CancelToken::new()).unwrap();

    let activated_at = Timestamp::now();
    ledger
        .submit_transaction(signed(TransactionType::Activate, &sk, TicketPayload::new(activated_at)))
        .unwrap();
    ledger.seal_pending_transactions(&CancelToken::new()).unwrap();

    assert_eq!(ledger.get_status_at(&id, activated_at), TicketStatus::Active);

    let height = ledger.height();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ledger.get_status(&id), TicketStatus::Expired);
    assert_eq!(ledger.height(), height);
    assert_eq!(ledger.pending_len(), 0);
}

#[test]
fn alice_journey_with_theft_attempt() {
    let ledger = Ledger::new(1);
    let (alice, alice_sk) = generate_keypair();
    let alice_id = public_key_hex(&alice);
    let cancel = CancelToken::new();

    ledger
        .submit_transaction(signed(
            TransactionType::Mint,
            &alice_sk,
            TicketPayload::new(Timestamp::now()).with_price("5.00 CHF"),
        ))
        .unwrap();
    ledger.seal_pending_transactions(&cancel).unwrap();
    assert_eq!(ledger.get_status(&alice_id), TicketStatus::Issued);

    ledger
        .submit_transaction(signed(
            TransactionType::Activate,
            &alice_sk,
            TicketPayload::new(Timestamp::now()).with_location("Bern"),
        ))
        .unwrap();
    ledger.seal_pending_transactions(&cancel).unwrap();
    assert_eq!(ledger.get_status(&alice_id), TicketStatus::Active);

    ledger
        .submit_transaction(signed(
            TransactionType::Inspect,
            &alice_sk,
            TicketPayload::new(Timestamp::now()).with_device_id("POLICE_SCANNER"),
        ))
        .unwrap();
    ledger.seal_pending_transactions(&cancel).unwrap();
    assert_eq!(ledger.get_status(&alice_id), TicketStatus::Active);

    let (_, mallory_sk) = generate_keypair();
    let mut hack = signed(
        TransactionType::Activate,
        &mallory_sk,
        TicketPayload::new(Timestamp::now()).with_location("Zurich"),
    );
    hack.ticket_id = alice_id.clone();
    assert!(matches!(
        ledger.submit_transaction(hack),
        Err(LedgerError::Authentication { .. })
    ));

    assert!(matches!(
        ledger.submit_transaction(signed(
            TransactionType::Activate,
            &alice_sk,
            TicketPayload::new(Timestamp::now()).with_location("Geneva"),
        )),
        Err(LedgerError::State { .. })
    ));

    assert_eq!(ledger.height(), 4);
    assert!(ledger.validate().is_ok());
}

#[test]
fn concurrent_double_activation_admits_exactly_one() {
    let ledger = Arc::new(Ledger::new(1));
    let (_, sk) = generate_keypair();
    ledger
        .submit_transaction(signed(TransactionType::Mint, &sk, TicketPayload::new(Timestamp::now())))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = ledger.clone();
            let sk = sk.clone();
            thread::spawn(move || {
                let payload = TicketPayload::new(Timestamp::now()).with_location(format!("gate-{i}"));
                ledger.submit_transaction(signed(TransactionType::Activate, &sk, payload))
            })
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(ledger.pending_len(), 2);
}

#[test]
fn cancelled_seal_keeps_mempool() {
    let ledger = Ledger::new(64);
    let (_, sk) = generate_keypair();
    ledger
        .submit_transaction(signed(TransactionType::Mint, &sk, TicketPayload::new(Timestamp::now())))
        .unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    assert_eq!(
        ledger.seal_pending_transactions(&cancel).unwrap_err(),
        LedgerError::SealCancelled
    );
    assert_eq!(ledger.pending_len(), 1);
    assert_eq!(ledger.height(), 1);
}

#[test]
fn cancel_from_another_thread_stops_long_seal() {
    let ledger = Arc::new(Ledger::new(64));
    let (_, sk) = generate_keypair();
    ledger
        .submit_transaction(signed(TransactionType::Mint, &sk, TicketPayload::new(Timestamp::now())))
        .unwrap();

    let cancel = CancelToken::new();
    let worker = {
        let ledger = ledger.clone();
        let cancel = cancel.clone();
        thread::spawn(move || ledger.seal_pending_transactions(&cancel))
    };

    thread::sleep(Duration::from_millis(50));
    // The chain lock is free while the search runs.
    let (_, other) = generate_keypair();
    ledger
        .submit_transaction(signed(TransactionType::Mint, &other, TicketPayload::new(Timestamp::now())))
        .unwrap();
    cancel.cancel();

    assert_eq!(worker.join().unwrap().unwrap_err(), LedgerError::SealCancelled);
    assert_eq!(ledger.pending_len(), 2);
}

#[test]
fn hydrate_and_continue() {
    let ledger = Ledger::new(1);
    let (pk, sk) = generate_keypair();
    ledger
        .submit_transaction(signed(TransactionType::Mint, &sk, TicketPayload::new(Timestamp::now())))
        .unwrap();
    ledger.seal_pending_transactions(&CancelToken::new()).unwrap();

    let blocks = ledger.blocks_since(0);
    let restored = Ledger::from_blocks(blocks, 1).unwrap();
    assert_eq!(restored.get_status(&public_key_hex(&pk)), TicketStatus::Issued);
    assert_eq!(restored.blocks_since(1).len(), 1);

    let snap = restored.get_chain_snapshot();
    assert_eq!(snap.height, 2);
    assert!(snap.pending.is_empty());
}

#[test]
fn seal_transaction_reuses_block_that_already_holds_it() {
    let ledger = Ledger::new(1);
    let (_, a) = generate_keypair();
    let (_, b) = generate_keypair();
    let first = signed(TransactionType::Mint, &a, TicketPayload::new(Timestamp::now()));
    let second = signed(TransactionType::Mint, &b, TicketPayload::new(Timestamp::now()));
    let (first_id, second_id) = (first.id.clone(), second.id.clone());
    ledger.submit_transaction(first).unwrap();
    ledger.submit_transaction(second).unwrap();

    let cancel = CancelToken::new();
    let block = ledger.seal_transaction(&first_id, &cancel).unwrap();
    assert_eq!(block.transactions.len(), 2);

    let again = ledger.seal_transaction(&second_id, &cancel).unwrap();
    assert_eq!(again.index, block.index);
    assert_eq!(ledger.height(), 2);
}
