mod common;

use std::sync::Arc;

use allyd_ledger::{
    Executor, Mempool, MempoolErrorKind, RejectKind, StateView, TxBuilder,
};
use allyd_primitives::{Id, OutputOwners, ShortId, Tx, UtxoId};

use common::{node, Fixture, GENESIS_TIME};

fn genesis_utxo() -> UtxoId {
    UtxoId::new(Id([0xaa; 32]), 0)
}

fn create_allychain(fixture: &Fixture, state: &dyn StateView, owner: OutputOwners) -> Arc<Tx> {
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, state);
    Arc::new(builder.new_create_allychain_tx(owner).expect("create allychain"))
}

#[test]
fn admits_a_valid_tx_once() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let mut mempool = Mempool::new(0);
    let tx = create_allychain(&fixture, fixture.chain.as_ref(), fixture.owner());

    mempool
        .add_unverified_tx(Arc::clone(&tx), &executor, &fixture.parent())
        .expect("admit");
    assert!(mempool.contains(&tx.id()));
    assert_eq!(mempool.len(), 1);
    assert_eq!(mempool.bytes(), tx.bytes().len());
    assert_eq!(mempool.spender(&genesis_utxo()), Some(tx.id()));
    assert!(mempool.has_decisions());
    assert!(!mempool.has_proposals());
    let revision = mempool.revision();

    let err = mempool
        .add_unverified_tx(Arc::clone(&tx), &executor, &fixture.parent())
        .expect_err("second add");
    assert_eq!(err.kind, MempoolErrorKind::AlreadyInMempool);
    assert_eq!(mempool.len(), 1);
    assert_eq!(mempool.revision(), revision);
}

#[test]
fn rejects_a_second_spender_of_the_same_input() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let mut mempool = Mempool::new(0);
    let first = create_allychain(&fixture, fixture.chain.as_ref(), fixture.owner());
    let second = create_allychain(
        &fixture,
        fixture.chain.as_ref(),
        OutputOwners::single(ShortId([9; 20])),
    );
    assert_ne!(first.id(), second.id());

    mempool
        .add_unverified_tx(Arc::clone(&first), &executor, &fixture.parent())
        .expect("first");
    let err = mempool
        .add_unverified_tx(Arc::clone(&second), &executor, &fixture.parent())
        .expect_err("conflict");
    assert_eq!(err.kind, MempoolErrorKind::ConflictingInput);
    assert!(!mempool.contains(&second.id()));
    assert!(mempool.drop_reason(&second.id()).is_none());

    mempool.remove(&first.id()).expect("remove first");
    assert!(mempool.spender(&genesis_utxo()).is_none());
    mempool
        .add_unverified_tx(Arc::clone(&second), &executor, &fixture.parent())
        .expect("second after first removed");
}

#[test]
fn drops_an_invalid_tx_and_keeps_the_reason() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let mut mempool = Mempool::new(0);
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = Arc::new(
        builder
            .new_add_validator_tx(2_000, GENESIS_TIME, 2_000, node(2), fixture.owner(), 20_000)
            .expect("build"),
    );

    let err = mempool
        .add_unverified_tx(Arc::clone(&tx), &executor, &fixture.parent())
        .expect_err("starts at chain time");
    assert_eq!(
        err.kind,
        MempoolErrorKind::Invalid(RejectKind::StakingPeriod)
    );
    assert!(!mempool.contains(&tx.id()));
    assert!(mempool.spender(&genesis_utxo()).is_none());
    let reason = mempool.drop_reason(&tx.id()).expect("reason");
    assert_eq!(reason, err.message);
}

#[test]
fn pops_proposals_soonest_first() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let mut mempool = Mempool::new(0);
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());

    let late = Arc::new(
        builder
            .new_add_validator_tx(2_000, 3_000, 5_000, node(2), fixture.owner(), 20_000)
            .expect("late"),
    );
    mempool
        .add_unverified_tx(Arc::clone(&late), &executor, &fixture.parent())
        .expect("admit late");

    // Built on top of `late` so the two spend different inputs.
    let outcome = executor
        .execute_proposal(&late, &fixture.parent())
        .expect("execute late");
    let after_late: Arc<dyn StateView> = Arc::new(outcome.on_commit);
    let stacked = TxBuilder::new(&fixture.params, &fixture.keychain, after_late.as_ref());
    let early = Arc::new(
        stacked
            .new_add_validator_tx(2_000, 2_000, 4_000, node(3), fixture.owner(), 20_000)
            .expect("early"),
    );
    mempool
        .add_unverified_tx(Arc::clone(&early), &executor, &after_late)
        .expect("admit early");

    let advance = Arc::new(builder.new_advance_time_tx(GENESIS_TIME + 5).expect("advance"));
    mempool
        .add_unverified_tx(Arc::clone(&advance), &executor, &fixture.parent())
        .expect("admit advance");
    assert_eq!(mempool.len(), 3);
    assert!(!mempool.has_decisions());

    let popped: Vec<Id> = std::iter::from_fn(|| mempool.pop_proposal())
        .map(|tx| tx.id())
        .collect();
    assert_eq!(popped, vec![advance.id(), early.id(), late.id()]);
    assert!(mempool.is_empty());
    assert_eq!(mempool.bytes(), 0);
}

#[test]
fn pops_decisions_in_arrival_order() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let mut mempool = Mempool::new(0);

    let first = create_allychain(&fixture, fixture.chain.as_ref(), fixture.owner());
    let executed = executor
        .execute_decision(&first, &fixture.parent())
        .expect("execute first");
    let after_first: Arc<dyn StateView> = Arc::new(executed.state);
    let second = create_allychain(&fixture, after_first.as_ref(), fixture.owner());

    mempool
        .add_unverified_tx(Arc::clone(&first), &executor, &fixture.parent())
        .expect("first");
    mempool
        .add_unverified_tx(Arc::clone(&second), &executor, &after_first)
        .expect("second");

    let popped = mempool.pop_decisions(1);
    assert_eq!(popped.len(), 1);
    assert_eq!(popped[0].id(), first.id());
    let popped = mempool.pop_decisions(5);
    assert_eq!(popped.len(), 1);
    assert_eq!(popped[0].id(), second.id());
    assert!(mempool.pop_decisions(5).is_empty());
    assert!(mempool.is_empty());
}

#[test]
fn refuses_txs_past_the_byte_limit() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let first = create_allychain(&fixture, fixture.chain.as_ref(), fixture.owner());
    let executed = executor
        .execute_decision(&first, &fixture.parent())
        .expect("execute first");
    let after_first: Arc<dyn StateView> = Arc::new(executed.state);
    let second = create_allychain(&fixture, after_first.as_ref(), fixture.owner());

    let mut mempool = Mempool::new(first.bytes().len());
    mempool
        .add_unverified_tx(Arc::clone(&first), &executor, &fixture.parent())
        .expect("fits");
    let err = mempool
        .add_unverified_tx(second, &executor, &after_first)
        .expect_err("full");
    assert_eq!(err.kind, MempoolErrorKind::MempoolFull);
    assert_eq!(mempool.len(), 1);
}
