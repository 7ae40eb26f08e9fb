mod common;

use std::sync::Arc;

use allyd_ledger::{
    BuildError, ExecutionError, Executor, ProposalOutcome, RejectKind, StateView, TxBuilder,
};
use allyd_primitives::{Id, OutputOwners, ShortId, Tx, UnsignedTx};

use common::{node, Fixture, GENESIS_BALANCE, GENESIS_TIME, GENESIS_VALIDATOR_END};

fn add_validator(fixture: &Fixture, node_byte: u8, start: u64, end: u64) -> Arc<Tx> {
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = builder
        .new_add_validator_tx(
            2_000,
            start,
            end,
            node(node_byte),
            fixture.owner(),
            fixture.params.min_nomination_fee,
        )
        .expect("build validator");
    Arc::new(tx)
}

fn add_nominator(fixture: &Fixture, node_byte: u8, weight: u64, start: u64, end: u64) -> Arc<Tx> {
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = builder
        .new_add_nominator_tx(weight, start, end, node(node_byte), fixture.owner())
        .expect("build nominator");
    Arc::new(tx)
}

fn rejection(result: Result<ProposalOutcome, ExecutionError>) -> ExecutionError {
    result.err().expect("rejected")
}

#[test]
fn add_validator_pays_fee_and_schedules_staker() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let tx = add_validator(&fixture, 2, 2_000, 3_000);

    let outcome = executor
        .execute_proposal(&tx, &fixture.parent())
        .expect("execute");

    assert_eq!(fixture.utxo_amounts(&outcome.on_commit), vec![47_990]);
    let UnsignedTx::AddValidator(unsigned) = &tx.unsigned else {
        panic!("not an add-validator tx");
    };
    let staked: u64 = unsigned.stake.iter().map(|output| output.amount()).sum();
    assert_eq!(staked, 2_000);
    assert_eq!(unsigned.stake[0].output.owners(), &fixture.owner());

    let pending = outcome.on_commit.pending_stakers();
    assert_eq!(pending.len(), 1);
    let scheduled = pending.validator(&node(2)).expect("pending validator");
    assert_eq!(scheduled.tx_id(), tx.id());

    assert_eq!(
        fixture.utxo_amounts(&outcome.on_abort),
        vec![47_990, 2_000]
    );
    assert!(outcome.on_abort.pending_stakers().is_empty());
    assert!(outcome.prefers_commit);

    assert_eq!(fixture.balance(fixture.chain.as_ref()), GENESIS_BALANCE);
}

#[test]
fn execution_is_deterministic() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let tx = add_validator(&fixture, 2, 2_000, 3_000);

    let first = executor.execute_proposal(&tx, &fixture.parent()).expect("first");
    let second = executor.execute_proposal(&tx, &fixture.parent()).expect("second");
    assert_eq!(first.on_commit.encode_changes(), second.on_commit.encode_changes());
    assert_eq!(first.on_abort.encode_changes(), second.on_abort.encode_changes());
    assert_ne!(first.on_commit.encode_changes(), first.on_abort.encode_changes());
}

#[test]
fn rejects_second_validator_for_node() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let tx = add_validator(&fixture, 1, 2_000, 3_000);

    let err = rejection(executor.execute_proposal(&tx, &fixture.parent()));
    assert!(matches!(err, ExecutionError::AlreadyValidator(_)));
    assert_eq!(err.kind(), RejectKind::Duplicate);
}

#[test]
fn start_time_bounds_are_checked() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);

    let past = add_validator(&fixture, 2, GENESIS_TIME, GENESIS_TIME + 500);
    let err = rejection(executor.execute_proposal(&past, &fixture.parent()));
    assert!(matches!(err, ExecutionError::StartsBeforeChainTime { .. }));
    assert_eq!(err.kind(), RejectKind::StakingPeriod);

    let latest = GENESIS_TIME + fixture.params.max_future_start_time;
    executor
        .execute_proposal(&add_validator(&fixture, 2, latest, latest + 500), &fixture.parent())
        .expect("latest start accepted");
    let late = add_validator(&fixture, 2, latest + 1, latest + 500);
    let err = rejection(executor.execute_proposal(&late, &fixture.parent()));
    assert!(matches!(err, ExecutionError::StartsTooFarInFuture { .. }));
}

#[test]
fn duration_bounds_are_checked() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let short = add_validator(&fixture, 2, 2_000, 2_099);
    let err = rejection(executor.execute_proposal(&short, &fixture.parent()));
    assert!(matches!(err, ExecutionError::DurationTooShort { .. }));
}

#[test]
fn nominator_up_to_the_cap_is_accepted() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);

    // Genesis validator weight 2,000; cap is five times that.
    let at_cap = add_nominator(&fixture, 1, 8_000, 2_000, 3_000);
    let outcome = executor
        .execute_proposal(&at_cap, &fixture.parent())
        .expect("exactly at cap");
    assert_eq!(outcome.on_commit.pending_stakers().nominators(&node(1)).len(), 1);

    let over = add_nominator(&fixture, 1, 8_001, 2_000, 3_000);
    let err = rejection(executor.execute_proposal(&over, &fixture.parent()));
    assert!(matches!(err, ExecutionError::OverDelegated { maximum: 10_000, .. }));
    assert_eq!(err.kind(), RejectKind::OverDelegated);
}

#[test]
fn cap_counts_pending_nominators_in_window() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);

    let first = add_nominator(&fixture, 1, 5_000, 2_000, 3_000);
    let outcome = executor
        .execute_proposal(&first, &fixture.parent())
        .expect("first nominator");
    outcome.on_commit.apply(&fixture.chain).expect("apply");

    let overlapping = add_nominator(&fixture, 1, 3_001, 2_500, 3_500);
    let err = rejection(executor.execute_proposal(&overlapping, &fixture.parent()));
    assert!(matches!(err, ExecutionError::OverDelegated { .. }));

    let after = add_nominator(&fixture, 1, 8_000, 3_000, 4_000);
    executor
        .execute_proposal(&after, &fixture.parent())
        .expect("starts as the first one leaves");
}

#[test]
fn nomination_must_fit_the_validation_period() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let outcome = executor
        .execute_proposal(&add_validator(&fixture, 2, 2_000, 5_000), &fixture.parent())
        .expect("validator");
    outcome.on_commit.apply(&fixture.chain).expect("apply");

    let same_period = add_nominator(&fixture, 2, 100, 2_000, 5_000);
    executor
        .execute_proposal(&same_period, &fixture.parent())
        .expect("same period accepted");

    let one_past = add_nominator(&fixture, 2, 100, 2_000, 5_001);
    let err = rejection(executor.execute_proposal(&one_past, &fixture.parent()));
    assert!(matches!(err, ExecutionError::NotValidatorSubset(_)));
    assert_eq!(err.kind(), RejectKind::StakingPeriod);

    let unknown = add_nominator(&fixture, 9, 100, 2_000, 3_000);
    let err = rejection(executor.execute_proposal(&unknown, &fixture.parent()));
    assert!(matches!(err, ExecutionError::NotValidatorSubset(_)));
}

#[test]
fn tampered_credentials_are_rejected() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let tx = add_validator(&fixture, 2, 2_000, 3_000);
    let mut creds = tx.creds.clone();
    creds[0].signatures[0][5] ^= 0x01;
    let forged = Arc::new(Tx::new(tx.unsigned.clone(), creds));

    let err = rejection(executor.execute_proposal(&forged, &fixture.parent()));
    assert_eq!(err.kind(), RejectKind::InsufficientAuthorization);
}

#[test]
fn accepted_tx_is_not_executed_twice() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let tx = add_validator(&fixture, 2, 2_000, 3_000);
    let outcome = executor.execute_proposal(&tx, &fixture.parent()).expect("execute");
    outcome.on_abort.apply(&fixture.chain).expect("apply abort");

    let err = rejection(executor.execute_proposal(&tx, &fixture.parent()));
    assert!(matches!(err, ExecutionError::DuplicateTx(_)));
}

#[test]
fn decision_kind_is_not_a_proposal() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = Arc::new(builder.new_create_allychain_tx(fixture.owner()).expect("build"));

    let err = rejection(executor.execute_proposal(&tx, &fixture.parent()));
    assert_eq!(err.kind(), RejectKind::UnknownType);
    executor.semantic_verify(&tx, &fixture.parent()).expect("valid decision");
}

fn create_allychain(fixture: &Fixture, executor: &Executor<'_>, owner: OutputOwners) -> Id {
    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = Arc::new(builder.new_create_allychain_tx(owner).expect("build"));
    let mut outcome = executor
        .execute_decision(&tx, &fixture.parent())
        .expect("create allychain");
    outcome.apply(&fixture.chain, None).expect("apply");
    tx.id()
}

#[test]
fn allychain_validator_requires_owner_and_is_unique() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let allychain_id = create_allychain(&fixture, &executor, fixture.owner());
    assert!(fixture.chain.allychain(&allychain_id).expect("lookup").is_some());

    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let tx = Arc::new(
        builder
            .new_add_allychain_validator_tx(1, 2_000, GENESIS_VALIDATOR_END, node(1), allychain_id)
            .expect("build"),
    );
    let outcome = executor
        .execute_proposal(&tx, &fixture.parent())
        .expect("allychain validator");
    assert!(outcome
        .on_commit
        .pending_stakers()
        .allychain_validator(&node(1), &allychain_id)
        .is_some());
    outcome.on_commit.apply(&fixture.chain).expect("apply");

    let again = Arc::new(
        builder
            .new_add_allychain_validator_tx(1, 3_000, 4_000, node(1), allychain_id)
            .expect("build"),
    );
    let err = rejection(executor.execute_proposal(&again, &fixture.parent()));
    assert!(matches!(err, ExecutionError::AlreadyValidatingAllychain { .. }));
    assert_eq!(err.kind(), RejectKind::Duplicate);

    let unknown =
        builder.new_add_allychain_validator_tx(1, 2_000, 3_000, node(1), Id([0x33; 32]));
    assert!(matches!(unknown, Err(BuildError::UnknownAllychain(_))));
}

#[test]
fn allychain_auth_must_satisfy_owner() {
    let fixture = Fixture::new();
    let executor = Executor::new(&fixture.params, GENESIS_TIME);
    let stranger = OutputOwners::single(ShortId([0x44; 20]));
    let allychain_id = create_allychain(&fixture, &executor, stranger);

    let builder = TxBuilder::new(&fixture.params, &fixture.keychain, fixture.chain.as_ref());
    let unauthorized =
        builder.new_add_allychain_validator_tx(1, 2_000, 3_000, node(1), allychain_id);
    assert!(matches!(unauthorized, Err(BuildError::Unauthorized(_))));

    // Reuse a funding signature as the allychain authorization.
    let own_allychain = create_allychain(&fixture, &executor, fixture.owner());
    let tx = builder
        .new_add_allychain_validator_tx(1, 2_000, 3_000, node(1), own_allychain)
        .expect("build");
    let UnsignedTx::AddAllychainValidator(mut unsigned) = tx.unsigned.clone() else {
        panic!("not an allychain validator tx");
    };
    unsigned.allychain_id = allychain_id;
    let forged = Arc::new(Tx::new(UnsignedTx::AddAllychainValidator(unsigned), tx.creds.clone()));
    let err = rejection(executor.execute_proposal(&forged, &fixture.parent()));
    assert_eq!(err.kind(), RejectKind::InsufficientAuthorization);
}
