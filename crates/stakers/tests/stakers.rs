use std::sync::Arc;

use allyd_primitives::{
    AddAllychainValidatorTx, AddNominatorTx, AddValidatorTx, AllychainAuth, BaseTx, Id, NodeId,
    OutputOwners, Tx, TxKind, UnsignedTx, Validator,
};
use allyd_stakers::record::{decode_current, encode_current};
use allyd_stakers::{can_delegate, max_stake_amount, CurrentStakers, PendingStakers, Staker};

fn period(node: u8, start: u64, end: u64, weight: u64) -> Validator {
    Validator {
        node_id: NodeId([node; 20]),
        start,
        end,
        weight,
    }
}

fn base(memo: u8) -> BaseTx {
    BaseTx {
        memo: vec![memo],
        ..BaseTx::default()
    }
}

fn validator_tx(node: u8, start: u64, end: u64, weight: u64) -> Arc<Tx> {
    Arc::new(Tx::new(
        UnsignedTx::AddValidator(AddValidatorTx {
            base: base(0),
            validator: period(node, start, end, weight),
            stake: Vec::new(),
            rewards_owner: OutputOwners::default(),
            shares: 0,
        }),
        Vec::new(),
    ))
}

fn nominator_tx(node: u8, start: u64, end: u64, weight: u64, memo: u8) -> Arc<Tx> {
    Arc::new(Tx::new(
        UnsignedTx::AddNominator(AddNominatorTx {
            base: base(memo),
            validator: period(node, start, end, weight),
            stake: Vec::new(),
            rewards_owner: OutputOwners::default(),
        }),
        Vec::new(),
    ))
}

fn allychain_tx(node: u8, start: u64, end: u64, allychain: u8) -> Arc<Tx> {
    Arc::new(Tx::new(
        UnsignedTx::AddAllychainValidator(AddAllychainValidatorTx {
            base: base(allychain),
            validator: period(node, start, end, 1),
            allychain_id: Id([allychain; 32]),
            allychain_auth: AllychainAuth::default(),
        }),
        Vec::new(),
    ))
}

fn nominators(specs: &[(u64, u64, u64)]) -> Vec<Staker> {
    specs
        .iter()
        .enumerate()
        .map(|(index, (start, end, weight))| {
            Staker::new(nominator_tx(1, *start, *end, *weight, index as u8)).expect("staker")
        })
        .collect()
}

#[test]
fn pending_ties_order_validator_nominator_allychain() {
    let mut pending = PendingStakers::new();
    pending = pending
        .add_staker(allychain_tx(1, 10, 20, 9))
        .expect("add allychain");
    pending = pending
        .add_staker(nominator_tx(1, 10, 20, 5, 0))
        .expect("add nominator");
    pending = pending
        .add_staker(validator_tx(1, 10, 20, 5))
        .expect("add validator");
    pending = pending
        .add_staker(validator_tx(2, 5, 20, 5))
        .expect("add early validator");

    let kinds: Vec<TxKind> = pending.stakers().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TxKind::AddValidator,
            TxKind::AddValidator,
            TxKind::AddNominator,
            TxKind::AddAllychainValidator,
        ]
    );
    assert_eq!(pending.first().expect("first").node_id, NodeId([2; 20]));
}

#[test]
fn pending_ties_of_same_kind_order_by_tx_id() {
    let first = nominator_tx(1, 10, 20, 5, 1);
    let second = nominator_tx(1, 10, 20, 5, 2);
    let pending = PendingStakers::new()
        .add_staker(Arc::clone(&second))
        .expect("add")
        .add_staker(Arc::clone(&first))
        .expect("add");
    let (low, high) = if first.id() < second.id() {
        (first.id(), second.id())
    } else {
        (second.id(), first.id())
    };
    let ids: Vec<Id> = pending.stakers().iter().map(Staker::tx_id).collect();
    assert_eq!(ids, vec![low, high]);
    let node_ids: Vec<Id> = pending
        .nominators(&NodeId([1; 20]))
        .iter()
        .map(Staker::tx_id)
        .collect();
    assert_eq!(node_ids, vec![low, high]);
}

#[test]
fn old_snapshots_survive_mutation() {
    let empty = PendingStakers::new();
    let one = empty.add_staker(validator_tx(1, 10, 20, 5)).expect("add");
    let two = one
        .add_staker(allychain_tx(1, 12, 18, 3))
        .expect("add allychain");
    let trimmed = two.delete_stakers(1).expect("delete");

    assert!(empty.is_empty());
    assert_eq!(one.len(), 1);
    assert_eq!(two.len(), 2);
    assert!(two.validator(&NodeId([1; 20])).is_some());
    assert_eq!(trimmed.len(), 1);
    assert!(trimmed.validator(&NodeId([1; 20])).is_none());
    assert!(trimmed
        .allychain_validator(&NodeId([1; 20]), &Id([3; 32]))
        .is_some());

    let gone = trimmed.delete_stakers(1).expect("delete");
    assert!(gone.node(&NodeId([1; 20])).is_none());
    assert!(trimmed.delete_stakers(2).is_err());
}

#[test]
fn pending_rejects_duplicates() {
    let tx = validator_tx(1, 10, 20, 5);
    let pending = PendingStakers::new()
        .add_staker(Arc::clone(&tx))
        .expect("add");
    assert!(pending.add_staker(Arc::clone(&tx)).is_err());
    assert!(pending.add_staker(validator_tx(1, 11, 20, 5)).is_err());
}

#[test]
fn change_log_tracks_net_writes() {
    let tx = validator_tx(1, 10, 20, 5);
    let pending = PendingStakers::new()
        .add_staker(Arc::clone(&tx))
        .expect("add");
    assert!(pending.has_changes());
    let flushed = pending.flushed();
    assert!(!flushed.has_changes());
    assert_eq!(flushed.len(), 1);

    let deleted = flushed.delete_stakers(1).expect("delete");
    let changes: Vec<(Id, bool)> = deleted
        .changes()
        .map(|(id, change)| (*id, change.is_some()))
        .collect();
    assert_eq!(changes, vec![(tx.id(), false)]);
}

#[test]
fn current_orders_by_end_and_builds_validator_set() {
    let current = CurrentStakers::new()
        .update_stakers(
            vec![(validator_tx(1, 0, 100, 10), 7), (validator_tx(2, 0, 50, 20), 3)],
            vec![(nominator_tx(1, 0, 100, 5, 0), 1)],
            vec![allychain_tx(1, 0, 100, 9)],
            0,
        )
        .expect("update");

    let kinds: Vec<TxKind> = current.stakers().iter().map(|c| c.staker.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TxKind::AddValidator,
            TxKind::AddAllychainValidator,
            TxKind::AddNominator,
            TxKind::AddValidator,
        ]
    );

    let primary = current.validator_set(&Id::EMPTY).expect("set");
    assert_eq!(primary.get(&NodeId([1; 20])), Some(&15));
    assert_eq!(primary.get(&NodeId([2; 20])), Some(&20));
    let allychain = current.validator_set(&Id([9; 32])).expect("set");
    assert_eq!(allychain.len(), 1);
    assert_eq!(allychain.get(&NodeId([1; 20])), Some(&1));

    let validator = current.validator(&NodeId([1; 20])).expect("validator");
    assert_eq!(validator.potential_reward, 7);
    assert_eq!(validator.nominator_weight, 5);

    let after = current.delete_stakers(2).expect("delete");
    assert!(after.validator(&NodeId([2; 20])).is_none());
    let validator = after.validator(&NodeId([1; 20])).expect("validator");
    assert!(validator.allychains.is_empty());
    assert_eq!(current.len(), 4);
    assert_eq!(after.len(), 2);
}

#[test]
fn current_requires_primary_validator_for_nominators() {
    let result = CurrentStakers::new().update_stakers(
        Vec::new(),
        vec![(nominator_tx(4, 0, 10, 5, 0), 0)],
        Vec::new(),
        0,
    );
    assert!(result.is_err());
}

#[test]
fn current_record_round_trips() {
    let current = CurrentStakers::new()
        .update_stakers(vec![(validator_tx(1, 0, 100, 10), 42)], Vec::new(), Vec::new(), 0)
        .expect("update");
    let bytes = encode_current(current.first().expect("first"));
    let (tx, reward) = decode_current(&bytes).expect("decode");
    assert_eq!(reward, 42);
    let reloaded = CurrentStakers::from_stakers([(tx, reward)]).expect("reload");
    assert!(!reloaded.has_changes());
    assert_eq!(reloaded.potential_reward(&reloaded.stakers()[0].staker.tx_id()), Some(42));
}

#[test]
fn max_stake_without_nominators_is_current_stake() {
    assert_eq!(max_stake_amount(&[], &[], 50, 100, 100).expect("max"), 100);
}

#[test]
fn max_stake_drops_nominators_ending_by_window_start() {
    let current = nominators(&[(0, 50, 200)]);
    assert_eq!(max_stake_amount(&current, &[], 50, 100, 300).expect("max"), 100);
    assert_eq!(max_stake_amount(&current, &[], 49, 100, 300).expect("max"), 300);
}

#[test]
fn max_stake_counts_pending_inside_window() {
    let pending = nominators(&[(60, 90, 150)]);
    assert_eq!(max_stake_amount(&[], &pending, 50, 100, 100).expect("max"), 250);

    let late = nominators(&[(200, 300, 150)]);
    assert_eq!(max_stake_amount(&[], &late, 50, 100, 100).expect("max"), 100);

    let early = nominators(&[(10, 40, 300)]);
    assert_eq!(max_stake_amount(&[], &early, 50, 100, 100).expect("max"), 100);
}

#[test]
fn max_stake_records_peak_before_expiry() {
    let current = nominators(&[(0, 70, 200)]);
    let pending = nominators(&[(80, 95, 100)]);
    assert_eq!(
        max_stake_amount(&current, &pending, 50, 100, 300).expect("max"),
        300
    );
}

#[test]
fn can_delegate_is_inclusive_at_cap() {
    let candidate = period(1, 50, 100, 400);
    assert!(can_delegate(&[], &[], &candidate, 100, 500).expect("check"));
    let over = period(1, 50, 100, 401);
    assert!(!can_delegate(&[], &[], &over, 100, 500).expect("check"));
}
