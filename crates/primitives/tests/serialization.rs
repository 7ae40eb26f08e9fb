use allyd_consensus::{staking_params, Network};
use allyd_primitives::encoding::DecodeError;
use allyd_primitives::{
    AddNominatorTx, AddValidatorTx, AdvanceTimeTx, BaseTx, Credential, Id, Input, NodeId, Output,
    OutputOwners, ShortId, SyntaxError, TransferInput, TransferableInput, TransferableOutput, Tx,
    TxKind, UnsignedTx, UtxoId, Validator,
};

fn owner(byte: u8) -> OutputOwners {
    OutputOwners::single(ShortId([byte; 20]))
}

fn base(params: &allyd_consensus::StakingParams) -> BaseTx {
    let asset = Id::from(params.asset_id);
    BaseTx {
        network_id: params.network_id,
        chain_id: Id::from(params.chain_id),
        outs: vec![TransferableOutput::new(asset, Output::transfer(90, owner(1)))],
        ins: vec![TransferableInput {
            utxo_id: UtxoId::new(Id([4; 32]), 0),
            asset_id: asset,
            input: Input::Transfer(TransferInput {
                amount: 100,
                sig_indices: vec![0],
            }),
        }],
        memo: b"memo".to_vec(),
    }
}

fn add_validator(params: &allyd_consensus::StakingParams, weight: u64) -> UnsignedTx {
    let asset = Id::from(params.asset_id);
    UnsignedTx::AddValidator(AddValidatorTx {
        base: base(params),
        validator: Validator {
            node_id: NodeId([7; 20]),
            start: 10,
            end: 20,
            weight,
        },
        stake: vec![TransferableOutput::new(asset, Output::transfer(10, owner(1)))],
        rewards_owner: owner(2),
        shares: 20_000,
    })
}

#[test]
fn signed_tx_round_trips_with_stable_id() {
    let params = staking_params(Network::Local);
    let tx = Tx::new(
        add_validator(&params, 10),
        vec![Credential {
            signatures: vec![[3u8; 65]],
        }],
    );

    let decoded = Tx::decode(tx.bytes()).expect("decode tx");
    assert_eq!(decoded.id(), tx.id());
    assert_eq!(decoded.unsigned, tx.unsigned);
    assert_eq!(decoded.creds, tx.creds);
    assert_eq!(decoded.unsigned_bytes(), tx.unsigned_bytes());
    assert_eq!(decoded.kind(), TxKind::AddValidator);
    assert!(tx.bytes().starts_with(tx.unsigned_bytes()));
    assert_ne!(tx.signature_digest(), tx.id());
}

#[test]
fn unknown_tx_type_is_a_decode_error() {
    let tx = Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 5 }), Vec::new());
    let mut bytes = tx.bytes().to_vec();
    bytes[2..6].copy_from_slice(&999u32.to_be_bytes());
    assert_eq!(
        Tx::decode(&bytes).map(|tx| tx.id()),
        Err(DecodeError::UnknownTypeId(999))
    );
}

#[test]
fn syntactic_checks_cover_staking_fields() {
    let params = staking_params(Network::Local);

    let good = Tx::new(add_validator(&params, 10), Vec::new());
    assert!(good.syntactic_verify(&params).is_ok());
    assert!(good.is_syntax_verified());

    let mismatch = Tx::new(add_validator(&params, 11), Vec::new());
    assert_eq!(
        mismatch.syntactic_verify(&params),
        Err(SyntaxError::StakeWeightMismatch {
            staked: 10,
            weight: 11
        })
    );
    assert!(!mismatch.is_syntax_verified());

    let mainnet = staking_params(Network::Mainnet);
    let wrong_network = Tx::new(add_validator(&params, 10), Vec::new());
    assert!(matches!(
        wrong_network.syntactic_verify(&mainnet),
        Err(SyntaxError::WrongNetworkId { .. })
    ));

    let mut zero = match add_validator(&params, 10) {
        UnsignedTx::AddValidator(tx) => tx,
        _ => unreachable!(),
    };
    zero.validator.weight = 0;
    zero.stake.clear();
    assert_eq!(
        UnsignedTx::AddValidator(zero).syntactic_verify(&params),
        Err(SyntaxError::ZeroWeight)
    );
}

#[test]
fn nominator_stake_must_be_native() {
    let params = staking_params(Network::Local);
    let tx = UnsignedTx::AddNominator(AddNominatorTx {
        base: base(&params),
        validator: Validator {
            node_id: NodeId([7; 20]),
            start: 10,
            end: 20,
            weight: 5,
        },
        stake: vec![TransferableOutput::new(
            Id([0xee; 32]),
            Output::transfer(5, owner(1)),
        )],
        rewards_owner: owner(2),
    });
    assert_eq!(
        tx.syntactic_verify(&params),
        Err(SyntaxError::StakeNotNative(Id([0xee; 32])))
    );
}

#[test]
fn produced_outputs_list_change_before_stake() {
    let params = staking_params(Network::Local);
    let tx = add_validator(&params, 10);
    let amounts: Vec<u64> = tx
        .produced_outputs()
        .into_iter()
        .map(TransferableOutput::amount)
        .collect();
    assert_eq!(amounts, vec![90, 10]);
    assert_eq!(tx.consumed_utxos(), vec![UtxoId::new(Id([4; 32]), 0)]);
}
