//! Selecting UTXOs to fund a transaction, and checking the value flow of
//! a submitted one.

use std::collections::{BTreeMap, BTreeSet};

use allyd_credentials::{verify_credential, CredentialError, Keychain, SecretKey};
use allyd_primitives::inputs::sort_inputs_with_signers;
use allyd_primitives::outputs::sort_outputs;
use allyd_primitives::{
    Credential, Id, Input, Output, OutputOwners, StakeableLockIn, TransferInput, TransferableInput,
    TransferableOutput, Utxo, UtxoId,
};
use rayon::prelude::*;

use crate::state::{StateError, StateView};

#[derive(Debug)]
pub enum SpendError {
    /// The allocator ran out of UTXOs before covering the request.
    InsufficientFunds { asset_id: Id, shortfall: u64 },
    InsufficientUnlockedFunds { asset_id: Id, shortfall: u64 },
    InsufficientLockedFunds { asset_id: Id, shortfall: u64 },
    MissingUtxo(UtxoId),
    UtxoCountMismatch { inputs: usize, utxos: usize },
    CredentialCountMismatch { expected: usize, got: usize },
    AssetMismatch(UtxoId),
    AmountMismatch { utxo_id: UtxoId, expected: u64, got: u64 },
    LockedFundsNotMarkedLocked(UtxoId),
    WrongLocktime { utxo_id: UtxoId, expected: u64, got: u64 },
    Credential { input_index: usize, source: CredentialError },
    Overflow,
    State(StateError),
}

impl std::fmt::Display for SpendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpendError::InsufficientFunds { asset_id, shortfall } => {
                write!(f, "insufficient funds: {shortfall} more of asset {asset_id} needed")
            }
            SpendError::InsufficientUnlockedFunds { asset_id, shortfall } => write!(
                f,
                "unlocked outputs of asset {asset_id} exceed unlocked inputs by {shortfall}"
            ),
            SpendError::InsufficientLockedFunds { asset_id, shortfall } => write!(
                f,
                "locked outputs of asset {asset_id} exceed available inputs by {shortfall}"
            ),
            SpendError::MissingUtxo(utxo_id) => write!(f, "utxo {utxo_id} not found"),
            SpendError::UtxoCountMismatch { inputs, utxos } => {
                write!(f, "{inputs} inputs but {utxos} utxos")
            }
            SpendError::CredentialCountMismatch { expected, got } => {
                write!(f, "expected {expected} credentials, got {got}")
            }
            SpendError::AssetMismatch(utxo_id) => {
                write!(f, "input asset differs from utxo {utxo_id}")
            }
            SpendError::AmountMismatch {
                utxo_id,
                expected,
                got,
            } => write!(f, "input spends {got} of utxo {utxo_id} holding {expected}"),
            SpendError::LockedFundsNotMarkedLocked(utxo_id) => {
                write!(f, "locked utxo {utxo_id} consumed by an unlocked input")
            }
            SpendError::WrongLocktime {
                utxo_id,
                expected,
                got,
            } => write!(
                f,
                "input locktime {got} does not match utxo {utxo_id} locktime {expected}"
            ),
            SpendError::Credential {
                input_index,
                source,
            } => write!(f, "input {input_index}: {source}"),
            SpendError::Overflow => write!(f, "amount overflow"),
            SpendError::State(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SpendError {}

impl From<StateError> for SpendError {
    fn from(err: StateError) -> Self {
        SpendError::State(err)
    }
}

/// Amounts a transaction must destroy and bond.
#[derive(Clone, Debug, Default)]
pub struct SpendRequest {
    pub burn: BTreeMap<Id, u64>,
    pub stake: BTreeMap<Id, u64>,
    /// Outputs locked beyond this time can only be staked.
    pub min_issuance_time: u64,
    /// Owner of unlocked change and stake; the keychain's first address
    /// when unset.
    pub change_owner: Option<OutputOwners>,
}

/// Balanced inputs and outputs, each input paired with its signing keys.
#[derive(Clone, Debug, Default)]
pub struct Spend {
    pub inputs: Vec<TransferableInput>,
    pub change: Vec<TransferableOutput>,
    pub stake: Vec<TransferableOutput>,
    pub signers: Vec<Vec<SecretKey>>,
}

/// Consumes UTXOs owned by `keychain` until `request` is covered.
///
/// Still-locked UTXOs go to staking first and keep their lock on the
/// staked and returned amounts. Unlocked UTXOs then cover the burn, the
/// rest of the stake, and return any surplus as change.
pub fn spend(
    state: &dyn StateView,
    keychain: &Keychain,
    request: &SpendRequest,
) -> Result<Spend, SpendError> {
    let addresses: BTreeSet<_> = keychain.addresses().into_iter().collect();
    let utxos = state.utxos_for(&addresses)?;
    let time = request.min_issuance_time;
    let change_owner = match &request.change_owner {
        Some(owner) => owner.clone(),
        None => keychain
            .addresses()
            .first()
            .map(|address| OutputOwners::single(*address))
            .unwrap_or_default(),
    };

    let mut to_burn = request.burn.clone();
    let mut to_stake = request.stake.clone();
    let mut result = Spend::default();

    for utxo in &utxos {
        let Output::StakeableLock(locked) = &utxo.output else {
            continue;
        };
        if locked.locktime <= time {
            continue;
        }
        let remaining = to_stake.get(&utxo.asset_id).copied().unwrap_or(0);
        if remaining == 0 {
            continue;
        }
        let Some((sig_indices, keys)) = keychain.match_owners(&locked.inner.owners, time) else {
            continue;
        };

        let amount = locked.inner.amount;
        let staked = remaining.min(amount);
        to_stake.insert(utxo.asset_id, remaining - staked);

        result.inputs.push(TransferableInput {
            utxo_id: utxo.utxo_id,
            asset_id: utxo.asset_id,
            input: Input::StakeableLock(StakeableLockIn {
                locktime: locked.locktime,
                inner: TransferInput {
                    amount,
                    sig_indices,
                },
            }),
        });
        result.signers.push(keys);
        result.stake.push(TransferableOutput::new(
            utxo.asset_id,
            Output::locked(locked.locktime, staked, locked.inner.owners.clone()),
        ));
        let surplus = amount - staked;
        if surplus > 0 {
            result.change.push(TransferableOutput::new(
                utxo.asset_id,
                Output::locked(locked.locktime, surplus, locked.inner.owners.clone()),
            ));
        }
    }

    for utxo in &utxos {
        let remaining_burn = to_burn.get(&utxo.asset_id).copied().unwrap_or(0);
        let remaining_stake = to_stake.get(&utxo.asset_id).copied().unwrap_or(0);
        if remaining_burn == 0 && remaining_stake == 0 {
            continue;
        }
        let out = match &utxo.output {
            Output::Transfer(out) => out,
            Output::StakeableLock(locked) if locked.locktime > time => continue,
            Output::StakeableLock(locked) => &locked.inner,
        };
        let Some((sig_indices, keys)) = keychain.match_owners(&out.owners, time) else {
            continue;
        };

        let amount = out.amount;
        let burned = remaining_burn.min(amount);
        to_burn.insert(utxo.asset_id, remaining_burn - burned);
        let available = amount - burned;
        let staked = remaining_stake.min(available);
        to_stake.insert(utxo.asset_id, remaining_stake - staked);

        result.inputs.push(TransferableInput {
            utxo_id: utxo.utxo_id,
            asset_id: utxo.asset_id,
            input: Input::Transfer(TransferInput {
                amount,
                sig_indices,
            }),
        });
        result.signers.push(keys);
        if staked > 0 {
            result.stake.push(TransferableOutput::new(
                utxo.asset_id,
                Output::transfer(staked, change_owner.clone()),
            ));
        }
        let surplus = available - staked;
        if surplus > 0 {
            result.change.push(TransferableOutput::new(
                utxo.asset_id,
                Output::transfer(surplus, change_owner.clone()),
            ));
        }
    }

    let mut shortfalls: BTreeMap<Id, u64> = BTreeMap::new();
    for (asset_id, remaining) in to_burn.iter().chain(to_stake.iter()) {
        if *remaining > 0 {
            let shortfall = shortfalls.entry(*asset_id).or_default();
            *shortfall = shortfall.saturating_add(*remaining);
        }
    }
    if let Some((asset_id, shortfall)) = shortfalls.into_iter().next() {
        return Err(SpendError::InsufficientFunds {
            asset_id,
            shortfall,
        });
    }

    sort_inputs_with_signers(&mut result.inputs, &mut result.signers);
    sort_outputs(&mut result.change);
    sort_outputs(&mut result.stake);
    Ok(result)
}

/// The value flow of one transaction: what it consumes, what it creates,
/// and the fee it must burn.
#[derive(Clone, Debug)]
pub struct FlowCheck<'a> {
    pub ins: &'a [TransferableInput],
    pub outs: &'a [&'a TransferableOutput],
    pub creds: &'a [Credential],
    /// Digest the credentials sign.
    pub digest: Id,
    /// Chain time; locks and owner locktimes are judged against it.
    pub time: u64,
    pub fee: u64,
    pub fee_asset: Id,
}

/// Fetches the consumed UTXOs from `state` and runs [`verify_spend_utxos`].
pub fn verify_spend(state: &dyn StateView, check: &FlowCheck<'_>) -> Result<(), SpendError> {
    let mut utxos = Vec::with_capacity(check.ins.len());
    for input in check.ins {
        let utxo = state
            .utxo(&input.utxo_id)?
            .ok_or(SpendError::MissingUtxo(input.utxo_id))?;
        utxos.push(utxo);
    }
    verify_spend_utxos(&utxos, check)
}

/// Checks that `check.ins` may consume `utxos` and that the outputs plus
/// the fee are covered, per asset. Locked outputs draw on locked inputs
/// with the same owner and locktime first, then on unlocked inputs.
pub fn verify_spend_utxos(utxos: &[Utxo], check: &FlowCheck<'_>) -> Result<(), SpendError> {
    if utxos.len() != check.ins.len() {
        return Err(SpendError::UtxoCountMismatch {
            inputs: check.ins.len(),
            utxos: utxos.len(),
        });
    }
    if check.creds.len() != check.ins.len() {
        return Err(SpendError::CredentialCountMismatch {
            expected: check.ins.len(),
            got: check.creds.len(),
        });
    }

    let mut unlocked_consumed: BTreeMap<Id, u64> = BTreeMap::new();
    let mut locked_consumed: BTreeMap<Id, BTreeMap<(Id, u64), u64>> = BTreeMap::new();
    let mut owners = Vec::with_capacity(utxos.len());

    for (input, utxo) in check.ins.iter().zip(utxos) {
        if input.asset_id != utxo.asset_id {
            return Err(SpendError::AssetMismatch(utxo.utxo_id));
        }
        let locktime = utxo.output.stake_locktime();
        match &input.input {
            Input::Transfer(_) if check.time < locktime => {
                return Err(SpendError::LockedFundsNotMarkedLocked(utxo.utxo_id));
            }
            Input::StakeableLock(locked) if locked.locktime != locktime => {
                return Err(SpendError::WrongLocktime {
                    utxo_id: utxo.utxo_id,
                    expected: locktime,
                    got: locked.locktime,
                });
            }
            _ => {}
        }
        let amount = input.amount();
        if amount != utxo.amount() {
            return Err(SpendError::AmountMismatch {
                utxo_id: utxo.utxo_id,
                expected: utxo.amount(),
                got: amount,
            });
        }
        owners.push(utxo.output.owners());

        if check.time >= locktime {
            add_amount(unlocked_consumed.entry(utxo.asset_id).or_default(), amount)?;
        } else {
            let key = (utxo.output.owners().owner_key(), locktime);
            add_amount(
                locked_consumed
                    .entry(utxo.asset_id)
                    .or_default()
                    .entry(key)
                    .or_default(),
                amount,
            )?;
        }
    }

    let verdicts: Vec<Result<(), CredentialError>> = owners
        .par_iter()
        .zip(check.ins.par_iter())
        .zip(check.creds.par_iter())
        .map(|((owners, input), credential)| {
            verify_credential(
                owners,
                input.input.sig_indices(),
                credential,
                &check.digest,
                check.time,
            )
        })
        .collect();
    for (input_index, verdict) in verdicts.into_iter().enumerate() {
        verdict.map_err(|source| SpendError::Credential {
            input_index,
            source,
        })?;
    }

    let mut unlocked_produced: BTreeMap<Id, u64> = BTreeMap::new();
    unlocked_produced.insert(check.fee_asset, check.fee);
    let mut locked_produced: BTreeMap<Id, BTreeMap<(Id, u64), u64>> = BTreeMap::new();
    for output in check.outs {
        let locktime = output.output.stake_locktime();
        let amount = output.amount();
        if locktime == 0 {
            add_amount(unlocked_produced.entry(output.asset_id).or_default(), amount)?;
        } else {
            let key = (output.output.owners().owner_key(), locktime);
            add_amount(
                locked_produced
                    .entry(output.asset_id)
                    .or_default()
                    .entry(key)
                    .or_default(),
                amount,
            )?;
        }
    }

    for (asset_id, produced) in &locked_produced {
        let consumed = locked_consumed.get(asset_id);
        for (key, produced_amount) in produced {
            let consumed_amount = consumed
                .and_then(|consumed| consumed.get(key))
                .copied()
                .unwrap_or(0);
            if *produced_amount <= consumed_amount {
                continue;
            }
            let increase = produced_amount - consumed_amount;
            let unlocked = unlocked_consumed.entry(*asset_id).or_default();
            if increase > *unlocked {
                return Err(SpendError::InsufficientLockedFunds {
                    asset_id: *asset_id,
                    shortfall: increase - *unlocked,
                });
            }
            *unlocked -= increase;
        }
    }

    for (asset_id, produced) in &unlocked_produced {
        let consumed = unlocked_consumed.get(asset_id).copied().unwrap_or(0);
        if *produced > consumed {
            return Err(SpendError::InsufficientUnlockedFunds {
                asset_id: *asset_id,
                shortfall: produced - consumed,
            });
        }
    }
    Ok(())
}

fn add_amount(total: &mut u64, amount: u64) -> Result<(), SpendError> {
    *total = total.checked_add(amount).ok_or(SpendError::Overflow)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use allyd_consensus::{staking_params, Network};
    use allyd_credentials::sign_digest;
    use allyd_primitives::ShortId;
    use allyd_storage::MemoryStore;

    use super::*;
    use crate::state::{ChainState, Genesis};

    const ASSET: Id = Id([1; 32]);

    fn keychain() -> (Keychain, ShortId) {
        let mut keychain = Keychain::new();
        let address = keychain.add(SecretKey::from_slice(&[3; 32]).expect("secret key"));
        (keychain, address)
    }

    fn unlocked(tx: u8, amount: u64, owner: ShortId) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(Id([tx; 32]), 0),
            asset_id: ASSET,
            output: Output::transfer(amount, OutputOwners::single(owner)),
        }
    }

    fn locked(tx: u8, amount: u64, locktime: u64, owner: ShortId) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(Id([tx; 32]), 0),
            asset_id: ASSET,
            output: Output::locked(locktime, amount, OutputOwners::single(owner)),
        }
    }

    fn chain(utxos: Vec<Utxo>) -> ChainState<MemoryStore> {
        let chain = ChainState::open(Arc::new(MemoryStore::new())).expect("open");
        let genesis = Genesis {
            timestamp: 100,
            initial_supply: 1_000_000,
            utxos,
            validators: Vec::new(),
        };
        chain
            .initialize(&genesis, &staking_params(Network::Local))
            .expect("initialize");
        chain
    }

    fn request(burn: u64, stake: u64) -> SpendRequest {
        SpendRequest {
            burn: BTreeMap::from([(ASSET, burn)]),
            stake: BTreeMap::from([(ASSET, stake)]),
            min_issuance_time: 100,
            change_owner: None,
        }
    }

    fn total(outputs: &[TransferableOutput]) -> u64 {
        outputs.iter().map(TransferableOutput::amount).sum()
    }

    fn credentials(signers: &[Vec<SecretKey>], digest: &Id) -> Vec<Credential> {
        signers
            .iter()
            .map(|keys| Credential {
                signatures: keys.iter().map(|key| sign_digest(key, digest)).collect(),
            })
            .collect()
    }

    #[test]
    fn stakes_locked_utxo_before_unlocked_one() {
        let (keychain, address) = keychain();
        let state = chain(vec![unlocked(1, 500, address), locked(2, 500, 1_000, address)]);

        let funds = spend(&state, &keychain, &request(0, 500)).expect("spend");
        assert_eq!(funds.inputs.len(), 1);
        assert_eq!(funds.inputs[0].utxo_id, UtxoId::new(Id([2; 32]), 0));
        assert!(matches!(funds.inputs[0].input, Input::StakeableLock(_)));
        assert!(funds.change.is_empty());
        assert_eq!(funds.stake.len(), 1);
        assert_eq!(funds.stake[0].output.stake_locktime(), 1_000);
        assert_eq!(funds.stake[0].amount(), 500);
    }

    #[test]
    fn locked_surplus_is_returned_locked() {
        let (keychain, address) = keychain();
        let state = chain(vec![locked(2, 800, 1_000, address), unlocked(3, 50, address)]);

        let funds = spend(&state, &keychain, &request(10, 500)).expect("spend");
        assert_eq!(funds.inputs.len(), 2);
        assert_eq!(total(&funds.stake), 500);
        let locked_change: Vec<_> = funds
            .change
            .iter()
            .filter(|output| output.output.stake_locktime() == 1_000)
            .collect();
        assert_eq!(locked_change.len(), 1);
        assert_eq!(locked_change[0].amount(), 300);
        assert_eq!(total(&funds.change), 340);
    }

    #[test]
    fn inputs_cover_outputs_and_burn_exactly() {
        let (keychain, address) = keychain();
        let state = chain(vec![unlocked(1, 300, address), unlocked(2, 400, address)]);

        let funds = spend(&state, &keychain, &request(10, 500)).expect("spend");
        let consumed: u64 = funds.inputs.iter().map(TransferableInput::amount).sum();
        assert_eq!(consumed, 700);
        assert_eq!(total(&funds.stake), 500);
        assert_eq!(total(&funds.change), 190);
        assert_eq!(consumed, total(&funds.stake) + total(&funds.change) + 10);
        assert_eq!(funds.signers.len(), funds.inputs.len());
    }

    #[test]
    fn reports_shortfall() {
        let (keychain, address) = keychain();
        let state = chain(vec![unlocked(1, 300, address), unlocked(2, 400, address)]);

        let err = spend(&state, &keychain, &request(1_000, 0)).expect_err("short");
        assert!(matches!(
            err,
            SpendError::InsufficientFunds { asset_id, shortfall: 300 } if asset_id == ASSET
        ));
    }

    #[test]
    fn ignores_utxos_the_keychain_cannot_sign() {
        let (keychain, _) = keychain();
        let state = chain(vec![unlocked(1, 300, ShortId([9; 20]))]);
        assert!(spend(&state, &keychain, &request(10, 0)).is_err());
    }

    #[test]
    fn flow_check_accepts_allocated_spend() {
        let (keychain, address) = keychain();
        let state = chain(vec![unlocked(1, 300, address), locked(2, 500, 1_000, address)]);
        let funds = spend(&state, &keychain, &request(10, 600)).expect("spend");

        let digest = Id([9; 32]);
        let creds = credentials(&funds.signers, &digest);
        let outs: Vec<&TransferableOutput> = funds.change.iter().chain(&funds.stake).collect();
        let mut check = FlowCheck {
            ins: &funds.inputs,
            outs: &outs,
            creds: &creds,
            digest,
            time: 100,
            fee: 10,
            fee_asset: ASSET,
        };
        verify_spend(&state, &check).expect("balanced");

        check.fee = 11;
        assert!(matches!(
            verify_spend(&state, &check),
            Err(SpendError::InsufficientUnlockedFunds { shortfall: 1, .. })
        ));

        check.fee = 10;
        check.digest = Id([8; 32]);
        assert!(matches!(
            verify_spend(&state, &check),
            Err(SpendError::Credential { input_index: 0, .. })
        ));
    }

    #[test]
    fn flow_check_rejects_locked_utxo_spent_as_unlocked() {
        let (_, address) = keychain();
        let utxo = locked(2, 500, 1_000, address);
        let key = SecretKey::from_slice(&[3; 32]).expect("secret key");
        let digest = Id([9; 32]);
        let ins = vec![TransferableInput {
            utxo_id: utxo.utxo_id,
            asset_id: ASSET,
            input: Input::Transfer(TransferInput {
                amount: 500,
                sig_indices: vec![0],
            }),
        }];
        let creds = credentials(&[vec![key]], &digest);
        let check = FlowCheck {
            ins: &ins,
            outs: &[],
            creds: &creds,
            digest,
            time: 100,
            fee: 0,
            fee_asset: ASSET,
        };
        assert!(matches!(
            verify_spend_utxos(&[utxo.clone()], &check),
            Err(SpendError::LockedFundsNotMarkedLocked(_))
        ));

        let after_unlock = FlowCheck { time: 1_000, ..check };
        verify_spend_utxos(&[utxo], &after_unlock).expect("unlocked by then");
    }

    #[test]
    fn locked_output_cannot_exceed_inputs() {
        let (_, address) = keychain();
        let utxo = unlocked(1, 100, address);
        let key = SecretKey::from_slice(&[3; 32]).expect("secret key");
        let digest = Id([9; 32]);
        let ins = vec![TransferableInput {
            utxo_id: utxo.utxo_id,
            asset_id: ASSET,
            input: Input::Transfer(TransferInput {
                amount: 100,
                sig_indices: vec![0],
            }),
        }];
        let creds = credentials(&[vec![key]], &digest);
        let output = TransferableOutput::new(
            ASSET,
            Output::locked(1_000, 101, OutputOwners::single(address)),
        );
        let outs = vec![&output];
        let check = FlowCheck {
            ins: &ins,
            outs: &outs,
            creds: &creds,
            digest,
            time: 100,
            fee: 0,
            fee_asset: ASSET,
        };
        assert!(matches!(
            verify_spend_utxos(&[utxo], &check),
            Err(SpendError::InsufficientLockedFunds { shortfall: 1, .. })
        ));
    }
}
