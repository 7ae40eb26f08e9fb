//! Decision transactions: transfers, allychain and chain creation, and
//! cross-chain import/export.

use std::collections::BTreeMap;
use std::sync::Arc;

use allyd_primitives::{
    decode_versioned, encode_versioned, BaseTx, CreateAllychainTx, CreateChainTx, Credential,
    ExportTx, ImportTx, Tx, Utxo, UtxoId,
};

use super::{spend_branch, DecisionOutcome, ExecutionError, Executor};
use crate::atomic::AtomicRequests;
use crate::spend::{verify_spend, verify_spend_utxos, FlowCheck, SpendError};
use crate::state::StateView;
use crate::txindex::TxStatus;

impl<'a> Executor<'a> {
    pub(super) fn base(
        &self,
        tx: &Arc<Tx>,
        unsigned: &BaseTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        self.verify_base_spend(tx, unsigned, &tx.creds, self.params.tx_fee, parent)?;
        Ok(DecisionOutcome {
            state: spend_branch(parent, tx, unsigned, &[], TxStatus::Committed),
            atomic: BTreeMap::new(),
        })
    }

    pub(super) fn create_allychain(
        &self,
        tx: &Arc<Tx>,
        unsigned: &CreateAllychainTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        self.verify_base_spend(
            tx,
            &unsigned.base,
            &tx.creds,
            self.params.create_allychain_tx_fee,
            parent,
        )?;

        let mut state = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed);
        state.add_allychain(Arc::clone(tx));
        Ok(DecisionOutcome {
            state,
            atomic: BTreeMap::new(),
        })
    }

    pub(super) fn create_chain(
        &self,
        tx: &Arc<Tx>,
        unsigned: &CreateChainTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        let spend_credentials = self.verify_allychain_auth(
            tx,
            &unsigned.base,
            &unsigned.allychain_id,
            &unsigned.allychain_auth,
            parent.as_ref(),
        )?;
        self.verify_base_spend(
            tx,
            &unsigned.base,
            spend_credentials,
            self.params.create_chain_tx_fee,
            parent,
        )?;

        let mut state = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed);
        state.add_chain(unsigned.allychain_id, Arc::clone(tx));
        Ok(DecisionOutcome {
            state,
            atomic: BTreeMap::new(),
        })
    }

    /// Consumes local inputs and UTXOs exported to this chain by
    /// `source_chain`; the imported elements leave shared memory on accept.
    pub(super) fn import(
        &self,
        tx: &Arc<Tx>,
        unsigned: &ImportTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        if unsigned.source_chain == self.chain_id() {
            return Err(ExecutionError::ImportFromSelf);
        }
        let shared_memory = self.shared_memory.ok_or(ExecutionError::NoSharedMemory)?;

        let mut utxos = Vec::with_capacity(unsigned.base.ins.len() + unsigned.imported_inputs.len());
        for input in &unsigned.base.ins {
            let utxo = parent
                .utxo(&input.utxo_id)?
                .ok_or(SpendError::MissingUtxo(input.utxo_id))?;
            utxos.push(utxo);
        }

        let keys: Vec<Vec<u8>> = unsigned
            .imported_inputs
            .iter()
            .map(|input| input.utxo_id.key().to_vec())
            .collect();
        let values = shared_memory.get(&unsigned.source_chain, &keys)?;
        for (input, value) in unsigned.imported_inputs.iter().zip(&values) {
            utxos.push(decode_imported(&input.utxo_id, value)?);
        }

        let mut ins = unsigned.base.ins.clone();
        ins.extend(unsigned.imported_inputs.iter().cloned());
        let outs: Vec<_> = unsigned.base.outs.iter().collect();
        verify_spend_utxos(
            &utxos,
            &FlowCheck {
                ins: &ins,
                outs: &outs,
                creds: &tx.creds,
                digest: tx.signature_digest(),
                time: parent.timestamp(),
                fee: self.params.tx_fee,
                fee_asset: self.native_asset(),
            },
        )?;

        let mut atomic = BTreeMap::new();
        atomic.insert(
            unsigned.source_chain,
            AtomicRequests {
                puts: Vec::new(),
                removes: keys,
            },
        );
        Ok(DecisionOutcome {
            state: spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed),
            atomic,
        })
    }

    /// Moves value to `destination_chain`. Exported outputs are numbered
    /// after the local outputs and put into the destination's inbox.
    pub(super) fn export(
        &self,
        tx: &Arc<Tx>,
        unsigned: &ExportTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        if unsigned.destination_chain == self.chain_id() {
            return Err(ExecutionError::ExportToSelf);
        }

        let outs: Vec<_> = unsigned
            .base
            .outs
            .iter()
            .chain(&unsigned.exported_outputs)
            .collect();
        verify_spend(
            parent.as_ref(),
            &FlowCheck {
                ins: &unsigned.base.ins,
                outs: &outs,
                creds: &tx.creds,
                digest: tx.signature_digest(),
                time: parent.timestamp(),
                fee: self.params.tx_fee,
                fee_asset: self.native_asset(),
            },
        )?;

        let tx_id = tx.id();
        let first_index = u32::try_from(unsigned.base.outs.len())
            .map_err(|_| SpendError::Overflow)?;
        let puts = (first_index..)
            .zip(&unsigned.exported_outputs)
            .map(|(output_index, output)| {
                let utxo = Utxo {
                    utxo_id: UtxoId::new(tx_id, output_index),
                    asset_id: output.asset_id,
                    output: output.output.clone(),
                };
                (utxo.utxo_id.key().to_vec(), encode_versioned(&utxo))
            })
            .collect();

        let mut atomic = BTreeMap::new();
        atomic.insert(
            unsigned.destination_chain,
            AtomicRequests {
                puts,
                removes: Vec::new(),
            },
        );
        Ok(DecisionOutcome {
            state: spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed),
            atomic,
        })
    }

    fn verify_base_spend(
        &self,
        tx: &Tx,
        base: &BaseTx,
        creds: &[Credential],
        fee: u64,
        parent: &Arc<dyn StateView>,
    ) -> Result<(), ExecutionError> {
        let outs: Vec<_> = base.outs.iter().collect();
        verify_spend(
            parent.as_ref(),
            &FlowCheck {
                ins: &base.ins,
                outs: &outs,
                creds,
                digest: tx.signature_digest(),
                time: parent.timestamp(),
                fee,
                fee_asset: self.native_asset(),
            },
        )?;
        Ok(())
    }
}

fn decode_imported(utxo_id: &UtxoId, value: &[u8]) -> Result<Utxo, ExecutionError> {
    let utxo: Utxo =
        decode_versioned(value).map_err(|_| ExecutionError::InvalidImportedUtxo(*utxo_id))?;
    if utxo.utxo_id != *utxo_id {
        return Err(ExecutionError::InvalidImportedUtxo(*utxo_id));
    }
    Ok(utxo)
}
