use crate::constraint::Constraint;
use crate::merkle::MerkleHashable;
use crate::utxo::{OutPoint, UtxoSnapshot};
use ledger_shared::{ChainError, Hash256};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A spendable value bearing a spend predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub amount: u64,
    pub constraint: Option<Constraint>,
}

impl Output {
    #[must_use]
    pub const fn new(amount: u64, constraint: Option<Constraint>) -> Self {
        Self { amount, constraint }
    }

    /// Evaluates this output's constraint against `satisfier`. A `None`
    /// constraint means unconditionally spendable.
    #[must_use]
    pub fn is_satisfied_by(&self, satisfier: &[u8]) -> bool {
        match &self.constraint {
            None => true,
            Some(constraint) => constraint.is_satisfied(satisfier),
        }
    }
}

/// A pointer to a prior output plus the witness passed to its constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub prior_tx_hash: Hash256,
    pub prior_tx_index: u32,
    pub satisfier: Vec<u8>,
}

impl Input {
    #[must_use]
    pub const fn new(prior_tx_hash: Hash256, prior_tx_index: u32, satisfier: Vec<u8>) -> Self {
        Self {
            prior_tx_hash,
            prior_tx_index,
            satisfier,
        }
    }

    #[must_use]
    pub const fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.prior_tx_hash, self.prior_tx_index)
    }
}

/// An inputs-to-outputs atom with an identity hash.
///
/// A transaction is a coinbase iff its `inputs` list is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub data: Vec<u8>,
}

impl Transaction {
    #[must_use]
    pub const fn new(inputs: Vec<Input>, outputs: Vec<Output>, data: Vec<u8>) -> Self {
        Self {
            inputs,
            outputs,
            data,
        }
    }

    #[must_use]
    pub fn coinbase(outputs: Vec<Output>, data: Vec<u8>) -> Self {
        Self::new(Vec::new(), outputs, data)
    }

    /// Big-endian SHA-256 of a deterministic serialization of
    /// `(inputs, outputs, data)`. Stable across equal content, unique
    /// enough (probabilistically) across differing content.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::SerializationError` if the fields fail to
    /// encode; none of this engine's own types ever trigger it.
    pub fn hash(&self) -> ledger_shared::Result<Hash256> {
        let encoded = bincode::serialize(&(&self.inputs, &self.outputs, &self.data))
            .map_err(|e| ChainError::SerializationError(e.to_string()))?;
        Ok(Hash256::sha256(&encoded))
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Checks the coinbase issuance ceiling. Any transaction carrying
    /// inputs trivially passes (the ceiling only bounds unbacked
    /// issuance); a coinbase passes iff its output sum does not exceed
    /// `max_coins` (equality is permitted).
    #[must_use]
    pub fn validate_mint(&self, max_coins: u64) -> bool {
        if !self.is_coinbase() {
            return true;
        }
        let sum: u64 = self.outputs.iter().map(|o| o.amount).sum();
        sum <= max_coins
    }

    /// Validates this transaction against `utxo_snapshot`, without
    /// mutating it. Snapshot updates happen at the block level.
    #[must_use]
    pub fn validate(&self, utxo_snapshot: &UtxoSnapshot) -> bool {
        let mut in_sum: u64 = 0;

        for input in &self.inputs {
            let Some(referenced) = utxo_snapshot.get(&input.outpoint()) else {
                trace!("input references unknown UTXO");
                return false;
            };
            if !referenced.is_satisfied_by(&input.satisfier) {
                trace!("input failed spend constraint");
                return false;
            }
            in_sum = in_sum.saturating_add(referenced.amount);
        }

        let out_sum: u64 = self.outputs.iter().map(|o| o.amount).sum();
        if !self.inputs.is_empty() && out_sum > in_sum {
            trace!("outputs exceed inputs");
            return false;
        }

        true
    }
}

impl MerkleHashable for Transaction {
    fn leaf_hash(&self) -> ledger_shared::Result<Hash256> {
        self.hash()
    }
}
