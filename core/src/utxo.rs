//! Per-block UTXO snapshots.
//!
//! Snapshots are held one per stored block, trading space for O(1)
//! fork-hopping, so cloning one to derive the next must be cheap.
//! `im::HashMap` gives O(1) structural-sharing clone; every stored block
//! keeps its own snapshot without copying the whole map.

use crate::transaction::Output;
use im::HashMap;
use ledger_shared::Hash256;
use serde::{Deserialize, Serialize};

/// A pointer to a specific output of a specific transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    #[must_use]
    pub const fn new(tx_hash: Hash256, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

/// The unspent-output state as of some block being the newest on its fork.
#[derive(Debug, Clone, Default)]
pub struct UtxoSnapshot {
    outputs: HashMap<OutPoint, Output>,
}

impl UtxoSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            outputs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, outpoint: &OutPoint) -> Option<&Output> {
        self.outputs.get(outpoint)
    }

    #[must_use]
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.outputs.contains_key(outpoint)
    }

    pub fn insert(&mut self, outpoint: OutPoint, output: Output) {
        self.outputs.insert(outpoint, output);
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<Output> {
        self.outputs.remove(outpoint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
