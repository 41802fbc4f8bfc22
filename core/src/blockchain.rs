//! The blockchain DAG: admission, per-block UTXO bookkeeping across
//! forks, and best-tip selection by cumulative work.

use crate::block::{Block, BlockContent};
use crate::utxo::UtxoSnapshot;
use ledger_shared::Hash256;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use std::collections::HashMap;
use tracing::{info, warn};

/// A DAG of blocks on possibly-many forks, with a UTXO snapshot retained
/// per block (intentionally — see the crate's retention trade-off) and a
/// cached best tip.
pub struct Blockchain {
    genesis_target: Hash256,
    genesis_hash: Hash256,
    max_mint_per_tx: u64,
    blocks: HashMap<Hash256, Block>,
    utxo: HashMap<Hash256, UtxoSnapshot>,
    /// Insertion-ordered so tie-breaks by cumulative work favor the
    /// earliest-inserted tip, matching the reference implementation.
    tips: Vec<Hash256>,
    best_tip: Hash256,
}

impl Blockchain {
    /// Builds and mines a genesis block at `genesis_target`, with
    /// `max_mint_per_tx` governing every later coinbase's issuance
    /// ceiling. Genesis's `cumulative_work` is the literal constant `1`
    /// (matching the reference implementation, which does not derive it
    /// via `work(genesis_target)` even though the two coincide).
    #[must_use]
    pub fn new(genesis_target: Hash256, max_mint_per_tx: u64) -> Self {
        let mut genesis = Block::new(BlockContent::new(vec![]), genesis_target, Hash256::zero());
        genesis.mine(genesis_target);
        genesis.height = 0;
        genesis.cumulative_work = 1.0;

        let genesis_hash = genesis
            .hash()
            .expect("genesis block is always serializable");

        let mut blocks = HashMap::new();
        blocks.insert(genesis_hash, genesis);

        let mut utxo = HashMap::new();
        utxo.insert(genesis_hash, UtxoSnapshot::empty());

        info!(hash = %genesis_hash, "genesis block created");

        Self {
            genesis_target,
            genesis_hash,
            max_mint_per_tx,
            blocks,
            utxo,
            tips: vec![genesis_hash],
            best_tip: genesis_hash,
        }
    }

    /// `genesis_target / target`, as a ratio of two 256-bit numbers. A
    /// higher target means less work; cumulative work sums this along a
    /// block's ancestors.
    #[must_use]
    pub fn work(&self, target: Hash256) -> f64 {
        let genesis = BigUint::from_bytes_be(self.genesis_target.as_bytes());
        let target = BigUint::from_bytes_be(target.as_bytes());
        if target == BigUint::from(0u8) {
            return f64::INFINITY;
        }
        let genesis_f = genesis.to_f64().unwrap_or(f64::MAX);
        let target_f = target.to_f64().unwrap_or(f64::MAX);
        genesis_f / target_f
    }

    /// Attempts to admit `block`. On success, stores the block and its
    /// derived snapshot, updates the tip set, and returns `true`.
    /// Rejection leaves all state untouched.
    pub fn extend(&mut self, mut block: Block) -> bool {
        let parent_own_hash = block.header.prior_block_hash;
        let Some(parent) = self.blocks.get(&parent_own_hash) else {
            warn!("rejecting block: unknown parent");
            return false;
        };
        let parent_height = parent.height;
        let parent_work = parent.cumulative_work;

        let parent_snapshot = self
            .utxo
            .get(&parent_own_hash)
            .expect("every stored block has a snapshot");

        let Some(next_snapshot) = block.validate(parent_snapshot, self.max_mint_per_tx) else {
            warn!("rejecting block: failed validation");
            return false;
        };

        block.height = parent_height + 1;
        block.cumulative_work = parent_work + self.work(block.header.target);
        let block_hash = block
            .hash()
            .expect("block already hashed successfully during validation");

        self.utxo.insert(block_hash, next_snapshot);

        if let Some(pos) = self.tips.iter().position(|t| *t == parent_own_hash) {
            self.tips[pos] = block_hash;
        } else {
            self.tips.push(block_hash);
        }

        self.blocks.insert(block_hash, block);
        self.recompute_best_tip();

        info!(hash = %block_hash, height = self.blocks[&block_hash].height, "block admitted");
        true
    }

    fn recompute_best_tip(&mut self) {
        let mut best = self.tips[0];
        let mut best_work = self.blocks[&best].cumulative_work;
        for &tip in &self.tips[1..] {
            let work = self.blocks[&tip].cumulative_work;
            if work > best_work {
                best = tip;
                best_work = work;
            }
        }
        self.best_tip = best;
    }

    /// The stored block in the tip set with maximum cumulative work;
    /// ties favor the earliest-inserted tip.
    #[must_use]
    pub fn tip(&self) -> &Block {
        &self.blocks[&self.best_tip]
    }

    /// Every stored block whose height equals `h`, across all forks.
    #[must_use]
    pub fn blocks_at_height(&self, h: u64) -> Vec<&Block> {
        self.blocks.values().filter(|b| b.height == h).collect()
    }

    /// The stored block's cumulative work, or `None` if unknown.
    #[must_use]
    pub fn cumulative_work(&self, hash: Hash256) -> Option<f64> {
        self.blocks.get(&hash).map(|b| b.cumulative_work)
    }

    #[must_use]
    pub fn get(&self, hash: Hash256) -> Option<&Block> {
        self.blocks.get(&hash)
    }

    #[must_use]
    pub fn genesis_hash(&self) -> Hash256 {
        self.genesis_hash
    }

    #[must_use]
    pub fn tips(&self) -> &[Hash256] {
        &self.tips
    }
}
