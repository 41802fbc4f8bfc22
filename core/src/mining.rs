//! Parallel proof-of-work search over a block's nonce space.
//!
//! `Block::mine` already performs a single-threaded search; `Miner`
//! divides the nonce space across `std::thread::available_parallelism()`
//! threads for when single-threaded mining is too slow to be practical
//! (e.g. tests against a tighter target, or larger demos).

use crate::block::{Block, BlockContent};
use ledger_shared::{ChainError, Hash256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;

/// Mining configuration: how many threads divide the nonce search, and how
/// much of the nonce space each is allowed to cover before giving up.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    pub threads: usize,
    pub max_nonce: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(1),
            max_nonce: u64::MAX,
        }
    }
}

/// The outcome of a successful parallel mining run.
#[derive(Debug, Clone)]
pub struct MiningResult {
    pub block: Block,
    pub hash: Hash256,
    pub nonce: u64,
    pub attempts: u64,
}

/// Divides a block's nonce search across multiple threads.
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    #[must_use]
    pub const fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Mines `content` against `target`, extending `prior_block_hash`.
    /// Each thread searches a disjoint slice of the nonce space; the
    /// first to find a satisfying nonce wins and the rest stop.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::NonceSpaceExhausted` if every thread runs out
    /// of its assigned nonce range without finding one below `target`.
    pub fn mine(
        &self,
        content: BlockContent,
        target: Hash256,
        prior_block_hash: Hash256,
    ) -> ledger_shared::Result<MiningResult> {
        let threads = self.config.threads.max(1);
        let found = Arc::new(AtomicBool::new(false));
        let result = Arc::new(Mutex::new(None));

        let nonce_per_thread = self.config.max_nonce / threads as u64;
        let mut handles = Vec::with_capacity(threads);

        for thread_id in 0..threads {
            let content = content.clone();
            let found = Arc::clone(&found);
            let result = Arc::clone(&result);

            let start_nonce = thread_id as u64 * nonce_per_thread;
            let end_nonce = if thread_id == threads - 1 {
                self.config.max_nonce
            } else {
                (thread_id as u64 + 1) * nonce_per_thread
            };

            handles.push(thread::spawn(move || {
                mine_range(content, target, prior_block_hash, start_nonce, end_nonce, &found, &result);
            }));
        }

        for handle in handles {
            handle.join().expect("mining thread panicked");
        }

        let outcome = Arc::try_unwrap(result)
            .unwrap_or_else(|arc| Mutex::new(arc.lock().expect("mining result poisoned").take()))
            .into_inner()
            .expect("mining result poisoned");

        outcome.ok_or(ChainError::NonceSpaceExhausted)
    }
}

#[allow(clippy::too_many_arguments)]
fn mine_range(
    content: BlockContent,
    target: Hash256,
    prior_block_hash: Hash256,
    start_nonce: u64,
    end_nonce: u64,
    found: &Arc<AtomicBool>,
    result: &Arc<Mutex<Option<MiningResult>>>,
) {
    let mut block = Block::new(content, target, prior_block_hash);
    block.header.nonce = start_nonce;

    let mut attempts = 0u64;
    for nonce in start_nonce..end_nonce {
        if found.load(Ordering::SeqCst) {
            return;
        }
        block.header.nonce = nonce;
        attempts += 1;

        let hash = block.hash().expect("block fields are always serializable");
        if hash < target {
            found.store(true, Ordering::SeqCst);
            let mut slot = result.lock().expect("mining result poisoned");
            if slot.is_none() {
                debug!(nonce, attempts, "mining thread found a solution");
                *slot = Some(MiningResult {
                    block,
                    hash,
                    nonce,
                    attempts,
                });
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockContent;

    #[test]
    fn single_threaded_mining_satisfies_target() {
        let target = Hash256::from_bytes([0xFF; 32]);
        let miner = Miner::new(MinerConfig {
            threads: 1,
            ..MinerConfig::default()
        });
        let result = miner
            .mine(BlockContent::new(vec![]), target, Hash256::zero())
            .unwrap();

        assert!(result.hash < target);
        assert_eq!(result.block.hash().unwrap(), result.hash);
    }

    #[test]
    fn multi_threaded_mining_finds_a_solution() {
        let target = Hash256::from_bytes([0xFF; 32]);
        let miner = Miner::new(MinerConfig {
            threads: 4,
            ..MinerConfig::default()
        });
        let result = miner
            .mine(BlockContent::new(vec![]), target, Hash256::zero())
            .unwrap();

        assert!(result.hash < target);
    }

    #[test]
    fn nonce_space_exhaustion_is_reported() {
        // A target of zero is unsatisfiable: no hash is strictly less than
        // it, so every thread exhausts its small, explicitly bounded range
        // without a solution.
        let target = Hash256::zero();
        let miner = Miner::new(MinerConfig {
            threads: 2,
            max_nonce: 64,
        });
        let result = miner.mine(BlockContent::new(vec![]), target, Hash256::zero());

        assert!(matches!(result, Err(ChainError::NonceSpaceExhausted)));
    }
}
