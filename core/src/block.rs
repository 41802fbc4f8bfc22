use crate::merkle::MerkleTree;
use crate::transaction::Transaction;
use crate::utxo::{OutPoint, UtxoSnapshot};
use ledger_shared::{ChainError, Hash256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A block header. `merkle_root` is recomputed from the content before
/// every hash, so callers never need to keep it in sync by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub nonce: u64,
    pub target: Hash256,
    pub prior_block_hash: Hash256,
    pub merkle_root: Hash256,
}

impl BlockHeader {
    #[must_use]
    pub const fn new(target: Hash256, prior_block_hash: Hash256, merkle_root: Hash256) -> Self {
        Self {
            nonce: 0,
            target,
            prior_block_hash,
            merkle_root,
        }
    }
}

/// The transaction set a block commits to, as a Merkle tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockContent {
    transactions: Vec<Transaction>,
}

impl BlockContent {
    #[must_use]
    pub const fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn merkle_root(&self) -> ledger_shared::Result<Hash256> {
        MerkleTree::new(self.transactions.clone()).root()
    }
}

/// A header plus the transaction content it commits to, and the chain
/// bookkeeping (`height`, `cumulative_work`) assigned on admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub content: BlockContent,
    pub height: u64,
    pub cumulative_work: f64,
}

impl Block {
    /// Builds an unmined block over `content`, targeting `target` and
    /// pointing at `prior_block_hash`. `height`/`cumulative_work` are
    /// placeholders until the blockchain admits the block via `extend`.
    #[must_use]
    pub fn new(content: BlockContent, target: Hash256, prior_block_hash: Hash256) -> Self {
        let merkle_root = content
            .merkle_root()
            .expect("transactions are always serializable");
        Self {
            header: BlockHeader::new(target, prior_block_hash, merkle_root),
            content,
            height: 0,
            cumulative_work: 0.0,
        }
    }

    /// SHA-256 over a deterministic serialization of `(header, content)`,
    /// with the header's Merkle root always recomputed from the current
    /// content first.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::SerializationError` if the header or content
    /// fail to encode; none of this engine's own types ever trigger it.
    pub fn hash(&self) -> ledger_shared::Result<Hash256> {
        let mut header = self.header.clone();
        header.merkle_root = self.content.merkle_root()?;
        let encoded = bincode::serialize(&(&header, &self.content))
            .map_err(|e| ChainError::SerializationError(e.to_string()))?;
        Ok(Hash256::sha256(&encoded))
    }

    /// Mines this block against `target`: resets the nonce and the
    /// target, then searches nonces until `hash() < target`. No field
    /// but `nonce` (and the `target` set at the start) is perturbed.
    pub fn mine(&mut self, target: Hash256) {
        self.header.target = target;
        self.header.nonce = 0;
        loop {
            let hash = self.hash().expect("block fields are always serializable");
            if hash < target {
                return;
            }
            self.header.nonce += 1;
        }
    }

    /// Validates this block against `utxo_snapshot`, returning the
    /// updated snapshot on success. Returns `None` on any consensus
    /// failure, leaving the caller's state untouched.
    #[must_use]
    pub fn validate(&self, utxo_snapshot: &UtxoSnapshot, max_mint: u64) -> Option<UtxoSnapshot> {
        let Ok(hash) = self.hash() else {
            trace!("block failed to encode for hashing");
            return None;
        };
        if hash >= self.header.target {
            trace!("block hash does not satisfy target");
            return None;
        }

        let txs = self.content.transactions();
        if txs.is_empty() {
            return Some(utxo_snapshot.clone());
        }

        let coinbase = &txs[0];
        if !coinbase.is_coinbase() {
            trace!("first transaction is not a coinbase");
            return None;
        }
        if !coinbase.validate_mint(max_mint) {
            trace!("coinbase exceeds issuance ceiling");
            return None;
        }
        if txs.iter().filter(|tx| tx.is_coinbase()).count() > 1 {
            trace!("block carries more than one coinbase");
            return None;
        }

        let mut next = utxo_snapshot.clone();
        for tx in txs {
            if !tx.validate(&next) {
                trace!("transaction failed validation");
                return None;
            }
            for input in &tx.inputs {
                next.remove(&input.outpoint());
            }
            let Ok(tx_hash) = tx.hash() else {
                trace!("transaction failed to encode for hashing");
                return None;
            };
            for (index, output) in tx.outputs.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                let outpoint = OutPoint::new(tx_hash, index as u32);
                next.insert(outpoint, output.clone());
            }
        }

        debug!(height = self.height, txs = txs.len(), "block validated");
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Output;

    fn max_target() -> Hash256 {
        Hash256::from_bytes([0xFF; 32])
    }

    #[test]
    fn mining_satisfies_target() {
        let mut block = Block::new(BlockContent::new(vec![]), max_target(), Hash256::zero());
        block.mine(max_target());
        assert!(block.hash().unwrap() < max_target());
    }

    #[test]
    fn lower_target_mines_to_a_lower_hash() {
        let mut a_bytes = [0xFF; 32];
        let a_target = Hash256::from_bytes(a_bytes);
        a_bytes[0] = 0x0F;
        let b_target = Hash256::from_bytes(a_bytes);

        let mut block_a = Block::new(BlockContent::new(vec![]), a_target, Hash256::zero());
        block_a.mine(a_target);
        let mut block_b = Block::new(BlockContent::new(vec![]), b_target, Hash256::zero());
        block_b.mine(b_target);

        assert!(block_a.hash().unwrap() < a_target);
        assert!(block_b.hash().unwrap() < b_target);
        assert!(block_b.hash().unwrap() < block_a.hash().unwrap());
    }

    #[test]
    fn empty_content_validates_unchanged_snapshot() {
        let mut block = Block::new(BlockContent::new(vec![]), max_target(), Hash256::zero());
        block.mine(max_target());

        let snapshot = UtxoSnapshot::empty();
        let next = block.validate(&snapshot, 0).expect("empty block validates");
        assert_eq!(next.len(), 0);
    }

    #[test]
    fn coinbase_block_adds_its_outputs() {
        let coinbase = Transaction::coinbase(vec![Output::new(50, None)], vec![]);
        let mut block = Block::new(
            BlockContent::new(vec![coinbase.clone()]),
            max_target(),
            Hash256::zero(),
        );
        block.mine(max_target());

        let next = block
            .validate(&UtxoSnapshot::empty(), 50)
            .expect("coinbase within ceiling validates");
        assert_eq!(next.len(), 1);
        assert!(next.contains(&OutPoint::new(coinbase.hash().unwrap(), 0)));
    }

    #[test]
    fn over_mint_coinbase_is_rejected() {
        let coinbase = Transaction::coinbase(vec![Output::new(100, None)], vec![]);
        let mut block = Block::new(BlockContent::new(vec![coinbase]), max_target(), Hash256::zero());
        block.mine(max_target());

        assert!(block.validate(&UtxoSnapshot::empty(), 50).is_none());
    }

    #[test]
    fn unsatisfied_pow_is_rejected() {
        let coinbase = Transaction::coinbase(vec![Output::new(50, None)], vec![]);
        // A tiny target, not mined for: will not satisfy `hash() < target`.
        let tiny_target = Hash256::from_bytes([0x00; 32]);
        let block = Block::new(BlockContent::new(vec![coinbase]), tiny_target, Hash256::zero());

        assert!(block.validate(&UtxoSnapshot::empty(), 50).is_none());
    }

    #[test]
    fn later_tx_may_spend_earlier_tx_in_same_block() {
        let coinbase = Transaction::coinbase(vec![Output::new(50, None)], vec![]);
        let coinbase_hash = coinbase.hash().unwrap();
        let spend = Transaction::new(
            vec![crate::transaction::Input::new(coinbase_hash, 0, vec![])],
            vec![Output::new(50, None)],
            vec![],
        );

        let mut block = Block::new(
            BlockContent::new(vec![coinbase, spend]),
            max_target(),
            Hash256::zero(),
        );
        block.mine(max_target());

        let next = block
            .validate(&UtxoSnapshot::empty(), 50)
            .expect("in-block spend validates");
        assert_eq!(next.len(), 1);
    }
}
