//! A binary Merkle tree over hashable leaves, using zero-padding (not
//! leaf duplication) to close out odd levels.

use ledger_shared::Hash256;

/// A leaf that can contribute a 256-bit identity hash to a `MerkleTree`.
pub trait MerkleHashable {
    /// # Errors
    ///
    /// Propagates `ChainError::SerializationError` if the leaf's own
    /// encoding fails.
    fn leaf_hash(&self) -> ledger_shared::Result<Hash256>;
}

/// An ordered list of leaves and the Merkle root they commit to.
#[derive(Debug, Clone)]
pub struct MerkleTree<T> {
    leaves: Vec<T>,
}

impl<T: MerkleHashable> MerkleTree<T> {
    #[must_use]
    pub fn new(leaves: Vec<T>) -> Self {
        Self { leaves }
    }

    #[must_use]
    pub fn leaves(&self) -> &[T] {
        &self.leaves
    }

    /// Computes the root, per the zero-padding algorithm: an empty tree
    /// roots to zero, a single leaf roots to its own hash, and any odd
    /// level is padded with a zero hash (not a duplicated sibling) before
    /// pairing.
    ///
    /// # Errors
    ///
    /// Propagates the first leaf's `SerializationError`, if any.
    pub fn root(&self) -> ledger_shared::Result<Hash256> {
        if self.leaves.is_empty() {
            return Ok(Hash256::zero());
        }

        let mut level: Vec<Hash256> = self
            .leaves
            .iter()
            .map(MerkleHashable::leaf_hash)
            .collect::<ledger_shared::Result<_>>()?;
        if level.len() == 1 {
            return Ok(level[0]);
        }

        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(Hash256::zero());
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut data = Vec::with_capacity(64);
                    data.extend_from_slice(pair[0].as_bytes());
                    data.extend_from_slice(pair[1].as_bytes());
                    Hash256::sha256(&data)
                })
                .collect();
        }

        Ok(level[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RawLeaf(Hash256);

    impl MerkleHashable for RawLeaf {
        fn leaf_hash(&self) -> ledger_shared::Result<Hash256> {
            Ok(self.0)
        }
    }

    fn leaf_from_decimal(decimal: &str) -> Hash256 {
        let value: num_bigint::BigUint = decimal.parse().expect("valid decimal");
        let mut bytes = value.to_bytes_be();
        assert!(bytes.len() <= 32, "test vector exceeds 32 bytes");
        let mut padded = vec![0u8; 32 - bytes.len()];
        padded.append(&mut bytes);
        Hash256::from_bytes(padded.try_into().unwrap())
    }

    #[test]
    fn empty_tree_roots_to_zero() {
        let tree: MerkleTree<RawLeaf> = MerkleTree::new(vec![]);
        assert_eq!(tree.root().unwrap(), Hash256::zero());
    }

    #[test]
    fn single_leaf_roots_to_its_own_hash() {
        let leaf = leaf_from_decimal(
            "106874969902263813231722716312951672277654786095989753245644957127312510061509",
        );
        let tree = MerkleTree::new(vec![RawLeaf(leaf)]);
        assert_eq!(tree.root().unwrap(), leaf);
        assert_eq!(
            tree.root().unwrap().to_string(),
            "ec4916dd28fc4c10d78e287ca5d9cc51ee1ae73cbfde08c6b37324cbfaac8bc5"
        );
    }

    #[test]
    fn three_leaf_tree_pads_with_zero_not_duplicate() {
        let leaves = [
            "106874969902263813231722716312951672277654786095989753245644957127312510061509",
            "66221123338548294768926909213040317907064779196821799240800307624498097778386",
            "98188062817386391176748233602659695679763360599522475501622752979264247167302",
        ]
        .into_iter()
        .map(|d| RawLeaf(leaf_from_decimal(d)))
        .collect();

        let tree = MerkleTree::new(leaves);
        assert_eq!(
            tree.root().unwrap().to_string(),
            "ea670d796aa1f950025c4d9e7caf6b92a5c56ebeb37b95b072ca92bc99011c20"
        );
    }

    #[test]
    fn root_is_order_sensitive() {
        let a = RawLeaf(Hash256::sha256(b"a"));
        let b = RawLeaf(Hash256::sha256(b"b"));
        let c = RawLeaf(Hash256::sha256(b"c"));

        let forward = MerkleTree::new(vec![
            RawLeaf(a.0),
            RawLeaf(b.0),
            RawLeaf(c.0),
        ])
        .root()
        .unwrap();
        let swapped = MerkleTree::new(vec![RawLeaf(b.0), RawLeaf(a.0), RawLeaf(c.0)])
            .root()
            .unwrap();

        assert_ne!(forward, swapped);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn swapping_two_distinct_leaves_changes_the_root(
            seeds in proptest::collection::vec(any::<[u8; 4]>(), 4..8),
        ) {
            let leaves: Vec<RawLeaf> = seeds.iter().map(|s| RawLeaf(Hash256::sha256(s))).collect();
            let mut distinct_hashes = leaves.iter().map(|l| l.0).collect::<Vec<_>>();
            distinct_hashes.sort();
            distinct_hashes.dedup();
            proptest::prop_assume!(distinct_hashes.len() >= 2);

            let original = MerkleTree::new(
                leaves.iter().map(|l| RawLeaf(l.0)).collect(),
            )
            .root()
            .unwrap();

            let mut swapped_raw = leaves.iter().map(|l| l.0).collect::<Vec<_>>();
            swapped_raw.swap(0, 1);
            if swapped_raw[0] == swapped_raw[1] {
                return Ok(());
            }
            let swapped = MerkleTree::new(swapped_raw.into_iter().map(RawLeaf).collect())
                .root()
                .unwrap();

            prop_assert_ne!(original, swapped);
        }
    }
}
