use thiserror::Error;

/// Errors produced while hashing or mining ledger state.
///
/// Consensus-facing operations (`Transaction::validate`, `Block::validate`,
/// `Blockchain::extend`) never propagate these to their callers — they are
/// collapsed into the `bool`/`Option` outcomes the engine's public surface
/// defines, per the "no error escapes the engine boundary" rule. They are
/// exposed here for the operations (hashing, mining) whose external contract
/// is fallible.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("nonce space exhausted before a solution was found")]
    NonceSpaceExhausted,
}
