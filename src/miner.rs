//! Proof-of-work mining.
//!
//! A block is sealed once the hex form of its hash starts with
//! `difficulty` zero digits. Each extra digit multiplies the expected work
//! by 16. Mining is a synchronous local search with no timeout.

use crate::blockchain::Block;
use crate::crypto::Sha256Hash;
use tracing::{debug, trace};

/// Widest difficulty that can ever be met: one zero per hex digit of a SHA-256 hash.
pub const MAX_DIFFICULTY: u32 = 64;

const PROGRESS_INTERVAL: u64 = 100_000;

/// Number of leading `0` hex digits in `hash`.
pub fn leading_zero_digits(hash: &Sha256Hash) -> u32 {
    let mut count = 0;
    for byte in hash {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

pub fn meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
    leading_zero_digits(hash) >= difficulty
}

/// Seals `block` by searching nonces upward from its current nonce.
///
/// The predicate is checked before the first increment, so difficulty 0
/// returns the block untouched. Callers must keep `difficulty` at or below
/// [`MAX_DIFFICULTY`]; the ledger enforces this at construction.
pub fn mine_block(mut block: Block, difficulty: u32) -> Block {
    block.hash = block.calculate_hash();
    let mut attempts: u64 = 0;

    while !meets_difficulty(&block.hash, difficulty) {
        block.nonce = block.nonce.wrapping_add(1);
        block.hash = block.calculate_hash();
        attempts += 1;
        if attempts % PROGRESS_INTERVAL == 0 {
            trace!(index = block.index, attempts, "still mining");
        }
    }

    debug!(
        index = block.index,
        nonce = block.nonce,
        attempts,
        hash = %hex::encode(block.hash),
        "block sealed"
    );
    block
}
