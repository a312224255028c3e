//! Span constructors for chain database operations.
//!
//! Consistent span names and fields make it easy to filter and correlate
//! a block's push, the chain switch it triggers and the transactions it
//! applies.

use dpos_types::{BlockId, TxId};
use tracing::{debug_span, info_span, Span};

/// A block submitted to the chain database.
pub fn block_push_span(block_id: &BlockId, block_num: u32) -> Span {
    info_span!("block_push", id = %block_id, num = block_num)
}

/// Switching the head to the fork ending in `tip`.
pub fn chain_switch_span(tip: &BlockId, from_head: u32) -> Span {
    info_span!("chain_switch", tip = %tip, from = from_head)
}

/// Applying a single block on top of the head.
pub fn block_apply_span(block_id: &BlockId, block_num: u32) -> Span {
    debug_span!("block_apply", id = %block_id, num = block_num)
}

/// A transaction entering the pending pool.
pub fn transaction_span(tx_id: &TxId) -> Span {
    debug_span!("transaction", id = %tx_id)
}

/// Local production of the block for `timestamp`.
pub fn produce_span(timestamp: u64) -> Span {
    info_span!("produce_block", timestamp)
}
