use dpos_ledger::DelegatePay;
use dpos_types::{AccountId, Amount, BlockId, Timestamp};
use serde::{Deserialize, Serialize};

/// What applying a block did. Recorded for every block on the canonical
/// chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: BlockId,
    pub block_num: u32,
    pub timestamp: Timestamp,
    pub signer: AccountId,
    pub transaction_count: u32,
    /// Base-asset fees paid by the block's transactions.
    pub fees: Amount,
    pub delegate_pay: DelegatePay,
    /// Delegates whose slots between the previous block and this one stayed
    /// empty.
    pub missed_delegates: Vec<AccountId>,
}
