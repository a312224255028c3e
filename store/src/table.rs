//! The fixed set of tables the chain database persists.

use std::fmt;

/// A logical table. Each backend maps a table to one named database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Schema version and other bookkeeping.
    Meta,
    /// Signed blocks keyed by block id, canonical or not.
    Blocks,
    /// Canonical block log: big-endian block number → block id.
    BlockNumbers,
    /// Per-block summaries (fees, pay) keyed by block id.
    BlockSummaries,
    /// Fork database entries keyed by block id.
    ForkData,
    /// Undo deltas keyed by block id, kept for the retention depth.
    UndoStates,
    Accounts,
    Assets,
    Balances,
    Slates,
    /// Slot records keyed by big-endian timestamp.
    Slots,
    /// Transaction index keyed by transaction id.
    Transactions,
    /// Chain properties (head, seed, active delegates) keyed by name.
    Properties,
}

impl Table {
    pub const ALL: [Table; 13] = [
        Table::Meta,
        Table::Blocks,
        Table::BlockNumbers,
        Table::BlockSummaries,
        Table::ForkData,
        Table::UndoStates,
        Table::Accounts,
        Table::Assets,
        Table::Balances,
        Table::Slates,
        Table::Slots,
        Table::Transactions,
        Table::Properties,
    ];

    /// Storage name of this table.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Meta => "meta",
            Table::Blocks => "blocks",
            Table::BlockNumbers => "block_numbers",
            Table::BlockSummaries => "block_summaries",
            Table::ForkData => "fork_data",
            Table::UndoStates => "undo_states",
            Table::Accounts => "accounts",
            Table::Assets => "assets",
            Table::Balances => "balances",
            Table::Slates => "slates",
            Table::Slots => "slots",
            Table::Transactions => "transactions",
            Table::Properties => "properties",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_names_are_unique() {
        let names: HashSet<_> = Table::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), Table::ALL.len());
    }
}
