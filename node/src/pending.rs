//! The pending transaction pool.
//!
//! Holds validated transactions in arrival order until a block includes
//! them. The pool itself only stores; validation against the head state
//! happens in the chain engine.

use std::collections::{HashSet, VecDeque};

use dpos_transactions::SignedTransaction;
use dpos_types::{Amount, Timestamp, TxId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub id: TxId,
    pub transaction: SignedTransaction,
    pub fee: Amount,
    pub received: Timestamp,
}

#[derive(Clone, Debug)]
pub struct PendingPool {
    queue: VecDeque<PendingTransaction>,
    ids: HashSet<TxId>,
    capacity: usize,
}

impl PendingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.ids.contains(id)
    }

    /// Append at the back. Returns false for a duplicate.
    pub fn push(&mut self, tx: PendingTransaction) -> bool {
        if !self.ids.insert(tx.id) {
            return false;
        }
        self.queue.push_back(tx);
        true
    }

    /// Re-queue transactions of a popped block ahead of everything else,
    /// keeping their block order.
    pub fn requeue_front(&mut self, txs: Vec<PendingTransaction>) {
        for tx in txs.into_iter().rev() {
            if self.ids.insert(tx.id) {
                self.queue.push_front(tx);
            }
        }
    }

    /// Drop every transaction in `ids`.
    pub fn remove_all(&mut self, ids: &HashSet<TxId>) {
        if ids.is_empty() {
            return;
        }
        self.queue.retain(|t| !ids.contains(&t.id));
        self.ids.retain(|id| !ids.contains(id));
    }

    /// Take every transaction out, leaving the pool empty.
    pub fn drain(&mut self) -> Vec<PendingTransaction> {
        self.ids.clear();
        self.queue.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u8) -> PendingTransaction {
        PendingTransaction {
            id: TxId::new([n; 32]),
            transaction: SignedTransaction::new(Timestamp::new(n as u64), Vec::new()),
            fee: Amount::ZERO,
            received: Timestamp::new(0),
        }
    }

    #[test]
    fn keeps_arrival_order_and_rejects_duplicates() {
        let mut pool = PendingPool::new(10);
        assert!(pool.push(tx(1)));
        assert!(pool.push(tx(2)));
        assert!(!pool.push(tx(1)));
        let ids: Vec<TxId> = pool.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TxId::new([1; 32]), TxId::new([2; 32])]);
    }

    #[test]
    fn requeued_transactions_go_first() {
        let mut pool = PendingPool::new(10);
        pool.push(tx(3));
        pool.requeue_front(vec![tx(1), tx(2), tx(3)]);
        let ids: Vec<u8> = pool.iter().map(|t| t.id.as_bytes()[0]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn remove_and_drain() {
        let mut pool = PendingPool::new(2);
        pool.push(tx(1));
        pool.push(tx(2));
        assert!(pool.is_full());
        pool.remove_all(&HashSet::from([TxId::new([1; 32])]));
        assert!(!pool.contains(&TxId::new([1; 32])));
        assert_eq!(pool.len(), 1);

        let drained = pool.drain();
        assert_eq!(drained.len(), 1);
        assert!(pool.is_empty());
        assert!(pool.push(tx(2)));
    }
}
