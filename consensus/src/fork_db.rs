//! The fork database: every known block and how it links to the chain.
//!
//! A block is *linked* when every ancestor down to genesis is known,
//! *included* when it is part of the current canonical chain, and *valid*
//! once it has been applied successfully (`None` until tried). A block
//! whose `previous` is unknown gets a placeholder entry for the parent so
//! the subtree links as soon as the parent arrives.
//!
//! Only metadata lives here; block bodies are stored by the caller.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use dpos_types::BlockId;
use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEntry {
    pub block_id: BlockId,
    pub previous: BlockId,
    /// For placeholders, one less than the number of the child that
    /// referenced it.
    pub block_num: u32,
    pub next_blocks: BTreeSet<BlockId>,
    pub is_linked: bool,
    pub is_included: bool,
    /// False for placeholders.
    pub is_known: bool,
    pub is_valid: Option<bool>,
    pub invalid_reason: Option<String>,
    /// Arrival order; earlier blocks win ties.
    pub first_seen: u64,
}

impl ForkEntry {
    fn placeholder(block_id: BlockId, block_num: u32, first_seen: u64) -> Self {
        Self {
            block_id,
            previous: BlockId::ZERO,
            block_num,
            next_blocks: BTreeSet::new(),
            is_linked: false,
            is_included: false,
            is_known: false,
            is_valid: None,
            invalid_reason: None,
            first_seen,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.is_valid == Some(false)
    }
}

/// Result of inserting a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// False if the block was already known.
    pub inserted: bool,
    /// Blocks that became linked, in breadth-first order from the inserted one.
    pub newly_linked: Vec<BlockId>,
}

/// Path from the canonical chain to a fork tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkHistory {
    /// Deepest included ancestor of the tip.
    pub ancestor: BlockId,
    /// Blocks to apply after `ancestor`, oldest first. Ends with the tip.
    pub blocks: Vec<BlockId>,
}

#[derive(Clone, Debug)]
pub struct ForkDatabase {
    entries: HashMap<BlockId, ForkEntry>,
    by_num: BTreeMap<u32, BTreeSet<BlockId>>,
    next_seq: u64,
    dirty: BTreeSet<BlockId>,
    removed: BTreeSet<BlockId>,
}

impl ForkDatabase {
    /// A database holding only the genesis root (`BlockId::ZERO`, number 0).
    pub fn new() -> Self {
        let mut db = Self {
            entries: HashMap::new(),
            by_num: BTreeMap::new(),
            next_seq: 0,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        };
        let root = ForkEntry {
            is_linked: true,
            is_included: true,
            is_known: true,
            is_valid: Some(true),
            ..ForkEntry::placeholder(BlockId::ZERO, 0, 0)
        };
        db.put(root);
        db.next_seq = 1;
        db
    }

    /// Rebuild from persisted entries. The genesis root is re-created if
    /// missing.
    pub fn from_entries(entries: impl IntoIterator<Item = ForkEntry>) -> Self {
        let mut db = Self::new();
        for entry in entries {
            db.next_seq = db.next_seq.max(entry.first_seen + 1);
            db.put(entry);
        }
        db.dirty.clear();
        db
    }

    fn put(&mut self, entry: ForkEntry) {
        self.by_num.entry(entry.block_num).or_default().insert(entry.block_id);
        self.dirty.insert(entry.block_id);
        self.removed.remove(&entry.block_id);
        self.entries.insert(entry.block_id, entry);
    }

    fn update(&mut self, id: &BlockId, f: impl FnOnce(&mut ForkEntry)) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                f(entry);
                self.dirty.insert(*id);
                true
            }
            None => false,
        }
    }

    fn seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn get(&self, id: &BlockId) -> Option<&ForkEntry> {
        self.entries.get(id)
    }

    pub fn is_known(&self, id: &BlockId) -> bool {
        self.entries.get(id).is_some_and(|e| e.is_known)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ForkEntry> {
        self.entries.values()
    }

    /// Entries at `block_num`, in arrival order.
    pub fn at_height(&self, block_num: u32) -> Vec<&ForkEntry> {
        let mut at: Vec<&ForkEntry> = self
            .by_num
            .get(&block_num)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
            .collect();
        at.sort_by_key(|e| (e.first_seen, e.block_id));
        at
    }

    /// Entries with block numbers in `first..=last`, ascending.
    pub fn range(&self, first: u32, last: u32) -> Vec<&ForkEntry> {
        if first > last {
            return Vec::new();
        }
        self.by_num
            .range(first..=last)
            .flat_map(|(num, _)| self.at_height(*num))
            .collect()
    }

    /// The number a child of `previous` must carry, if `previous` is a
    /// known block.
    pub fn expected_child_number(&self, previous: &BlockId) -> Option<u32> {
        self.entries
            .get(previous)
            .filter(|e| e.is_known)
            .map(|e| e.block_num.saturating_add(1))
    }

    /// Register a block. Links it, and every waiting descendant, if its
    /// parent is linked. A block below an invalid parent is invalid too, as
    /// is a waiting child whose number does not follow the block's.
    pub fn insert(
        &mut self,
        block_id: BlockId,
        previous: BlockId,
        block_num: u32,
    ) -> InsertOutcome {
        if self.is_known(&block_id) {
            return InsertOutcome::default();
        }

        let seq = self.seq();
        let mut entry = match self.entries.remove(&block_id) {
            Some(placeholder) => {
                if let Some(ids) = self.by_num.get_mut(&placeholder.block_num) {
                    ids.remove(&block_id);
                }
                placeholder
            }
            None => ForkEntry::placeholder(block_id, block_num, seq),
        };
        entry.previous = previous;
        entry.block_num = block_num;
        entry.is_known = true;
        entry.first_seen = seq;

        if !self.entries.contains_key(&previous) {
            let parent_seq = self.seq();
            self.put(ForkEntry::placeholder(previous, block_num.saturating_sub(1), parent_seq));
        }
        let parent_invalid = self.entries.get(&previous).is_some_and(|p| p.is_invalid());
        let parent_linked = self.entries.get(&previous).is_some_and(|p| p.is_linked);
        self.update(&previous, |p| {
            p.next_blocks.insert(block_id);
        });
        if parent_invalid {
            entry.is_valid = Some(false);
            entry.invalid_reason = Some("descends from an invalid block".into());
        }
        let misnumbered: Vec<BlockId> = entry
            .next_blocks
            .iter()
            .filter(|c| {
                self.entries
                    .get(*c)
                    .is_some_and(|c| c.block_num != block_num.saturating_add(1))
            })
            .copied()
            .collect();
        self.put(entry);
        for child in misnumbered {
            self.mark_invalid(&child, "block number does not follow its parent");
        }

        let newly_linked = if parent_linked {
            self.link_from(block_id)
        } else {
            Vec::new()
        };
        InsertOutcome {
            inserted: true,
            newly_linked,
        }
    }

    fn link_from(&mut self, start: BlockId) -> Vec<BlockId> {
        let mut linked = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            if !entry.is_known || entry.is_linked {
                continue;
            }
            let children: Vec<BlockId> = entry.next_blocks.iter().copied().collect();
            self.update(&id, |e| e.is_linked = true);
            linked.push(id);
            queue.extend(children);
        }
        linked
    }

    /// Linked known blocks without linked, known and not-invalid children,
    /// reachable from `from`. Candidates for a chain switch.
    pub fn tips(&self, from: &[BlockId]) -> Vec<BlockId> {
        let extends = |child: &BlockId| {
            self.entries
                .get(child)
                .is_some_and(|c| c.is_known && c.is_linked && !c.is_invalid())
        };
        from.iter()
            .copied()
            .filter(|id| {
                self.entries.get(id).is_some_and(|e| {
                    e.is_linked && e.is_known && !e.next_blocks.iter().any(&extends)
                })
            })
            .collect()
    }

    /// Every linked, not-invalid tip in the database.
    pub fn all_tips(&self) -> Vec<BlockId> {
        let linked: Vec<BlockId> = self
            .entries
            .values()
            .filter(|e| e.is_linked && e.is_known && !e.is_invalid())
            .map(|e| e.block_id)
            .collect();
        self.tips(&linked)
    }

    /// Order candidate tips: highest number first, then earliest seen, then
    /// ascending id. Invalid tips are dropped.
    pub fn rank_candidates(&self, mut tips: Vec<BlockId>) -> Vec<BlockId> {
        tips.retain(|id| self.entries.get(id).is_some_and(|e| !e.is_invalid()));
        tips.sort_by(|a, b| {
            let (ea, eb) = (&self.entries[a], &self.entries[b]);
            eb.block_num
                .cmp(&ea.block_num)
                .then(ea.first_seen.cmp(&eb.first_seen))
                .then(a.cmp(b))
        });
        tips
    }

    /// Walk back from `tip` to its deepest included ancestor.
    pub fn history(&self, tip: &BlockId) -> Result<ForkHistory, ConsensusError> {
        let mut blocks = Vec::new();
        let mut cursor = *tip;
        loop {
            let entry = self
                .entries
                .get(&cursor)
                .ok_or(ConsensusError::UnknownBlock(cursor))?;
            if entry.is_included {
                blocks.reverse();
                return Ok(ForkHistory {
                    ancestor: cursor,
                    blocks,
                });
            }
            if !entry.is_known || !entry.is_linked {
                return Err(ConsensusError::Unlinked(*tip));
            }
            blocks.push(cursor);
            cursor = entry.previous;
        }
    }

    pub fn set_included(&mut self, id: &BlockId, included: bool) {
        self.update(id, |e| e.is_included = included);
    }

    pub fn mark_valid(&mut self, id: &BlockId) {
        self.update(id, |e| {
            e.is_valid = Some(true);
            e.invalid_reason = None;
        });
    }

    /// Mark `id` and every known descendant invalid. Returns how many
    /// entries were marked.
    pub fn mark_invalid(&mut self, id: &BlockId, reason: &str) -> usize {
        let mut marked = 0;
        let mut queue = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            let Some(entry) = self.entries.get(&current) else {
                continue;
            };
            let children: Vec<BlockId> = entry.next_blocks.iter().copied().collect();
            let why = if current == *id {
                reason.to_string()
            } else {
                format!("descends from invalid block {}", id)
            };
            self.update(&current, |e| {
                e.is_valid = Some(false);
                e.invalid_reason = Some(why);
            });
            marked += 1;
            queue.extend(children);
        }
        marked
    }

    /// Reset a block to untried so it is considered again.
    pub fn clear_validity(&mut self, id: &BlockId) {
        self.update(id, |e| {
            e.is_valid = None;
            e.invalid_reason = None;
        });
    }

    /// Linked blocks never tried (`is_valid == None`) and not included.
    pub fn untried(&self) -> Vec<BlockId> {
        self.entries
            .values()
            .filter(|e| e.is_known && e.is_linked && !e.is_included && e.is_valid.is_none())
            .map(|e| e.block_id)
            .collect()
    }

    /// Heights with more than one known block. Only those heights form forks.
    pub fn forks(&self) -> BTreeMap<u32, Vec<ForkEntry>> {
        self.by_num
            .keys()
            .filter_map(|num| {
                let known: Vec<ForkEntry> = self
                    .at_height(*num)
                    .into_iter()
                    .filter(|e| e.is_known)
                    .cloned()
                    .collect();
                (known.len() > 1).then_some((*num, known))
            })
            .collect()
    }

    /// Drop every entry numbered below `cutoff`. Returns the removed
    /// entries that were not part of the canonical chain, whose block
    /// bodies the caller may discard.
    pub fn prune_below(&mut self, cutoff: u32) -> Vec<BlockId> {
        let nums: Vec<u32> = self.by_num.range(..cutoff).map(|(n, _)| *n).collect();
        let mut stale = Vec::new();
        for num in nums {
            let Some(ids) = self.by_num.remove(&num) else {
                continue;
            };
            for id in ids {
                if id.is_zero() {
                    // The genesis root anchors the tree.
                    self.by_num.entry(0).or_default().insert(id);
                    continue;
                }
                if let Some(entry) = self.entries.remove(&id) {
                    self.dirty.remove(&id);
                    self.removed.insert(id);
                    if entry.is_known && !entry.is_included {
                        stale.push(id);
                    }
                }
            }
        }
        stale
    }

    /// Drop unlinked entries, waiting blocks and placeholders, numbered
    /// above `limit`. Returns the removed known blocks.
    pub fn prune_unlinked_above(&mut self, limit: u32) -> Vec<BlockId> {
        let doomed: Vec<BlockId> = self
            .by_num
            .range(limit.saturating_add(1)..)
            .flat_map(|(_, ids)| ids.iter().copied())
            .filter(|id| self.entries.get(id).is_some_and(|e| !e.is_linked))
            .collect();
        if doomed.is_empty() {
            return Vec::new();
        }
        let mut stale = Vec::new();
        for id in &doomed {
            let Some(entry) = self.entries.remove(id) else {
                continue;
            };
            if let Some(ids) = self.by_num.get_mut(&entry.block_num) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_num.remove(&entry.block_num);
                }
            }
            self.dirty.remove(id);
            self.removed.insert(*id);
            if entry.is_known {
                stale.push(*id);
            }
        }
        // Parents at or below the limit forget the removed children; a
        // placeholder left without children goes too.
        let parents: Vec<BlockId> = self
            .entries
            .values()
            .filter(|e| e.next_blocks.iter().any(|c| doomed.contains(c)))
            .map(|e| e.block_id)
            .collect();
        for parent in parents {
            self.update(&parent, |e| e.next_blocks.retain(|c| !doomed.contains(c)));
            let orphaned = self
                .entries
                .get(&parent)
                .is_some_and(|e| !e.is_known && e.next_blocks.is_empty());
            if orphaned {
                if let Some(entry) = self.entries.remove(&parent) {
                    if let Some(ids) = self.by_num.get_mut(&entry.block_num) {
                        ids.remove(&parent);
                    }
                    self.dirty.remove(&parent);
                    self.removed.insert(parent);
                }
            }
        }
        stale
    }

    /// Entries changed and removed since the last call, for persistence.
    pub fn take_changes(&mut self) -> (Vec<ForkEntry>, Vec<BlockId>) {
        let changed = std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|id| self.entries.get(&id).cloned())
            .collect();
        let removed = std::mem::take(&mut self.removed).into_iter().collect();
        (changed, removed)
    }
}

impl Default for ForkDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> BlockId {
        BlockId::new([n; 32])
    }

    /// genesis ← 1 ← 2 ← 3, and 1 ← 12 (a fork at height 2).
    fn chain() -> ForkDatabase {
        let mut db = ForkDatabase::new();
        db.insert(id(1), BlockId::ZERO, 1);
        db.insert(id(2), id(1), 2);
        db.insert(id(3), id(2), 3);
        db.insert(id(12), id(1), 2);
        db
    }

    #[test]
    fn insert_links_to_genesis() {
        let mut db = ForkDatabase::new();
        let out = db.insert(id(1), BlockId::ZERO, 1);
        assert!(out.inserted);
        assert_eq!(out.newly_linked, vec![id(1)]);
        assert!(db.get(&id(1)).unwrap().is_linked);
        assert!(db.get(&BlockId::ZERO).unwrap().next_blocks.contains(&id(1)));
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut db = chain();
        let before = db.len();
        let out = db.insert(id(2), id(1), 2);
        assert!(!out.inserted);
        assert_eq!(db.len(), before);
    }

    #[test]
    fn placeholder_links_subtree_on_arrival() {
        let mut db = ForkDatabase::new();
        db.insert(id(2), id(1), 2);
        db.insert(id(3), id(2), 3);
        let placeholder = db.get(&id(1)).unwrap();
        assert!(!placeholder.is_known);
        assert_eq!(placeholder.block_num, 1);
        assert!(!db.get(&id(3)).unwrap().is_linked);

        let out = db.insert(id(1), BlockId::ZERO, 1);
        assert_eq!(out.newly_linked, vec![id(1), id(2), id(3)]);
        assert_eq!(db.tips(&out.newly_linked), vec![id(3)]);
        assert!(db.get(&id(1)).unwrap().is_known);
    }

    #[test]
    fn history_walks_back_to_included_ancestor() {
        let mut db = chain();
        for n in [1, 2, 3] {
            db.set_included(&id(n), true);
        }
        let history = db.history(&id(12)).unwrap();
        assert_eq!(history.ancestor, id(1));
        assert_eq!(history.blocks, vec![id(12)]);

        let mut db = chain();
        let history = db.history(&id(3)).unwrap();
        assert_eq!(history.ancestor, BlockId::ZERO);
        assert_eq!(history.blocks, vec![id(1), id(2), id(3)]);

        db.insert(id(40), id(39), 40);
        assert!(matches!(db.history(&id(40)), Err(ConsensusError::Unlinked(_))));
    }

    #[test]
    fn invalid_marks_propagate_to_descendants() {
        let mut db = chain();
        assert_eq!(db.mark_invalid(&id(2), "bad signer"), 2);
        assert_eq!(db.get(&id(2)).unwrap().invalid_reason.as_deref(), Some("bad signer"));
        assert!(db.get(&id(3)).unwrap().is_invalid());
        assert!(!db.get(&id(12)).unwrap().is_invalid());

        // Late children of an invalid block are invalid on arrival.
        db.insert(id(4), id(3), 4);
        assert!(db.get(&id(4)).unwrap().is_invalid());
        assert_eq!(db.all_tips(), vec![id(12)]);
    }

    #[test]
    fn candidates_rank_by_height_then_arrival() {
        let mut db = chain();
        db.insert(id(13), id(12), 3);
        let ranked = db.rank_candidates(vec![id(13), id(3), id(12)]);
        // 3 and 13 share height 3; 3 arrived first.
        assert_eq!(ranked, vec![id(3), id(13), id(12)]);
    }

    #[test]
    fn forks_lists_contested_heights() {
        let db = chain();
        let forks = db.forks();
        assert_eq!(forks.len(), 1);
        let at_two: Vec<BlockId> = forks[&2].iter().map(|e| e.block_id).collect();
        assert_eq!(at_two, vec![id(2), id(12)]);
    }

    #[test]
    fn prune_reports_stale_blocks() {
        let mut db = chain();
        for n in [1, 2, 3] {
            db.set_included(&id(n), true);
        }
        db.take_changes();
        let stale = db.prune_below(3);
        assert_eq!(stale, vec![id(12)]);
        assert!(db.get(&id(1)).is_none());
        assert!(db.get(&BlockId::ZERO).is_some());
        let (_, removed) = db.take_changes();
        assert_eq!(removed.len(), 3);
    }

    #[test]
    fn expected_child_number_needs_a_known_parent() {
        let mut db = chain();
        assert_eq!(db.expected_child_number(&BlockId::ZERO), Some(1));
        assert_eq!(db.expected_child_number(&id(12)), Some(3));
        db.insert(id(40), id(39), 40);
        // id(39) is only a placeholder.
        assert_eq!(db.expected_child_number(&id(39)), None);
        assert_eq!(db.expected_child_number(&id(77)), None);
    }

    #[test]
    fn waiting_child_with_wrong_number_is_invalid_once_parent_arrives() {
        let mut db = ForkDatabase::new();
        db.insert(id(9), id(1), 9);
        assert_eq!(db.get(&id(1)).unwrap().block_num, 8);

        db.insert(id(1), BlockId::ZERO, 1);
        assert!(db.get(&id(9)).unwrap().is_invalid());
        assert!(!db.get(&id(1)).unwrap().is_invalid());
        assert_eq!(db.all_tips(), vec![id(1)]);
    }

    #[test]
    fn unlinked_entries_beyond_the_limit_are_dropped() {
        let mut db = chain();
        db.insert(id(60), id(59), 60);
        db.insert(id(61), id(60), 61);
        db.insert(id(41), id(88), 41);
        db.insert(id(30), id(29), 30);
        db.take_changes();

        let mut stale = db.prune_unlinked_above(40);
        stale.sort();
        assert_eq!(stale, vec![id(41), id(60), id(61)]);
        assert!(db.get(&id(59)).is_none());
        // Numbered at the limit, but left without children.
        assert!(db.get(&id(88)).is_none());
        // Linked blocks and unlinked ones under the limit stay.
        assert!(db.get(&id(3)).is_some());
        assert!(db.get(&id(30)).is_some());
        assert!(db.get(&id(29)).is_some());
        let (_, removed) = db.take_changes();
        assert_eq!(removed.len(), 5);

        assert!(db.prune_unlinked_above(40).is_empty());
    }

    #[test]
    fn rebuild_from_entries_resumes_sequence() {
        let mut db = chain();
        let (changed, _) = db.take_changes();
        let mut rebuilt = ForkDatabase::from_entries(changed);
        assert_eq!(rebuilt.len(), db.len());
        rebuilt.insert(id(13), id(12), 3);
        let seen_13 = rebuilt.get(&id(13)).unwrap().first_seen;
        assert!(db.entries().all(|e| e.first_seen < seen_13));
    }
}
