//! Integration tests exercising the full chain pipeline:
//! transaction submission → block production → fork switching →
//! persistence → restart.
//!
//! Several independent chain instances run side by side in one process to
//! simulate competing delegates on separate nodes.

use std::sync::Arc;

use dpos_consensus::{expected_signer, ConsensusError, ForkEntry};
use dpos_crypto::keypair_from_seed;
use dpos_ledger::{
    balance_id, GenesisAccount, GenesisAsset, GenesisBalance, GenesisConfig, GenesisDelegate,
    OpError, TrxError,
};
use dpos_node::{BlockError, ChainDatabase, ChainMetrics, ChainState, NodeError};
use dpos_nullables::{NullClock, NullStore};
use dpos_store_lmdb::{LmdbEnvironment, Migrator};
use dpos_transactions::{
    DepositOp, IssueAssetOp, Operation, RegisterAssetOp, SignedBlock, SignedTransaction,
    TransferOp,
};
use dpos_types::{
    AccountId, AccountRef, Address, Amount, AssetId, AssetRef, BlockRef, ChainId, ChainParams,
    Clock, ErrorKind, KeyPair, Timestamp,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const INTERVAL: u64 = 2;
const ALICE_ID: AccountId = AccountId(6);

fn delegate_keys() -> Vec<KeyPair> {
    (0..5u8).map(|i| keypair_from_seed(&[10 + i; 32])).collect()
}

fn alice() -> KeyPair {
    keypair_from_seed(&[1; 32])
}

fn bob() -> KeyPair {
    keypair_from_seed(&[2; 32])
}

/// Five delegates (ids 1-5) and `alice` (id 6) holding 1000 XTS.
fn genesis() -> GenesisConfig {
    GenesisConfig {
        timestamp: Timestamp::new(0),
        base_asset: GenesisAsset {
            symbol: "XTS".into(),
            name: "shares".into(),
            precision: 1,
            max_supply: Amount::new(1_000_000_000),
        },
        delegates: delegate_keys()
            .iter()
            .enumerate()
            .map(|(i, k)| GenesisDelegate {
                name: format!("init{}", i),
                owner_key: k.public,
                signing_key: None,
                pay_rate: 100,
            })
            .collect(),
        accounts: vec![GenesisAccount {
            name: "alice".into(),
            owner_key: alice().public,
        }],
        balances: vec![GenesisBalance {
            owner: alice().public,
            amount: Amount::new(1_000),
        }],
    }
}

fn slot(n: u64) -> Timestamp {
    Timestamp::new(n * INTERVAL)
}

fn base_balance_of(key: &KeyPair) -> dpos_types::BalanceId {
    balance_id(&Address::from_public_key(&key.public), AssetId::BASE, None)
}

fn transfer(
    chain_id: &ChainId,
    from: &KeyPair,
    to: &KeyPair,
    amount: u64,
    expiration: Timestamp,
) -> SignedTransaction {
    SignedTransaction::new(
        expiration,
        vec![Operation::Transfer(TransferOp {
            from: base_balance_of(from),
            to: Address::from_public_key(&to.public),
            amount: Amount::new(amount),
        })],
    )
    .signed(from, chain_id)
    .expect("sign transfer")
}

struct Node {
    clock: Arc<NullClock>,
    store: Arc<NullStore>,
    chain: ChainState,
}

impl Node {
    fn open() -> Self {
        Self::open_with(ChainParams::dev_defaults())
    }

    fn open_with(params: ChainParams) -> Self {
        let clock = Arc::new(NullClock::new(0));
        let store = Arc::new(NullStore::new());
        let chain = ChainState::open(
            store.clone(),
            &genesis(),
            params,
            clock.clone(),
            Arc::new(ChainMetrics::new().expect("metrics")),
        )
        .expect("open chain");
        Self {
            clock,
            store,
            chain,
        }
    }

    fn chain_id(&self) -> ChainId {
        *self.chain.chain_id()
    }

    /// Index into `delegate_keys()` of the delegate scheduled at `ts`.
    fn signer_index(&self, ts: Timestamp) -> usize {
        let id = expected_signer(&self.chain.round_delegates(), ts, INTERVAL).expect("signer");
        (id.0 - 1) as usize
    }

    /// Produce a block in slot `n` with whatever is pending.
    fn produce_at(&mut self, n: u64) -> SignedBlock {
        let ts = slot(n);
        self.clock.set(ts.as_secs());
        let keys = delegate_keys();
        let signer = &keys[self.signer_index(ts)];
        self.chain.produce_block(signer, ts).expect("produce block")
    }

    /// Push a block from another node, letting the clock catch up to it.
    fn receive(&mut self, block: &SignedBlock) -> Result<ForkEntry, BlockError> {
        let now = self.clock.now().as_secs().max(block.timestamp().as_secs());
        self.clock.set(now);
        self.chain.push_block(block.clone())
    }

    fn receive_all(&mut self, blocks: &[SignedBlock]) {
        for block in blocks {
            self.receive(block).expect("receive block");
        }
    }

    fn balance(&self, key: &KeyPair) -> Option<u64> {
        self.chain
            .get_balance(&base_balance_of(key))
            .map(|b| b.amount.raw())
    }

    fn state_hash(&self) -> [u8; 32] {
        self.chain.state_hash().expect("state hash")
    }
}

// ---------------------------------------------------------------------------
// 1. Transactions
// ---------------------------------------------------------------------------

#[test]
fn transfer_moves_balance_and_returns_receipt() {
    let mut node = Node::open();
    node.clock.set(1);
    let trx = transfer(&node.chain_id(), &alice(), &bob(), 300, Timestamp::new(600));
    let tx_id = node.chain.submit_transaction(trx).expect("accepted");
    assert_eq!(node.chain.pending_transactions().len(), 1);

    let block = node.produce_at(1);
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(node.chain.head_block_number(), 1);
    assert_eq!(node.balance(&alice()), Some(700));
    assert_eq!(node.balance(&bob()), Some(300));
    assert!(node.chain.pending_transactions().is_empty());

    let entry = node.chain.get_transaction(&tx_id).expect("indexed");
    assert_eq!(entry.location.block_num, 1);
    assert_eq!(entry.receipt.id, tx_id);

    let in_block = node
        .chain
        .get_block_transactions(BlockRef::Number(1))
        .expect("block transactions");
    assert!(in_block.contains_key(&tx_id));
}

#[test]
fn expired_transaction_is_rejected_without_state_change() {
    let mut node = Node::open();
    node.clock.set(100);
    let before = node.state_hash();
    let trx = transfer(&node.chain_id(), &alice(), &bob(), 300, Timestamp::new(99));

    let err = node.chain.submit_transaction(trx).unwrap_err();
    assert!(matches!(err, TrxError::Expired { .. }));
    assert_eq!(err.kind(), ErrorKind::Temporal);
    assert_eq!(node.state_hash(), before);
    assert!(node.chain.pending_transactions().is_empty());
}

#[test]
fn pending_pool_sees_earlier_pending_transactions() {
    let mut node = Node::open();
    node.clock.set(1);
    let chain_id = node.chain_id();
    node.chain
        .submit_transaction(transfer(&chain_id, &alice(), &bob(), 700, Timestamp::new(600)))
        .expect("first transfer");

    let overdraw = transfer(&chain_id, &alice(), &bob(), 400, Timestamp::new(601));
    let err = node.chain.submit_transaction(overdraw).unwrap_err();
    assert!(matches!(
        err,
        TrxError::Operation {
            source: OpError::InsufficientBalance { .. },
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::LedgerSemantic);
    // Validation against the pool never leaks into the head state.
    assert_eq!(node.balance(&alice()), Some(1_000));
    assert_eq!(node.chain.pending_transactions().len(), 1);
}

#[test]
fn duplicate_submission_is_rejected() {
    let mut node = Node::open();
    node.clock.set(1);
    let trx = transfer(&node.chain_id(), &alice(), &bob(), 10, Timestamp::new(600));
    node.chain.submit_transaction(trx.clone()).expect("first");
    assert!(matches!(
        node.chain.submit_transaction(trx.clone()),
        Err(TrxError::DuplicateTransaction(_))
    ));

    node.produce_at(1);
    assert!(matches!(
        node.chain.submit_transaction(trx),
        Err(TrxError::DuplicateTransaction(_))
    ));
}

#[test]
fn expiration_beyond_the_window_is_rejected() {
    let mut node = Node::open();
    node.clock.set(1);
    let max = ChainParams::dev_defaults().max_transaction_expiration_secs;
    let trx = transfer(&node.chain_id(), &alice(), &bob(), 10, Timestamp::new(1 + max + 1));

    let err = node.chain.submit_transaction(trx).unwrap_err();
    assert!(matches!(err, TrxError::ExpirationTooFar { max_secs, .. } if max_secs == max));
    assert_eq!(err.kind(), ErrorKind::Temporal);
    assert!(node.chain.pending_transactions().is_empty());

    let at_limit = transfer(&node.chain_id(), &alice(), &bob(), 10, Timestamp::new(1 + max));
    node.chain.submit_transaction(at_limit).expect("inside the window");
}

#[test]
fn full_pool_refuses_new_transactions() {
    let mut node = Node::open_with(ChainParams {
        max_pending_transactions: 2,
        ..ChainParams::dev_defaults()
    });
    node.clock.set(1);
    let chain_id = node.chain_id();
    for amount in [1, 2] {
        node.chain
            .submit_transaction(transfer(&chain_id, &alice(), &bob(), amount, Timestamp::new(600)))
            .expect("room in the pool");
    }

    let third = transfer(&chain_id, &alice(), &bob(), 3, Timestamp::new(600));
    let err = node.chain.submit_transaction(third.clone()).unwrap_err();
    assert_eq!(err, TrxError::PoolFull(2));
    assert_eq!(node.chain.pending_transactions().len(), 2);

    // A block drains the pool.
    node.produce_at(1);
    node.chain.submit_transaction(third).expect("pool drained");
}

#[test]
fn issuing_beyond_max_supply_is_rejected() {
    let mut node = Node::open();
    node.clock.set(1);
    let chain_id = node.chain_id();
    let alice = alice();
    let register = SignedTransaction::new(
        Timestamp::new(600),
        vec![Operation::RegisterAsset(RegisterAssetOp {
            symbol: "YYY".into(),
            name: "y shares".into(),
            issuer: ALICE_ID,
            precision: 1,
            max_supply: Amount::new(1_000),
        })],
    )
    .signed(&alice, &chain_id)
    .expect("sign");
    node.chain.submit_transaction(register).expect("register asset");
    node.produce_at(1);

    let asset = node.chain.get_asset(&AssetRef::from("YYY")).expect("registered");
    let issue = |amount: u64, expiration: u64| {
        SignedTransaction::new(
            Timestamp::new(expiration),
            vec![
                Operation::IssueAsset(IssueAssetOp {
                    asset_id: asset.id,
                    amount: Amount::new(amount),
                }),
                Operation::Deposit(DepositOp {
                    owner: Address::from_public_key(&alice.public),
                    asset_id: asset.id,
                    amount: Amount::new(amount),
                    slate: None,
                }),
            ],
        )
        .signed(&alice, &chain_id)
        .expect("sign")
    };

    let err = node.chain.submit_transaction(issue(1_001, 600)).unwrap_err();
    assert!(matches!(
        err,
        TrxError::Operation {
            index: 0,
            source: OpError::SupplyExceeded { .. }
        }
    ));
    assert_eq!(err.kind(), ErrorKind::LedgerSemantic);
    let unchanged = node.chain.get_asset(&AssetRef::Id(asset.id)).expect("asset");
    assert_eq!(unchanged.current_supply, Amount::ZERO);

    node.chain.submit_transaction(issue(1_000, 601)).expect("within supply");
    node.produce_at(2);
    let issued = node.chain.get_asset(&AssetRef::Id(asset.id)).expect("asset");
    assert_eq!(issued.current_supply, Amount::new(1_000));
    assert!(node.chain.audit_state().is_clean());
}

// ---------------------------------------------------------------------------
// 2. Scheduling
// ---------------------------------------------------------------------------

#[test]
fn wrong_delegate_block_is_rejected_and_never_adopted() {
    let mut node = Node::open();
    for n in 1..=3 {
        node.produce_at(n);
    }
    let ts = slot(4);
    node.clock.set(ts.as_secs());
    let keys = delegate_keys();
    let wrong = &keys[(node.signer_index(ts) + 1) % keys.len()];
    let forged =
        SignedBlock::build(4, node.chain.head_block_id(), ts, vec![], wrong).expect("build");
    let forged_id = forged.id().expect("id");

    let err = node.chain.push_block(forged.clone()).unwrap_err();
    assert!(matches!(
        err,
        BlockError::Consensus(ConsensusError::WrongDelegate { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(node.chain.head_block_number(), 3);
    assert!(node.chain.get_fork_entry(&forged_id).expect("entry").is_invalid());

    // A child of the rejected block inherits the verdict.
    let child = SignedBlock::build(5, forged_id, slot(5), vec![], &keys[0]).expect("build");
    node.clock.set(slot(5).as_secs());
    let entry = node.chain.push_block(child).expect("stored");
    assert!(entry.is_invalid());
    assert_eq!(node.chain.head_block_number(), 3);
}

#[test]
fn missed_slots_are_recorded_per_block() {
    let mut node = Node::open();
    node.produce_at(1);
    let first_round = node.chain.round_delegates();
    node.produce_at(4);

    let missed = node.chain.list_missing_block_delegates(2).expect("summary");
    assert_eq!(missed, vec![first_round[2], first_round[3]]);

    let slots = node.chain.get_delegate_slot_entries(first_round[2], 10);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].timestamp, slot(2));
    assert!(slots[0].block_id.is_none());

    let account = node
        .chain
        .get_account(&AccountRef::Id(first_round[2]))
        .expect("delegate");
    assert_eq!(account.delegate_info.expect("info").blocks_missed, 1);

    let summary = node
        .chain
        .get_block_summary(BlockRef::Number(2))
        .expect("load")
        .expect("summary");
    assert_eq!(summary.missed_delegates.len(), 2);
    assert_eq!(summary.timestamp, slot(4));
}

#[test]
fn round_boundary_reshuffles_the_same_delegates() {
    let mut node = Node::open();
    for n in 1..=5 {
        node.produce_at(n);
    }
    let mut round = node.chain.round_delegates();
    assert_eq!(round.len(), 5);
    round.sort();
    assert_eq!(round, (1..=5).map(AccountId).collect::<Vec<_>>());

    let ranked = node.chain.list_active_delegates(0, 3);
    assert_eq!(ranked.len(), 3);
    assert_eq!(node.chain.list_active_delegates(3, 10).len(), 2);
}

#[test]
fn next_producible_timestamp_finds_own_slot() {
    let mut node = Node::open();
    node.produce_at(1);
    let round = node.chain.round_delegates();
    let target = round[3];
    let (ts, delegate) = node
        .chain
        .next_producible_block_timestamp(&[target])
        .expect("slot in this round");
    assert_eq!(delegate, target);
    assert_eq!(ts, slot(3));
}

#[test]
fn expired_production_slot_is_not_signed() {
    let mut node = Node::open();
    node.produce_at(1);
    let before = node.state_hash();

    let ts = slot(2);
    node.clock.set(slot(3).as_secs());
    let keys = delegate_keys();
    let err = node
        .chain
        .produce_block(&keys[node.signer_index(ts)], ts)
        .unwrap_err();
    assert!(matches!(
        err,
        BlockError::ProductionSlotExpired { timestamp, now } if timestamp == ts && now == slot(3)
    ));
    assert_eq!(err.kind(), ErrorKind::Temporal);
    assert_eq!(node.chain.head_block_number(), 1);
    assert_eq!(node.state_hash(), before);
}

// ---------------------------------------------------------------------------
// 3. Forks
// ---------------------------------------------------------------------------

/// Two nodes share blocks 1-3, then fork: A produces 4-8 without
/// transactions, B produces 4-7 carrying alice's transfer.
fn forked_pair() -> (Node, Node, Vec<SignedBlock>, Vec<SignedBlock>, Vec<SignedBlock>) {
    let mut a = Node::open();
    let mut b = Node::open();
    let prefix: Vec<SignedBlock> = (1..=3).map(|n| a.produce_at(n)).collect();
    b.receive_all(&prefix);

    let fork_a: Vec<SignedBlock> = (4..=8).map(|n| a.produce_at(n)).collect();

    b.clock.set(slot(3).as_secs());
    let trx = transfer(&b.chain_id(), &alice(), &bob(), 300, Timestamp::new(3_600));
    b.chain.submit_transaction(trx).expect("transfer on b");
    let fork_b: Vec<SignedBlock> = (4..=7).map(|n| b.produce_at(n)).collect();
    assert_eq!(b.balance(&bob()), Some(300));
    (a, b, prefix, fork_a, fork_b)
}

#[test]
fn longer_fork_is_adopted_and_matches_its_replay() {
    let (a, mut b, _, fork_a, _) = forked_pair();
    assert_eq!(b.chain.head_block_number(), 7);

    b.receive_all(&fork_a);
    assert_eq!(b.chain.head_block_number(), 8);
    assert_eq!(b.chain.head_block_id(), a.chain.head_block_id());
    assert_eq!(b.balance(&bob()), None);
    assert_eq!(b.balance(&alice()), Some(1_000));
    assert_eq!(b.state_hash(), a.state_hash());

    // The transfer from the abandoned fork is pending again.
    assert_eq!(b.chain.pending_transactions().len(), 1);

    let forks = b.chain.list_forks();
    assert!(forks.contains_key(&4));
    assert_eq!(forks[&4].len(), 2);
    let graph = b.chain.get_fork_graph(3, 8);
    assert!(graph.to_dot().contains("digraph"));
}

#[test]
fn equal_length_fork_does_not_replace_the_head() {
    let (_, mut b, _, fork_a, _) = forked_pair();
    let head = b.chain.head_block_id();
    b.receive_all(&fork_a[..4]);
    assert_eq!(b.chain.head_block_number(), 7);
    assert_eq!(b.chain.head_block_id(), head);
}

#[test]
fn switching_away_and_back_restores_identical_state() {
    let (a, mut b, prefix, fork_a, fork_b) = forked_pair();
    let mut n = Node::open();
    n.receive_all(&prefix);
    n.receive_all(&fork_b);
    assert_eq!(n.state_hash(), b.state_hash());

    n.receive_all(&fork_a);
    assert_eq!(n.state_hash(), a.state_hash());

    let extension: Vec<SignedBlock> = (8..=9).map(|s| b.produce_at(s)).collect();
    n.receive_all(&extension);
    assert_eq!(n.chain.head_block_number(), 9);
    assert_eq!(n.chain.head_block_id(), b.chain.head_block_id());
    assert_eq!(n.state_hash(), b.state_hash());
}

#[test]
fn blocks_arriving_out_of_order_link_up() {
    let (a, _, prefix, fork_a, _) = forked_pair();
    let mut n = Node::open();
    let mut all: Vec<SignedBlock> = prefix.into_iter().chain(fork_a).collect();
    all.reverse();
    for block in &all {
        n.receive(block).expect("store block");
    }
    assert_eq!(n.chain.head_block_number(), 8);
    assert_eq!(n.state_hash(), a.state_hash());
}

#[test]
fn invalid_block_mid_fork_rolls_the_switch_back() {
    let (a, b, prefix, fork_a, fork_b) = forked_pair();
    let mut n = Node::open();
    n.receive_all(&prefix);
    n.receive_all(&fork_b);
    let before = n.state_hash();

    // Valid A4-A5, then a block at slot 6 signed by the wrong delegate.
    n.receive_all(&fork_a[..2]);
    let keys = delegate_keys();
    let round = a.chain.round_delegates();
    let expected = expected_signer(&round, slot(6), INTERVAL).expect("signer");
    let wrong = &keys[(expected.0 as usize) % keys.len()];
    let a5 = fork_a[1].id().expect("id");
    let bad = SignedBlock::build(6, a5, slot(6), vec![], wrong).expect("build");
    let bad_id = bad.id().expect("id");
    let bad7 = SignedBlock::build(7, bad_id, slot(7), vec![], &keys[0]).expect("build");
    let bad7_id = bad7.id().expect("id");
    let bad8 = SignedBlock::build(8, bad7_id, slot(8), vec![], &keys[0]).expect("build");
    n.receive(&bad).expect("shorter fork is only stored");
    n.receive(&bad7).expect("equal fork is only stored");

    let err = n.receive(&bad8).unwrap_err();
    match &err {
        BlockError::InvalidFork { block_id, .. } => assert_eq!(*block_id, bad_id),
        other => panic!("expected InvalidFork, got {other:?}"),
    }
    assert!(matches!(
        err.root_cause(),
        BlockError::Consensus(ConsensusError::WrongDelegate { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::ConsensusStructural);

    assert_eq!(n.chain.head_block_id(), b.chain.head_block_id());
    assert_eq!(n.state_hash(), before);
    assert!(n.chain.get_fork_entry(&bad_id).expect("entry").is_invalid());
    let a4 = n.chain.get_fork_entry(&fork_a[0].id().expect("id")).expect("entry");
    assert_eq!(a4.is_valid, Some(true));
    assert!(!a4.is_included);

    // The valid remainder of fork A still wins once it arrives.
    n.receive_all(&fork_a[2..]);
    assert_eq!(n.chain.head_block_number(), 8);
    assert_eq!(n.state_hash(), a.state_hash());
}

#[test]
fn future_block_waits_for_the_clock() {
    let mut a = Node::open();
    let mut n = Node::open();
    let prefix: Vec<SignedBlock> = (1..=3).map(|s| a.produce_at(s)).collect();
    n.receive_all(&prefix);
    let early = a.produce_at(6);

    n.clock.set(slot(3).as_secs());
    let err = n.chain.push_block(early.clone()).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.kind(), ErrorKind::Temporal);
    let entry = n.chain.get_fork_entry(&early.id().expect("id")).expect("entry");
    assert_eq!(entry.is_valid, None);

    n.clock.set(slot(6).as_secs());
    assert_eq!(n.chain.revalidate_pending().expect("revalidate"), 4);
    assert_eq!(n.chain.head_block_id(), early.id().expect("id"));
}

#[test]
fn misnumbered_child_of_a_known_block_is_rejected_before_storage() {
    let mut node = Node::open();
    let blocks: Vec<SignedBlock> = (1..=5).map(|n| node.produce_at(n)).collect();
    let head = node.chain.head_block_id();
    let before = node.state_hash();

    let parent = blocks[0].id().expect("id");
    let keys = delegate_keys();
    let junk = SignedBlock::build(10, parent, slot(6), vec![], &keys[0]).expect("build");
    let junk_id = junk.id().expect("id");
    node.clock.set(slot(6).as_secs());

    let err = node.chain.push_block(junk).unwrap_err();
    assert!(matches!(
        err,
        BlockError::BadNumber {
            block_num: 10,
            expected: 2
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(node.chain.get_fork_entry(&junk_id).is_none());
    assert!(node.chain.get_block(BlockRef::Id(junk_id)).expect("lookup").is_none());
    assert_eq!(node.chain.head_block_id(), head);
    assert_eq!(node.state_hash(), before);
}

#[test]
fn blocks_far_ahead_are_refused_and_orphans_age_out() {
    let mut node = Node::open_with(ChainParams {
        retention_depth: 10,
        ..ChainParams::dev_defaults()
    });
    node.produce_at(1);
    let keys = delegate_keys();
    let unknown_parent = dpos_types::BlockId::new([7; 32]);

    let far = SignedBlock::build(u32::MAX - 1, unknown_parent, slot(2), vec![], &keys[0])
        .expect("build");
    let far_id = far.id().expect("id");
    assert!(matches!(
        node.chain.push_block(far),
        Err(BlockError::TooFarAhead { head_num: 1, .. })
    ));
    assert!(node.chain.get_fork_entry(&far_id).is_none());

    let orphan = SignedBlock::build(11, unknown_parent, slot(2), vec![], &keys[0]).expect("build");
    let orphan_id = orphan.id().expect("id");
    let entry = node.chain.push_block(orphan).expect("inside the window");
    assert!(!entry.is_linked);

    for n in 2..=22 {
        node.produce_at(n);
    }
    assert_eq!(node.chain.head_block_number(), 22);
    assert!(node.chain.get_fork_entry(&orphan_id).is_none());
    assert!(node.chain.get_fork_entry(&unknown_parent).is_none());
    assert!(node.chain.get_block(BlockRef::Id(orphan_id)).expect("lookup").is_none());
}

#[test]
fn popped_block_returns_its_transactions_to_the_pool() {
    let mut node = Node::open();
    node.clock.set(1);
    let trx = transfer(&node.chain_id(), &alice(), &bob(), 50, Timestamp::new(600));
    node.chain.submit_transaction(trx).expect("submit");
    node.produce_at(1);
    let before_pop = node.chain.pending_transactions().len();
    assert_eq!(before_pop, 0);

    node.chain.pop_block().expect("pop");
    assert_eq!(node.chain.head_block_number(), 0);
    assert_eq!(node.chain.pending_transactions().len(), 1);
    assert_eq!(node.balance(&bob()), None);
    assert!(matches!(node.chain.pop_block(), Err(BlockError::CannotPopGenesis)));
}

#[test]
fn too_old_blocks_are_refused() {
    let mut node = Node::open();
    let first = node.produce_at(1);
    for n in 2..=102 {
        node.produce_at(n);
    }
    let stale = SignedBlock::build(1, first.previous(), slot(1), vec![], &delegate_keys()[1])
        .expect("build");
    assert!(matches!(
        node.chain.push_block(stale),
        Err(BlockError::TooOld { .. })
    ));
}

#[test]
fn retention_forgets_old_undo_states_and_losing_forks() {
    let params = ChainParams {
        retention_depth: 10,
        ..ChainParams::dev_defaults()
    };
    let mut a = Node::open_with(params.clone());
    let mut b = Node::open_with(params.clone());
    let first = a.produce_at(1);
    b.receive(&first).expect("shared block");

    // B's block 2 loses against A's block 2 and is only stored.
    let b2 = b.produce_at(2);
    let b2_id = b2.id().expect("id");
    a.produce_at(3);
    a.receive(&b2).expect("equal fork is stored");
    assert!(a.chain.get_fork_entry(&b2_id).is_some());

    for n in 4..=26 {
        a.produce_at(n);
    }
    assert_eq!(a.chain.head_block_number(), 25);
    assert!(a.chain.get_fork_entry(&b2_id).is_none());
    assert!(a.chain.get_block(BlockRef::Id(b2_id)).expect("lookup").is_none());
    assert!(a.chain.get_block(BlockRef::Number(2)).expect("lookup").is_some());

    // B's longer chain forks below the cutoff (15) and can never be adopted.
    let head = a.chain.head_block_id();
    let before = a.state_hash();
    let fork_b: Vec<SignedBlock> = (27..=60).map(|n| b.produce_at(n)).collect();
    assert_eq!(b.chain.head_block_number(), 36);
    for block in &fork_b {
        let num = block.block_num();
        match a.receive(block) {
            Err(BlockError::TooOld { .. }) => assert!(num <= 15),
            Ok(entry) => {
                assert!((16..=35).contains(&num));
                assert!(!entry.is_linked);
            }
            Err(BlockError::TooFarAhead { .. }) => assert_eq!(num, 36),
            Err(other) => panic!("block {num}: unexpected {other:?}"),
        }
    }
    assert_eq!(a.chain.head_block_id(), head);
    assert_eq!(a.state_hash(), before);

    // Only the last `retention_depth` blocks keep an undo state, in the
    // store as well as in memory.
    let mut reopened = ChainState::open(
        a.store.clone(),
        &genesis(),
        params,
        a.clock.clone(),
        Arc::new(ChainMetrics::new().expect("metrics")),
    )
    .expect("reopen");
    for _ in 0..10 {
        reopened.pop_block().expect("undo retained");
    }
    assert_eq!(reopened.head_block_number(), 15);
    assert!(matches!(reopened.pop_block(), Err(BlockError::Ledger(_))));
}

// ---------------------------------------------------------------------------
// 4. Persistence
// ---------------------------------------------------------------------------

#[test]
fn storage_failure_poisons_the_chain() {
    let mut node = Node::open();
    node.produce_at(1);
    node.store.fail_next_commit();

    let ts = slot(2);
    node.clock.set(ts.as_secs());
    let keys = delegate_keys();
    let err = node
        .chain
        .produce_block(&keys[node.signer_index(ts)], ts)
        .unwrap_err();
    assert!(matches!(err, BlockError::Storage(_)));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(node.chain.is_poisoned());
    assert!(matches!(node.chain.pop_block(), Err(BlockError::Poisoned)));
}

fn open_lmdb(
    path: &std::path::Path,
    genesis: &GenesisConfig,
    clock: Arc<NullClock>,
) -> Result<ChainState, NodeError> {
    let env = Arc::new(LmdbEnvironment::open(path, 64 * 1024 * 1024).expect("open env"));
    Migrator::run(&*env).expect("migrate");
    ChainState::open(
        env,
        genesis,
        ChainParams::dev_defaults(),
        clock,
        Arc::new(ChainMetrics::new().expect("metrics")),
    )
}

#[test]
fn lmdb_restart_restores_head_state_and_undo() {
    let dir = tempfile::tempdir().expect("temp dir");
    let clock = Arc::new(NullClock::new(0));
    let keys = delegate_keys();
    let genesis = genesis();

    let (hash, head_id, tx_id) = {
        let mut chain = open_lmdb(dir.path(), &genesis, clock.clone()).expect("open");
        let chain_id = *chain.chain_id();
        let mut tx_id = None;
        for n in 1..=3u64 {
            let ts = slot(n);
            clock.set(ts.as_secs());
            if n == 2 {
                let trx = transfer(&chain_id, &alice(), &bob(), 250, Timestamp::new(600));
                tx_id = Some(chain.submit_transaction(trx).expect("submit"));
            }
            let id = expected_signer(&chain.round_delegates(), ts, INTERVAL).expect("signer");
            chain.produce_block(&keys[(id.0 - 1) as usize], ts).expect("produce");
        }
        (
            chain.state_hash().expect("hash"),
            chain.head_block_id(),
            tx_id.expect("tx id"),
        )
    };

    let mut chain = open_lmdb(dir.path(), &genesis, clock.clone()).expect("reopen");
    assert_eq!(chain.head_block_number(), 3);
    assert_eq!(chain.head_block_id(), head_id);
    assert_eq!(chain.state_hash().expect("hash"), hash);
    assert_eq!(chain.get_transaction(&tx_id).expect("tx").location.block_num, 2);
    assert!(chain.get_block(BlockRef::Number(1)).expect("load").is_some());
    assert!(chain.get_block_summary(BlockRef::Number(3)).expect("load").is_some());

    // Undo deltas survived the restart.
    chain.pop_block().expect("pop after restart");
    assert_eq!(chain.head_block_number(), 2);
    let ts = slot(4);
    clock.set(ts.as_secs());
    let id = expected_signer(&chain.round_delegates(), ts, INTERVAL).expect("signer");
    chain.produce_block(&keys[(id.0 - 1) as usize], ts).expect("produce after restart");
    assert_eq!(chain.head_block_number(), 3);
}

#[test]
fn data_directory_of_another_chain_is_refused() {
    let dir = tempfile::tempdir().expect("temp dir");
    let clock = Arc::new(NullClock::new(0));
    open_lmdb(dir.path(), &genesis(), clock.clone()).expect("open");

    let mut other = genesis();
    other.timestamp = Timestamp::new(10);
    assert!(matches!(
        open_lmdb(dir.path(), &other, clock),
        Err(NodeError::ChainMismatch { .. })
    ));
}

// ---------------------------------------------------------------------------
// 5. Async handle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chain_database_serves_writes_and_queries() {
    let clock = Arc::new(NullClock::new(1));
    let metrics = Arc::new(ChainMetrics::new().expect("metrics"));
    let db = ChainDatabase::open(
        Arc::new(NullStore::new()),
        &genesis(),
        ChainParams::dev_defaults(),
        clock.clone(),
        Arc::clone(&metrics),
    )
    .expect("open");

    let trx = transfer(db.chain_id(), &alice(), &bob(), 100, Timestamp::new(600));
    let tx_id = db.submit_transaction(trx).await.expect("submit");
    assert_eq!(db.pending_transactions().await.len(), 1);

    let ts = slot(1);
    clock.set(ts.as_secs());
    let round = db.round_delegates().await;
    let signer_id = expected_signer(&round, ts, INTERVAL).expect("signer");
    let keys = delegate_keys();
    let block = db
        .produce_block(&keys[(signer_id.0 - 1) as usize], ts)
        .await
        .expect("produce");

    assert_eq!(db.get_head_block_number().await, 1);
    let fetched = db.get_block(1u32).await.expect("load").expect("block");
    assert_eq!(fetched.id().expect("id"), block.id().expect("id"));
    assert!(db
        .get_block_transactions(1u32)
        .await
        .expect("load")
        .contains_key(&tx_id));
    assert_eq!(
        db.get_account("alice").await.expect("alice").id,
        ALICE_ID
    );
    assert_eq!(db.get_asset("XTS").await.expect("base").id, AssetId::BASE);
    assert_eq!(db.list_active_delegates(0, 3).await.len(), 3);
    assert!(db.audit_state().await.is_clean());
    assert_eq!(metrics.blocks_pushed.get(), 1);
    assert_eq!(metrics.transactions_accepted.get(), 1);
}
