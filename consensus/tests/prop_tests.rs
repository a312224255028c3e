use proptest::prelude::*;

use dpos_consensus::{expected_signer, shuffle, ForkDatabase};
use dpos_types::{AccountId, BlockId, Timestamp};

proptest! {
    /// The shuffle is a permutation and depends only on its seed.
    #[test]
    fn shuffle_is_deterministic_permutation(
        n in 1u32..120,
        block in prop::array::uniform32(0u8..),
        seed in prop::array::uniform32(0u8..),
    ) {
        let ids: Vec<AccountId> = (1..=n).map(AccountId).collect();
        let mut a = ids.clone();
        let mut b = ids.clone();
        shuffle(&mut a, &BlockId::new(block), &seed);
        shuffle(&mut b, &BlockId::new(block), &seed);
        prop_assert_eq!(&a, &b);
        a.sort();
        prop_assert_eq!(a, ids);
    }

    /// Every slot of a round maps to a distinct active delegate.
    #[test]
    fn round_covers_every_delegate_once(n in 1u32..50, round in 0u64..1_000, interval in 1u64..30) {
        let active: Vec<AccountId> = (1..=n).map(AccountId).collect();
        let base = round * n as u64;
        let mut seen: Vec<AccountId> = (0..n as u64)
            .map(|i| {
                expected_signer(&active, Timestamp::new((base + i) * interval), interval).unwrap()
            })
            .collect();
        seen.sort();
        prop_assert_eq!(seen, active);
    }

    /// Linking does not depend on arrival order: a chain delivered in any
    /// order ends fully linked with a single tip.
    #[test]
    fn chain_links_in_any_order(order in Just((1u8..=8).collect::<Vec<u8>>()).prop_shuffle()) {
        let id = |n: u8| BlockId::new([n; 32]);
        let mut db = ForkDatabase::new();
        for n in order {
            let previous = if n == 1 { BlockId::ZERO } else { id(n - 1) };
            db.insert(id(n), previous, n as u32);
        }
        for n in 1u8..=8 {
            prop_assert!(db.get(&id(n)).unwrap().is_linked);
        }
        prop_assert_eq!(db.all_tips(), vec![id(8)]);
        prop_assert_eq!(db.history(&id(8)).unwrap().blocks.len(), 8);
    }
}
