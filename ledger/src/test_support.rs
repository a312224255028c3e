//! Shared fixture for the ledger's unit tests.

use dpos_crypto::keypair_from_seed;
use dpos_types::{
    AccountId, Address, Amount, AssetId, BalanceId, ChainId, ChainParams, KeyPair, Timestamp,
};

use crate::entries::balance_id;
use crate::genesis::{GenesisAccount, GenesisAsset, GenesisBalance, GenesisConfig, GenesisDelegate};
use crate::state::LedgerState;

pub(crate) struct Fixture {
    pub params: ChainParams,
    pub chain_id: ChainId,
    pub state: LedgerState,
    pub alice_key: KeyPair,
    pub bob_key: KeyPair,
    pub alice_id: AccountId,
    pub alice_address: Address,
    pub alice_balance: BalanceId,
    pub bob_address: Address,
    pub delegate_id: AccountId,
}

/// Genesis with one delegate (`init0`, 50% pay rate, id 1) and `alice`
/// (id 2) holding 1,000,000 base units. Bob has a key but no account.
pub(crate) fn fixture() -> Fixture {
    let params = ChainParams::dev_defaults();
    let alice_key = keypair_from_seed(&[1; 32]);
    let bob_key = keypair_from_seed(&[2; 32]);
    let delegate_key = keypair_from_seed(&[3; 32]);

    let genesis = GenesisConfig {
        timestamp: Timestamp::new(0),
        base_asset: GenesisAsset {
            symbol: "DPS".into(),
            name: "base".into(),
            precision: 100_000,
            max_supply: Amount::new(1_000_000_000_000),
        },
        delegates: vec![GenesisDelegate {
            name: "init0".into(),
            owner_key: delegate_key.public,
            signing_key: None,
            pay_rate: 50,
        }],
        accounts: vec![GenesisAccount {
            name: "alice".into(),
            owner_key: alice_key.public,
        }],
        balances: vec![GenesisBalance {
            owner: alice_key.public,
            amount: Amount::new(1_000_000),
        }],
    };
    let state = genesis.build_state(&params).expect("fixture genesis");
    let chain_id = genesis.chain_id().expect("fixture chain id");
    let alice_address = Address::from_public_key(&alice_key.public);

    Fixture {
        params,
        chain_id,
        state,
        alice_id: AccountId(2),
        alice_address,
        alice_balance: balance_id(&alice_address, AssetId::BASE, None),
        bob_address: Address::from_public_key(&bob_key.public),
        alice_key,
        bob_key,
        delegate_id: AccountId(1),
    }
}
