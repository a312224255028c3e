//! The ledger of the DPOS chain database.
//!
//! - [`state`]: entity maps, indexes and chain properties, with every write
//!   recorded into an [`UndoDelta`]
//! - [`applier`]: per-operation preconditions and effects
//! - [`evaluator`]: whole-transaction validation and atomic application
//! - [`block_effects`]: delegate pay, slot records, head and seed
//! - [`persist`]: table layout in the key-value store

pub mod applier;
pub mod block_effects;
pub mod entries;
pub mod error;
pub mod evaluator;
pub mod genesis;
pub mod names;
pub mod persist;
pub mod snapshot;
pub mod state;
pub mod undo;

#[cfg(test)]
pub(crate) mod test_support;

pub use applier::{apply, unapply, EvalContext};
pub use block_effects::DelegatePay;
pub use entries::{
    balance_id, AccountEntry, AssetEntry, BalanceEntry, ChainProperties, DelegateInfo, Receipt,
    SlateEntry, SlotEntry, TxEntry, TxLocation,
};
pub use error::{LedgerError, OpError, TrxError};
pub use evaluator::{relay_fee, validate_and_apply, EvalEnv};
pub use genesis::{GenesisAccount, GenesisAsset, GenesisBalance, GenesisConfig, GenesisDelegate};
pub use snapshot::{state_hash, LedgerSnapshot};
pub use state::LedgerState;
pub use undo::{Change, StateKey, UndoDelta};
