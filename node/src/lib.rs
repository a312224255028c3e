//! DPOS chain database node.
//!
//! The node owns the ledger state and the fork database and:
//! - Accepts blocks in any order and switches to the longest valid fork
//! - Validates transactions into a pending pool
//! - Produces blocks for locally held delegate keys
//! - Persists every step to the key-value store atomically
//! - Answers queries on blocks, accounts, assets, balances and forks

pub mod audit;
pub mod block_summary;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pending;
pub mod persistence;
pub mod producer;
pub mod shutdown;
pub mod tracing_spans;
pub mod verify;

pub use audit::{audit_state, AuditReport, SupplyMismatch};
pub use block_summary::BlockSummary;
pub use chain::ChainDatabase;
pub use config::{NodeConfig, ProducerConfig};
pub use engine::ChainState;
pub use error::{BlockError, NodeError};
pub use logging::{init_logging, LogFormat};
pub use metrics::ChainMetrics;
pub use pending::{PendingPool, PendingTransaction};
pub use persistence::ChainStore;
pub use producer::{parse_signing_keys, BlockProducer};
pub use shutdown::ShutdownController;
pub use verify::verify_signatures_parallel;
