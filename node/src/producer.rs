//! Local block production for delegates whose signing keys this node holds.

use std::sync::Arc;
use std::time::Duration;

use dpos_crypto::keypair_from_seed;
use dpos_transactions::SignedBlock;
use dpos_types::{hex32, AccountId, Clock, KeyPair, PublicKey, Timestamp};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::chain::ChainDatabase;
use crate::error::{BlockError, NodeError};

/// Parse hex-encoded 32-byte signing key seeds.
pub fn parse_signing_keys(keys: &[String]) -> Result<Vec<KeyPair>, NodeError> {
    keys.iter()
        .map(|hex| {
            hex32::parse(hex)
                .map(|seed| keypair_from_seed(&seed))
                .map_err(|e| NodeError::Config(format!("invalid signing key: {}", e)))
        })
        .collect()
}

pub struct BlockProducer {
    chain: ChainDatabase,
    keys: Vec<KeyPair>,
    clock: Arc<dyn Clock>,
    /// Slot picked on the previous tick.
    scheduled: Option<(Timestamp, AccountId)>,
}

impl BlockProducer {
    pub fn new(chain: ChainDatabase, keys: Vec<KeyPair>, clock: Arc<dyn Clock>) -> Self {
        Self {
            chain,
            keys,
            clock,
            scheduled: None,
        }
    }

    fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|k| k.public).collect()
    }

    async fn signer_for(&self, delegate: AccountId) -> Option<&KeyPair> {
        let account = self.chain.get_account(delegate).await?;
        let signing_key = account.delegate_info?.signing_key;
        self.keys.iter().find(|k| k.public == signing_key)
    }

    /// Produce the scheduled block if its slot has arrived, then schedule
    /// the next one. Returns the produced block, if any.
    pub async fn tick(&mut self) -> Result<Option<SignedBlock>, BlockError> {
        let now = self.clock.now();
        let mut produced = None;

        if let Some((timestamp, delegate)) = self.scheduled {
            if timestamp <= now {
                self.scheduled = None;
                match self.signer_for(delegate).await {
                    Some(signer) => {
                        let block = self.chain.produce_block(signer, timestamp).await?;
                        produced = Some(block);
                    }
                    None => warn!(delegate = %delegate, "no local key for scheduled delegate"),
                }
            }
        }

        if self.scheduled.is_none() {
            let delegates = self.chain.delegates_for_keys(&self.public_keys()).await;
            self.scheduled = self.chain.next_producible_block_timestamp(&delegates).await;
            if let Some((timestamp, delegate)) = self.scheduled {
                debug!(timestamp = %timestamp, delegate = %delegate, "next production slot");
            }
        }
        Ok(produced)
    }

    /// Tick once per second until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(keys = self.keys.len(), "block producer started");
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.chain.revalidate_pending().await {
                        debug!(error = %e, "revalidation left blocks untried");
                    }
                    match self.tick().await {
                        Ok(Some(block)) => debug!(num = block.block_num(), "block produced"),
                        Ok(None) => {}
                        Err(BlockError::Poisoned) => {
                            warn!("chain database poisoned, producer stopping");
                            break;
                        }
                        Err(e) => warn!(error = %e, "block production failed"),
                    }
                }
            }
        }
        info!("block producer stopped");
    }
}
