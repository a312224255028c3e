//! Prometheus metrics for the chain database.
//!
//! [`ChainMetrics`] owns a dedicated [`Registry`]; [`ChainMetrics::encode_text`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct ChainMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks applied on top of the head (including replays during switches).
    pub blocks_pushed: IntCounter,
    /// Blocks undone from the head.
    pub blocks_popped: IntCounter,
    /// Submitted blocks that were rejected.
    pub blocks_rejected: IntCounter,
    /// Successful switches to another fork.
    pub chain_switches: IntCounter,
    /// Transactions accepted into the pending pool.
    pub transactions_accepted: IntCounter,
    /// Transactions rejected by the pending pool.
    pub transactions_rejected: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub head_block_num: IntGauge,
    pub pending_transactions: IntGauge,
    pub fork_entries: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time to apply one block, in milliseconds.
    pub block_apply_ms: Histogram,
}

impl ChainMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_pushed = register_int_counter_with_registry!(
            Opts::new("dpos_blocks_pushed_total", "Blocks applied on top of the head"),
            registry
        )?;
        let blocks_popped = register_int_counter_with_registry!(
            Opts::new("dpos_blocks_popped_total", "Blocks undone from the head"),
            registry
        )?;
        let blocks_rejected = register_int_counter_with_registry!(
            Opts::new("dpos_blocks_rejected_total", "Submitted blocks that were rejected"),
            registry
        )?;
        let chain_switches = register_int_counter_with_registry!(
            Opts::new("dpos_chain_switches_total", "Switches to another fork"),
            registry
        )?;
        let transactions_accepted = register_int_counter_with_registry!(
            Opts::new(
                "dpos_transactions_accepted_total",
                "Transactions accepted into the pending pool"
            ),
            registry
        )?;
        let transactions_rejected = register_int_counter_with_registry!(
            Opts::new(
                "dpos_transactions_rejected_total",
                "Transactions rejected by the pending pool"
            ),
            registry
        )?;

        let head_block_num = register_int_gauge_with_registry!(
            Opts::new("dpos_head_block_num", "Number of the head block"),
            registry
        )?;
        let pending_transactions = register_int_gauge_with_registry!(
            Opts::new("dpos_pending_transactions", "Transactions in the pending pool"),
            registry
        )?;
        let fork_entries = register_int_gauge_with_registry!(
            Opts::new("dpos_fork_entries", "Entries in the fork database"),
            registry
        )?;

        // Exponential buckets covering 0.1 ms to ~1.6 s.
        let block_apply_ms = register_histogram_with_registry!(
            HistogramOpts::new("dpos_block_apply_ms", "Block apply time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_pushed,
            blocks_popped,
            blocks_rejected,
            chain_switches,
            transactions_accepted,
            transactions_rejected,
            head_block_num,
            pending_transactions,
            fork_entries,
            block_apply_ms,
        })
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_render() {
        let metrics = ChainMetrics::new().unwrap();
        metrics.blocks_pushed.inc();
        metrics.head_block_num.set(7);
        metrics.block_apply_ms.observe(1.5);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("dpos_blocks_pushed_total 1"));
        assert!(text.contains("dpos_head_block_num 7"));
    }

    #[test]
    fn each_instance_has_its_own_registry() {
        let a = ChainMetrics::new().unwrap();
        let b = ChainMetrics::new().unwrap();
        a.chain_switches.inc();
        assert_eq!(b.chain_switches.get(), 0);
    }
}
