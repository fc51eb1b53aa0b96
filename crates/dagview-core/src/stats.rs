//! Aggregates over the blocks currently in the window.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::Block;

/// Totals over a set of recent blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentStats {
    pub blocks: usize,
    pub txs: usize,
    pub size_bytes: u64,
    pub fees: u64,
    pub rewards: u64,
    /// Blocks mined per miner address.
    pub miners: HashMap<String, usize>,
}

impl RecentStats {
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let mut stats = Self::default();
        for block in blocks {
            stats.blocks += 1;
            stats.txs += block.tx_count();
            stats.size_bytes = stats.size_bytes.saturating_add(block.size_bytes);
            stats.fees = stats.fees.saturating_add(block.total_fees);
            stats.rewards = stats.rewards.saturating_add(block.reward);
            *stats.miners.entry(block.miner.clone()).or_default() += 1;
        }
        stats
    }

    /// The `n` most frequent miners, ties broken by address.
    pub fn top_miners(&self, n: usize) -> Vec<(&str, usize)> {
        let mut miners: Vec<(&str, usize)> =
            self.miners.iter().map(|(m, c)| (m.as_str(), *c)).collect();
        miners.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        miners.truncate(n);
        miners
    }
}
