//! Plain-text rendering of snapshots, history pages and search results.

use dagview_core::{
    AccountSummary, Block, BlockType, HistoryEntry, HistoryKind, NodeInfo, RecentStats, SearchTarget,
    ViewSnapshot,
};

fn time(block: &Block) -> String {
    block
        .time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn topo(block: &Block) -> String {
    block
        .topoheight
        .map_or_else(|| "-".into(), |t| t.to_string())
}

fn marker(verdict: BlockType) -> &'static str {
    match verdict {
        BlockType::Sync => "sync",
        BlockType::Side => "side",
        BlockType::Orphan => "orphan",
        BlockType::Normal => "normal",
        BlockType::Unclassified => "...",
    }
}

pub fn print_snapshot(snap: &ViewSnapshot) {
    match snap.anchor {
        Some(anchor) => println!("Blocks up to topoheight {anchor}"),
        None => println!("Latest blocks ({} total)", snap.block_count),
    }
    println!("  stable height: {}", snap.stable_height);
    if let Some(err) = &snap.error {
        println!("  error: {err}");
    }
    if snap.loading {
        println!("  loading...");
    }
    println!();
    println!(
        "  {:>8}  {:>10}  {:<16}  {:<7}  {:>4}  {:>8}  {:<19}  {}",
        "height", "topo", "hash", "type", "txs", "size", "time", "miner"
    );

    for group in &snap.groups {
        for (i, block) in group.blocks.iter().enumerate() {
            let verdict = snap
                .blocks
                .iter()
                .find(|c| c.block.hash == block.hash)
                .map_or(BlockType::Unclassified, |c| c.verdict);
            let height = if i == 0 {
                group.height.to_string()
            } else {
                String::new()
            };
            let fresh = if snap.highlight.as_deref() == Some(block.hash.as_str()) {
                " *"
            } else {
                ""
            };
            println!(
                "  {:>8}  {:>10}  {:<16}  {:<7}  {:>4}  {:>8}  {:<19}  {}{}",
                height,
                topo(block),
                short(&block.hash),
                marker(verdict),
                block.tx_count(),
                block.size_bytes,
                time(block),
                block.miner,
                fresh
            );
        }
    }
}

pub fn print_stats(stats: &RecentStats) {
    println!();
    println!(
        "  {} blocks, {} txs, {} bytes, fees {}, rewards {}",
        stats.blocks, stats.txs, stats.size_bytes, stats.fees, stats.rewards
    );
    for (miner, count) in stats.top_miners(3) {
        println!("    {count:>3}  {miner}");
    }
}

pub fn print_history(address: &str, entries: &[HistoryEntry], error: Option<&str>) {
    println!("History of {address}");
    if let Some(err) = error {
        println!("  error: {err}");
        return;
    }
    if entries.is_empty() {
        println!("  no entries");
        return;
    }
    for entry in entries {
        let what = match &entry.kind {
            HistoryKind::Mining { reward } => format!("mining reward {reward}"),
            HistoryKind::Burn { amount } => format!("burn {amount}"),
            HistoryKind::Outgoing { amount: Some(a) } => format!("outgoing {a}"),
            HistoryKind::Outgoing { amount: None } => "outgoing (confidential)".into(),
            HistoryKind::Incoming { amount: Some(a) } => format!("incoming {a}"),
            HistoryKind::Incoming { amount: None } => "incoming (confidential)".into(),
            HistoryKind::Unknown => "unknown".into(),
        };
        println!("  {:>10}  {:<16}  {what}", entry.topoheight, short(&entry.hash));
    }
}

/// Atomic units as a decimal string with `decimals` places.
fn format_amount(atomic: u64, decimals: u8) -> String {
    let scale = match 10u128.checked_pow(u32::from(decimals)) {
        Some(scale) if decimals > 0 => scale,
        _ => return atomic.to_string(),
    };
    let atomic = u128::from(atomic);
    format!(
        "{}.{:0width$}",
        atomic / scale,
        atomic % scale,
        width = usize::from(decimals)
    )
}

pub fn print_account(summary: &AccountSummary) {
    let data = &summary.asset_data;
    let ticker = data.ticker.as_deref().unwrap_or_else(|| short(&summary.asset));
    println!("Account {}", summary.address);
    match summary.balance.balance {
        Some(atomic) => println!(
            "  Balance:    {} {ticker}",
            format_amount(atomic, data.decimals)
        ),
        None => println!("  Balance:    (confidential) {ticker}"),
    }
    println!("  At topo:    {}", summary.balance.topoheight);
    println!("  Nonce:      {}", summary.nonce.nonce);
    println!("  Assets:     {}", summary.assets.len());
    for asset in &summary.assets {
        println!("    {asset}");
    }
}

pub fn print_info(info: &NodeInfo) {
    println!("  Network:       {}", info.network.as_deref().unwrap_or("-"));
    println!("  Version:       {}", info.version.as_deref().unwrap_or("-"));
    println!("  Height:        {}", info.height);
    println!("  Topoheight:    {}", info.topoheight);
    println!("  Stable height: {}", info.stableheight);
    println!("  Mempool:       {}", info.mempool_size);
    println!("  Supply:        {}", info.native_supply);
}

pub fn print_target(target: &SearchTarget) {
    match target {
        SearchTarget::Account(addr) => println!("account {addr}"),
        SearchTarget::Hash(hash) => println!("hash {hash}"),
        SearchTarget::Topoheight(t) => println!("topoheight {t}"),
        SearchTarget::Transaction(hash) => println!("transaction {hash}"),
        SearchTarget::Block(block) => {
            println!("block {}", block.hash);
            println!("  height:     {}", block.height);
            println!("  topoheight: {}", topo(block));
            println!("  type:       {}", block.block_type.map_or_else(|| "-".into(), |t| t.to_string()));
            println!("  time:       {}", time(block));
            println!("  txs:        {}", block.tx_count());
            println!("  size:       {}", block.size_bytes);
            println!("  fees:       {}", block.total_fees);
            println!("  reward:     {}", block.reward);
            println!("  miner:      {}", block.miner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_keep_leading_zeros() {
        assert_eq!(format_amount(5_000, 8), "0.00005000");
        assert_eq!(format_amount(123_456_789_000, 8), "1234.56789000");
        assert_eq!(format_amount(42, 0), "42");
        assert_eq!(format_amount(u64::MAX, 30), format!("0.{:0>30}", u64::MAX));
    }
}
