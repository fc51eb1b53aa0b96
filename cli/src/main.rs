//! dagview CLI — follow and page through a BlockDAG node from the terminal.
//!
//! Usage:
//! ```bash
//! # One page of blocks, grouped by height
//! dagview blocks --url ws://127.0.0.1:8080/json_rpc --size 20
//!
//! # Older page, as linked by the previous output
//! dagview blocks --max-topo 41
//!
//! # Follow new blocks live until Ctrl-C
//! dagview tail
//!
//! # Account balance and history, search, node info
//! dagview account --addr xel:...
//! dagview history --addr xel:...
//! dagview search <hash|topoheight|address>
//! dagview info
//! ```

mod logging;
mod render;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use dagview_core::{
    search, AccountSummary, BlockListView, Daemon, Effect, ExplorerConfig, HistoryPager, PageCursor,
    ReconcileLoop, ViewEvent,
};
use dagview_ws::{WsClientConfig, WsNodeClient};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "blocks" => cmd_blocks(&args[2..]).await,
        "tail" => cmd_tail(&args[2..]).await,
        "account" => cmd_account(&args[2..]).await,
        "history" => cmd_history(&args[2..]).await,
        "search" => cmd_search(&args[2..]).await,
        "info" => cmd_info(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("dagview {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("dagview {}", env!("CARGO_PKG_VERSION"));
    println!("Follow and page through a BlockDAG node\n");
    println!("USAGE:");
    println!("    dagview <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    blocks   Print one page of blocks grouped by height");
    println!("    tail     Follow new blocks live until Ctrl-C");
    println!("    account  Show an account's balance, nonce and assets");
    println!("    history  Print one page of an account's history");
    println!("    search   Look up a block hash, transaction, topoheight or address");
    println!("    info     Show node info");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("COMMON FLAGS:");
    println!("    --config <PATH>      JSON config file");
    println!("    --url <URL>          Node WebSocket endpoint");
    println!("    --size <N>           Blocks per page");
    println!("    --log-level <LEVEL>  trace | debug | info | warn | error");
    println!("    --json-logs          Emit JSON logs on stderr");
    println!("    --json               Print results as JSON\n");
    println!("BLOCKS / ACCOUNT / HISTORY FLAGS:");
    println!("    --max-topo <N>       Highest topoheight on the page (from a previous page's link)");
    println!("    --addr <ADDRESS>     Account address  [account, history, required]");
    println!("    --asset <HASH>       Asset hash       [account, history]");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Config file (if any) with flag overrides applied.
fn load_config(args: &[String]) -> Result<ExplorerConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => ExplorerConfig::from_file(&path)
            .with_context(|| format!("loading config {path}"))?,
        None => ExplorerConfig::default(),
    };
    if let Some(url) = parse_flag(args, "--url") {
        config.node_url = url;
    }
    if let Some(size) = parse_flag(args, "--size") {
        config.window_size = size
            .parse()
            .with_context(|| format!("invalid --size {size}"))?;
    }
    if let Some(level) = parse_flag(args, "--log-level") {
        config.log.level = level;
    }
    if has_flag(args, "--json-logs") {
        config.log.json = true;
    }
    config.validate()?;
    logging::init_tracing(&config.log);
    Ok(config)
}

/// Open the WebSocket transport and wait for the first connection.
async fn connect(config: &ExplorerConfig) -> Result<Daemon> {
    let client = WsNodeClient::connect(
        config.node_url.clone(),
        WsClientConfig {
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms),
        },
    );
    if !client.wait_connected(config.request_timeout()).await {
        bail!("could not connect to {}", config.node_url);
    }
    Ok(Daemon::new(Arc::new(client), config.request_timeout()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_blocks(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let daemon = connect(&config).await?;

    let cursor = PageCursor::from_query(parse_flag(args, "--max-topo").as_deref());
    let mut view = BlockListView::with_cursor(config.window_size, false, cursor);

    let info = daemon.get_info().await;
    view.apply(ViewEvent::InfoLoaded(info));
    for effect in view.apply(ViewEvent::Reload) {
        if let Effect::FetchPage(request) = effect {
            let result = daemon
                .load_block_page(request.upper_bound, request.size)
                .await;
            view.apply(ViewEvent::PageLoaded { request, result });
        }
    }

    let snap = view.snapshot();
    if has_flag(args, "--json") {
        return print_json(&snap);
    }
    render::print_snapshot(&snap);
    render::print_stats(&snap.stats());

    let mut next = view.cursor().clone();
    if let Some(oldest) = view.window().oldest_topoheight() {
        if next.go_older(oldest).is_ok() {
            if let Some(query) = next.to_query() {
                println!("\nOlder: ?{query}");
            }
        }
    }
    Ok(())
}

async fn cmd_tail(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let daemon = connect(&config).await?;

    let reconcile = ReconcileLoop::from_config(daemon, &config);
    let mut handle = reconcile.handle();
    let task = tokio::spawn(reconcile.run(async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    let json = has_flag(args, "--json");
    while handle.changed().await {
        let snap = handle.snapshot();
        if json {
            println!("{}", serde_json::to_string(&*snap)?);
        } else {
            println!();
            render::print_snapshot(&snap);
        }
    }

    task.await.context("reconcile task panicked")??;
    Ok(())
}

async fn cmd_account(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let address = parse_flag(args, "--addr").ok_or_else(|| anyhow!("--addr is required"))?;
    let daemon = connect(&config).await?;

    let asset = parse_flag(args, "--asset");
    let summary = AccountSummary::load(&daemon, &address, asset.as_deref()).await?;
    if has_flag(args, "--json") {
        return print_json(&summary);
    }
    render::print_account(&summary);
    Ok(())
}

async fn cmd_history(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let address = parse_flag(args, "--addr").ok_or_else(|| anyhow!("--addr is required"))?;
    let daemon = connect(&config).await?;

    let cursor = PageCursor::from_query(parse_flag(args, "--max-topo").as_deref());
    let mut pager = HistoryPager::new(address.clone(), parse_flag(args, "--asset"), cursor);
    pager.load(&daemon).await;

    if has_flag(args, "--json") {
        return print_json(&pager.entries());
    }
    render::print_history(&address, pager.entries(), pager.error());

    let mut next = pager.clone();
    if next.go_older().is_ok() {
        if let Some(query) = next.cursor().to_query() {
            println!("\nOlder: ?{query}");
        }
    }
    Ok(())
}

async fn cmd_search(args: &[String]) -> Result<()> {
    let input = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("search needs an input"))?
        .clone();
    let config = load_config(&args[1..])?;
    let daemon = connect(&config).await?;

    let target = search::resolve(&daemon, &input).await?;
    if has_flag(args, "--json") {
        return print_json(&target);
    }
    render::print_target(&target);
    Ok(())
}

async fn cmd_info(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let daemon = connect(&config).await?;
    let info = daemon.get_info().await?;

    if has_flag(args, "--json") {
        return print_json(&info);
    }
    println!("Node {}", config.node_url);
    render::print_info(&info);
    Ok(())
}
