//! Find warm-introduction paths between two nodes from the command line.

use anyhow::Result;
use clap::Parser;
use std::collections::BTreeSet;
use warmgraph::graph::{EdgeType, NodeKind};
use warmgraph::intro::template_for;
use warmgraph::service::PathQuery;
use warmgraph::{Config, NetworkService};

#[derive(Parser, Debug)]
#[command(name = "intro")]
#[command(about = "Rank warm-introduction paths between two nodes (ids like investor:42)")]
struct Args {
    /// Node to start from
    source: String,

    /// Node to reach
    target: String,

    /// Maximum hops (capped by paths.max_hops_cap)
    #[arg(long)]
    max_hops: Option<usize>,

    /// Maximum paths to list
    #[arg(long)]
    max_results: Option<usize>,

    /// Extra intermediary kinds, comma-separated (firm, company, sector)
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    allow: Vec<NodeKind>,

    /// Only traverse these relationship types, comma-separated
    #[arg(long, value_delimiter = ',', value_parser = parse_edge_type)]
    via: Vec<EdgeType>,
}

fn parse_kind(s: &str) -> std::result::Result<NodeKind, String> {
    NodeKind::parse(s).ok_or_else(|| format!("unknown node kind '{}'", s))
}

fn parse_edge_type(s: &str) -> std::result::Result<EdgeType, String> {
    EdgeType::parse(s).ok_or_else(|| format!("unknown connection type '{}'", s))
}

fn non_empty<T: Ord>(items: Vec<T>) -> Option<BTreeSet<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.into_iter().collect())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let args = Args::parse();
    let service = NetworkService::open(Config::load()?).await?;
    let report = service.rebuild().await?;
    log::info!("Graph loaded: {} nodes, {} edges", report.nodes, report.edges);

    let query = PathQuery {
        max_hops: args.max_hops,
        max_results: args.max_results,
        allow_intermediaries: non_empty(args.allow),
        connection_types: non_empty(args.via),
    };
    let response = service.warm_intros(&args.source, &args.target, &query).await?;

    if response.paths.is_empty() {
        println!("No warm introduction path from {} to {}.", args.source, args.target);
        return Ok(());
    }

    println!("\n=== Warm introductions: {} → {} ===\n", args.source, args.target);
    for (rank, path) in response.paths.iter().enumerate() {
        let chain: Vec<&str> = path.nodes.iter().map(|n| n.name.as_str()).collect();
        let opener = template_for(path)
            .map(|t| t.opener.to_string())
            .unwrap_or_default();
        println!(
            "{:>2}. {:<60} hops={} strength={:.3} opener={}",
            rank + 1,
            chain.join(" → "),
            path.hops,
            path.aggregate_strength,
            opener
        );
    }

    if let Some(text) = &response.introduction {
        println!("\nSuggested introduction:\n  {}\n", text);
    }
    Ok(())
}
