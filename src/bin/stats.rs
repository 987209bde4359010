use warmgraph::{Config, NetworkService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let service = NetworkService::open(Config::load()?).await?;
    let report = service.rebuild().await?;
    let stats = service.network_stats();

    println!("\n=== Warmgraph Network Statistics ===\n");
    println!("  Snapshot version: {}", report.version);
    println!("  Built at:         {}", report.built_at.to_rfc3339());
    println!("  Total nodes:      {}", stats.total_nodes);
    println!("  Total edges:      {}", stats.total_edges);
    println!("  Isolated nodes:   {}", stats.isolated_nodes);
    println!("  Max degree:       {}", stats.max_degree);
    if report.warning_count > 0 {
        println!("  Skipped records:  {}", report.warning_count);
    }

    println!("\nNodes by kind:\n");
    println!("{:-<32}", "");
    println!("{:<20} {:>10}", "Kind", "Count");
    println!("{:-<32}", "");
    for (kind, count) in &stats.nodes_by_kind {
        println!("{:<20} {:>10}", kind.as_str(), count);
    }
    println!("{:-<32}", "");

    println!("\nEdges by type:\n");
    println!("{:-<32}", "");
    println!("{:<20} {:>10}", "Type", "Count");
    println!("{:-<32}", "");
    for (edge_type, count) in &stats.edges_by_type {
        println!("{:<20} {:>10}", edge_type.as_str(), count);
    }
    println!("{:-<32}", "");

    if !stats.tier_distribution.is_empty() {
        println!("\nTier distribution:\n");
        println!("{:-<32}", "");
        println!("{:<20} {:>10}", "Tier", "Nodes");
        println!("{:-<32}", "");
        for (tier, count) in &stats.tier_distribution {
            println!("{:<20} {:>10}", tier, count);
        }
        println!("{:-<32}", "");
    }

    println!();
    Ok(())
}
