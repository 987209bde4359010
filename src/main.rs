use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use warmgraph::db::{migrate, Db};
use warmgraph::error::WarmgraphError;
use warmgraph::http::HttpServer;
use warmgraph::{loader, watch, Config, NetworkService};

#[derive(Parser, Debug)]
#[command(name = "warmgraph")]
#[command(about = "Relationship graph and warm-introduction path engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the graph and serve the HTTP API
    Serve {
        /// Override http_server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply migrations and check the store schema (default)
    Verify,
    /// Build the graph once and print the build report
    Rebuild {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load entities and relationships from a JSON seed file
    Import {
        /// File shaped like {"nodes": [...], "edges": [...]}
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.log_filter())
    ).init();

    match cli.command.unwrap_or(Command::Verify) {
        Command::Serve { port } => run_http_server(config, port).await,
        Command::Verify => run_schema_verification(config).await,
        Command::Rebuild { json } => run_rebuild(config, json).await,
        Command::Import { file } => run_import(config, file).await,
    }
}

async fn open_service(config: Config) -> Result<NetworkService> {
    log::info!("Database path: {}", config.db_path().display());
    NetworkService::open(config)
        .await
        .context("Failed to open the entity store")
}

async fn run_http_server(config: Config, port: Option<u16>) -> Result<()> {
    log::info!("Starting warmgraph HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(open_service(config).await?);
    let report = service.rebuild().await?;
    log::info!(
        "Graph ready: {} nodes, {} edges ({} records skipped or merged)",
        report.nodes,
        report.edges,
        report.warning_count
    );

    let watch_config = service.config().watch.clone();
    if watch_config.enabled {
        let watched = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = watch::run_watcher(watched, watch_config.debounce_ms).await {
                log::error!("Store watcher stopped: {}", e);
            }
        });
    }

    let port = port.unwrap_or(service.config().http_server.port);
    let http_server = HttpServer::new(service)?;
    http_server.run(port).await?;
    Ok(())
}

async fn run_rebuild(config: Config, json: bool) -> Result<()> {
    let service = open_service(config).await?;
    let report = service.rebuild().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n=== Graph Build Report ===\n");
    println!("  Snapshot version: {}", report.version);
    println!("  Nodes:            {}", report.nodes);
    println!("  Edges:            {}", report.edges);
    println!("  Build time:       {} ms", report.elapsed_ms);
    println!("  Warnings:         {}", report.warning_count);
    for warning in &report.warnings {
        println!("    - {}", warning);
    }
    if report.warning_count > report.warnings.len() {
        println!("    ... and {} more", report.warning_count - report.warnings.len());
    }
    println!();
    Ok(())
}

async fn run_import(config: Config, file: PathBuf) -> Result<()> {
    let service = open_service(config).await?;
    let records = loader::read_seed_file(&file)?;
    let summary = loader::import_records(service.db(), records).await?;
    println!(
        "Imported {} entities and {} relationships from {}",
        summary.entities,
        summary.relationships,
        file.display()
    );
    Ok(())
}

/// Run database schema verification
async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting warmgraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;
    log::info!("Database initialized successfully");

    verify_database_schema(&db).await?;
    Ok(())
}

async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["entities", "relationships", "schema_migrations"];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }
        if !all_tables_exist {
            return Err(WarmgraphError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name")?;
        let indexes: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        for index_name in ["idx_relationships_source", "idx_relationships_target"] {
            if indexes.iter().any(|i| i == index_name) {
                log::debug!("✓ Index exists: {}", index_name);
            } else {
                log::warn!("Index not found: {} (rebuilds will scan relationships)", index_name);
            }
        }

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(WarmgraphError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(WarmgraphError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        let (entities, relationships): (i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM entities), (SELECT COUNT(*) FROM relationships)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        log::info!("Store holds {} entities and {} relationships", entities, relationships);

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
