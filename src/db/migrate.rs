use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use crate::error::{Result, WarmgraphError};

/// Migration metadata
struct Migration {
    version: u32,
    name: String,
    sql: String,
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Names of applied migrations, in version order
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(WarmgraphError::Database)?;
    Ok(names)
}

/// Load `NNN_name.sql` files from the migrations directory
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();

    let entries = fs::read_dir(migrations_dir).map_err(|e| {
        WarmgraphError::Config(format!(
            "Cannot read migrations directory {}: {}",
            migrations_dir.display(),
            e
        ))
    })?;
    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    files.sort_by_key(|e| e.file_name());

    for entry in files {
        let path = entry.path();
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WarmgraphError::Config("Invalid migration filename".to_string()))?;

        // "001_entities.sql" -> 1
        let version_str = filename
            .split('_')
            .next()
            .ok_or_else(|| WarmgraphError::Config(format!("Invalid migration filename: {}", filename)))?;
        let version: u32 = version_str.parse()
            .map_err(|_| WarmgraphError::Config(format!("Invalid migration version: {}", version_str)))?;

        let sql = fs::read_to_string(&path)?;
        let name = filename.trim_end_matches(".sql").to_string();

        migrations.push(Migration { version, name, sql });
    }

    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(WarmgraphError::Config(format!(
            "Migrations {} and {} share version {}",
            pair[0].name, pair[1].name, pair[0].version
        )));
    }
    Ok(migrations)
}

/// Run all pending migrations, each in its own transaction. Returns the
/// names applied by this call.
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<Vec<String>> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;
    let migrations = load_migrations(migrations_dir)?;

    let mut newly_applied = Vec::new();
    for migration in migrations {
        if applied.contains(&migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql)
            .map_err(|e| {
                WarmgraphError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("Failed to execute migration {}: {}", migration.name, e))
                ))
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
        newly_applied.push(migration.name);
    }

    if newly_applied.is_empty() {
        log::debug!("Entity store schema is up to date ({} migrations)", applied.len());
    } else {
        log::info!(
            "Entity store schema migrated: {} applied, {} already present",
            newly_applied.len(),
            applied.len()
        );
    }
    Ok(newly_applied)
}
