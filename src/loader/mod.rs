//! Adapter between the SQLite store and the graph builder.
//!
//! Rows are returned as raw, string-typed records; validation is the
//! builder's job. A column holding the wrong storage class is coerced to a
//! value the builder rejects (tier 0, NaN strength) instead of failing the
//! load. Node ids are scoped per entity type as `"{type}:{id}"`.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::db::Db;
use crate::error::{Result, WarmgraphError};
use crate::graph::{EdgeRecord, GraphRecords, NodeRecord};

/// Scoped node id for an entity row.
pub fn node_id(entity_type: &str, entity_id: i64) -> String {
    format!("{}:{}", entity_type.trim().to_lowercase(), entity_id)
}

/// Inverse of [`node_id`]. `None` when `id` is not `"{type}:{integer}"`.
pub fn split_node_id(id: &str) -> Option<(&str, i64)> {
    let (entity_type, entity_id) = id.rsplit_once(':')?;
    if entity_type.is_empty() {
        return None;
    }
    Some((entity_type, entity_id.parse().ok()?))
}

/// Column value as a whole number. Text that does not parse and NULL
/// become 0, which the builder rejects as a tier.
fn whole(value: ValueRef<'_>) -> i64 {
    match value {
        ValueRef::Integer(n) => n,
        ValueRef::Real(x) if x.fract() == 0.0 && x.is_finite() => x as i64,
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Column value as a float; anything uncoercible becomes NaN.
fn real(value: ValueRef<'_>) -> f64 {
    match value {
        ValueRef::Integer(n) => n as f64,
        ValueRef::Real(x) => x,
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(raw) | ValueRef::Blob(raw) => Some(String::from_utf8_lossy(raw).into_owned()),
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(x) => Some(x.to_string()),
        ValueRef::Null => None,
    }
}

/// Scoped id for a `(type, id)` column pair. A non-integer id keeps its raw
/// text so the row still reaches the builder.
fn scoped_id(entity_type: ValueRef<'_>, entity_id: ValueRef<'_>) -> String {
    let entity_type = text(entity_type).unwrap_or_default();
    match entity_id {
        ValueRef::Integer(n) => node_id(&entity_type, n),
        other => format!(
            "{}:{}",
            entity_type.trim().to_lowercase(),
            text(other).unwrap_or_default().trim()
        ),
    }
}

fn read_records(conn: &Connection) -> Result<GraphRecords> {
    let mut stmt = conn.prepare(
        "SELECT entity_type, entity_id, name, tier, quality_score, sector
         FROM entities ORDER BY entity_type, entity_id",
    )?;
    let nodes = stmt
        .query_map([], |row| {
            Ok(NodeRecord {
                id: scoped_id(row.get_ref(0)?, row.get_ref(1)?),
                kind: text(row.get_ref(0)?).unwrap_or_default(),
                name: text(row.get_ref(2)?).unwrap_or_default(),
                tier: whole(row.get_ref(3)?),
                quality_score: real(row.get_ref(4)?),
                sector: text(row.get_ref(5)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut stmt = conn.prepare(
        "SELECT source_type, source_id, target_type, target_id, relation_type, strength
         FROM relationships ORDER BY relationship_id",
    )?;
    let edges = stmt
        .query_map([], |row| {
            Ok(EdgeRecord {
                source: scoped_id(row.get_ref(0)?, row.get_ref(1)?),
                target: scoped_id(row.get_ref(2)?, row.get_ref(3)?),
                edge_type: text(row.get_ref(4)?).unwrap_or_default(),
                strength: real(row.get_ref(5)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(GraphRecords { nodes, edges })
}

/// Read every entity and relationship from the store.
pub async fn load_records(db: &Db) -> Result<GraphRecords> {
    let started = std::time::Instant::now();
    let records = db.with_connection(|conn| read_records(conn)).await?;
    log::debug!(
        "Loaded {} entities and {} relationships in {:?}",
        records.nodes.len(),
        records.edges.len(),
        started.elapsed()
    );
    Ok(records)
}

/// SHA-256 over the records as loaded. Equal fingerprints mean the store
/// content is unchanged.
pub fn fingerprint(records: &GraphRecords) -> Result<String> {
    let body = serde_json::to_vec(records)
        .map_err(|e| WarmgraphError::Internal(format!("store fingerprint: {}", e)))?;
    let digest = Sha256::digest(&body);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub entities: usize,
    pub relationships: usize,
}

fn scoped(id: &str) -> Result<(&str, i64)> {
    split_node_id(id).ok_or_else(|| {
        WarmgraphError::InvalidRequest(format!(
            "node id '{}' is not of the form '<type>:<integer>'",
            id
        ))
    })
}

fn write_records(conn: &mut Connection, records: &GraphRecords) -> Result<ImportSummary> {
    let tx = conn.transaction()?;
    {
        let mut insert_entity = tx.prepare(
            "INSERT INTO entities (entity_type, entity_id, name, tier, quality_score, sector)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                name = excluded.name,
                tier = excluded.tier,
                quality_score = excluded.quality_score,
                sector = excluded.sector",
        )?;
        for node in &records.nodes {
            let (entity_type, entity_id) = scoped(&node.id)?;
            insert_entity.execute(params![
                entity_type,
                entity_id,
                node.name,
                node.tier,
                node.quality_score,
                node.sector,
            ])?;
        }

        let mut insert_relationship = tx.prepare(
            "INSERT INTO relationships
                (source_type, source_id, target_type, target_id, relation_type, strength)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for edge in &records.edges {
            let (source_type, source_id) = scoped(&edge.source)?;
            let (target_type, target_id) = scoped(&edge.target)?;
            insert_relationship.execute(params![
                source_type,
                source_id,
                target_type,
                target_id,
                edge.edge_type,
                edge.strength,
            ])?;
        }
    }
    tx.commit()?;

    Ok(ImportSummary {
        entities: records.nodes.len(),
        relationships: records.edges.len(),
    })
}

/// Insert records in a single transaction. Entities are upserted by
/// `(type, id)`; relationships are appended. Nothing is written if any id
/// is malformed.
pub async fn import_records(db: &Db, records: GraphRecords) -> Result<ImportSummary> {
    let summary = db
        .with_connection(move |conn| write_records(conn, &records))
        .await?;
    log::info!(
        "Imported {} entities and {} relationships",
        summary.entities,
        summary.relationships
    );
    Ok(summary)
}

/// Parse a JSON seed file shaped like [`GraphRecords`].
pub fn read_seed_file(path: &Path) -> Result<GraphRecords> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        WarmgraphError::InvalidRequest(format!("invalid seed file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::migrate::run_migrations;
    use tempfile::TempDir;

    /// Fresh migrated database in a temp dir. Keep the `TempDir` alive.
    pub async fn migrated_db() -> (TempDir, Db) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("warmgraph.db"));
        db.with_connection(|conn| {
            run_migrations(conn, &Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        })
        .await
        .unwrap();
        (temp_dir, db)
    }

    fn entity(id: &str, kind: &str, name: &str, tier: i64) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            tier,
            quality_score: 80.0,
            sector: None,
        }
    }

    fn relation(source: &str, target: &str, edge_type: &str, strength: f64) -> EdgeRecord {
        EdgeRecord {
            source: source.to_string(),
            target: target.to_string(),
            edge_type: edge_type.to_string(),
            strength,
        }
    }

    /// Three investors in a chain plus a firm and a fintech company.
    pub fn seed_records() -> GraphRecords {
        let mut company = entity("company:1", "company", "Ledgerly", 2);
        company.sector = Some("Fintech".to_string());
        GraphRecords {
            nodes: vec![
                entity("investor:1", "investor", "Ada Park", 1),
                entity("investor:2", "investor", "Ben Ortiz", 2),
                entity("investor:3", "investor", "Cleo Zhang", 3),
                entity("firm:1", "firm", "Northwind Ventures", 1),
                company,
            ],
            edges: vec![
                relation("investor:1", "investor:2", "co_investment", 0.9),
                relation("investor:2", "investor:3", "firm_colleague", 0.7),
                relation("investor:2", "firm:1", "firm_colleague", 0.6),
                relation("firm:1", "company:1", "direct_investment", 0.8),
            ],
        }
    }

    pub async fn seeded_db() -> (TempDir, Db) {
        let (dir, db) = migrated_db().await;
        import_records(&db, seed_records()).await.unwrap();
        (dir, db)
    }
}
