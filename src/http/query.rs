//! Query-string parsing for the HTTP routes.
//!
//! Lists are comma-separated. Keys the routes do not know are ignored.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Result, WarmgraphError};
use crate::graph::{EdgeType, NodeKind};
use crate::service::PathQuery;
use crate::subgraph::SubgraphFilters;

pub type Params = HashMap<String, String>;

fn invalid(key: &str, value: &str, expected: &str) -> WarmgraphError {
    WarmgraphError::InvalidRequest(format!(
        "query parameter {}='{}' is not {}",
        key, value, expected
    ))
}

fn present<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn number<T: std::str::FromStr>(params: &Params, key: &str) -> Result<Option<T>> {
    match present(params, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, raw, "a non-negative integer")),
        None => Ok(None),
    }
}

fn items<'a>(raw: &'a str) -> impl Iterator<Item = &'a str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn list<T: Ord>(
    params: &Params,
    key: &str,
    expected: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<BTreeSet<T>>> {
    let Some(raw) = present(params, key) else {
        return Ok(None);
    };
    let set = items(raw)
        .map(|item| parse(item).ok_or_else(|| invalid(key, item, expected)))
        .collect::<Result<BTreeSet<T>>>()?;
    Ok(Some(set).filter(|set| !set.is_empty()))
}

fn kinds(params: &Params, key: &str) -> Result<Option<BTreeSet<NodeKind>>> {
    list(params, key, "a list of investor, firm, company, sector", NodeKind::parse)
}

fn connection_types(params: &Params) -> Result<Option<BTreeSet<EdgeType>>> {
    list(
        params,
        "connectionTypes",
        "a list of direct_investment, co_investment, firm_colleague, board_member",
        EdgeType::parse,
    )
}

/// `maxHops`, `maxResults`, `allowIntermediaries`, `connectionTypes`.
///
/// `allowIntermediaries=true` is shorthand for `firm,company`.
pub fn path_query(params: &Params) -> Result<PathQuery> {
    let allow_intermediaries = match present(params, "allowIntermediaries") {
        Some(raw) if raw.eq_ignore_ascii_case("true") => {
            Some(BTreeSet::from([NodeKind::Firm, NodeKind::Company]))
        }
        Some(raw) if raw.eq_ignore_ascii_case("false") => None,
        _ => kinds(params, "allowIntermediaries")?,
    };
    Ok(PathQuery {
        max_hops: number(params, "maxHops")?,
        max_results: number(params, "maxResults")?,
        allow_intermediaries,
        connection_types: connection_types(params)?,
    })
}

/// Subgraph filters plus the optional `limit`.
pub fn graph_query(params: &Params) -> Result<(SubgraphFilters, Option<usize>)> {
    let sectors = present(params, "sector")
        .map(|raw| items(raw).map(str::to_string).collect::<BTreeSet<_>>())
        .filter(|set| !set.is_empty());
    let filters = SubgraphFilters {
        kinds: kinds(params, "kinds")?,
        min_tier: number(params, "minTier")?,
        max_tier: number(params, "maxTier")?,
        min_degree: number(params, "minDegree")?,
        sectors,
        connection_types: connection_types(params)?,
        focus_id: present(params, "focusId").map(str::to_string),
    };
    Ok((filters, number(params, "limit")?))
}
