//! Canonicalizer (C7): makes an exported tree content-addressable by
//! renumbering surrogate integer primary keys to a value derived purely
//! from each row's own data, so two exports of semantically equivalent
//! databases — seeded with unrelated surrogate ID sequences — produce
//! byte-identical documents.
//!
//! Uses SHA-256 over a canonical byte encoding of each row's payload,
//! truncated to 63 bits and rendered as a signed integer, rather than
//! `ahash` — a per-process random seed is exactly wrong here, since the
//! whole point is that the same content hashes the same way on a
//! different run.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{Cell, CellValue, ExportResult, PkValue, Record, RowLink};
use crate::row;
use crate::schema::MetadataCache;
use ahash::{AHashMap, AHashSet};
use sha2::{Digest, Sha256};
use sqlx::any::AnyPool;

/// Renumbers every eligible row (single numeric PK) in `result`'s tree
/// in place. Rows with a composite or non-numeric PK are left untouched,
/// and FK cells pointing at a renumbered row are updated to match.
pub async fn canonicalize(
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    result: &mut ExportResult,
) -> Result<()> {
    let mut eligible_tables: AHashMap<String, bool> = AHashMap::new();
    collect_table_eligibility(&result.root, pool, dialect, cache, &mut eligible_tables).await?;

    let mut graph = RowLinkGraph::default();
    collect(&result.root, &mut graph);

    let mut resolved: AHashMap<RowLink, Option<PkValue>> = AHashMap::new();
    let mut in_progress: AHashSet<RowLink> = AHashSet::new();
    for link in graph.payload.keys().cloned().collect::<Vec<_>>() {
        resolve(&link, &eligible_tables, &graph, &mut resolved, &mut in_progress);
    }

    apply(&mut result.root, &resolved);
    Ok(())
}

/// A distinct row's identity (keyed by its pre-canonicalization RowLink)
/// plus everything needed to hash it: its own non-PK payload, and the
/// RowLinks of children reached through its own local FK columns (a
/// column whose cell is not this row's own PK cell).
#[derive(Default)]
struct RowLinkGraph {
    payload: AHashMap<RowLink, Vec<(String, CellValue)>>,
    fk_children: AHashMap<RowLink, Vec<(String, RowLink)>>,
}

/// Walks the tree once (any order; a given RowLink's payload is
/// identical at every occurrence, since every occurrence came from the
/// same underlying row) and records each distinct row's payload and
/// locally-owned FK targets. Runs entirely on the materialized tree, no
/// I/O.
fn collect(record: &Record, graph: &mut RowLinkGraph) {
    graph.payload.entry(record.row_link.clone()).or_insert_with(|| {
        // A cell with non-empty sub_rows is an FK column already
        // represented in fk_children via its (canonicalized) child
        // links; hashing its raw, pre-canonicalization surrogate value
        // here too would make the hash depend on the very surrogate IDs
        // canonicalization exists to erase.
        let mut pairs: Vec<(String, CellValue)> = record
            .cells
            .iter()
            .filter(|c| !is_own_pk_cell(record, c) && c.sub_rows.is_empty())
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    });

    for cell in &record.cells {
        if cell.sub_rows.is_empty() {
            continue;
        }
        if !is_own_pk_cell(record, cell) {
            let links = graph.fk_children.entry(record.row_link.clone()).or_default();
            for children in cell.sub_rows.values() {
                for child in children {
                    links.push((cell.name.clone(), child.row_link.clone()));
                }
            }
        }
        for children in cell.sub_rows.values() {
            for child in children {
                collect(child, graph);
            }
        }
    }
}

fn is_own_pk_cell(record: &Record, cell: &Cell) -> bool {
    record
        .pk_column
        .as_deref()
        .is_some_and(|pk| pk.eq_ignore_ascii_case(&cell.name))
}

/// Recursively resolves `link`'s canonical PK, memoizing by RowLink so a
/// row reached from multiple places in the tree hashes once. Rows
/// currently mid-resolution (a cycle in the underlying FK graph, e.g.
/// a→b→a) fall back to their own stable old identity instead of
/// recursing further — the cycle is real in the data, not a bug, and a
/// stable placeholder still yields a deterministic, reproducible hash.
fn resolve(
    link: &RowLink,
    eligible_tables: &AHashMap<String, bool>,
    graph: &RowLinkGraph,
    resolved: &mut AHashMap<RowLink, Option<PkValue>>,
    in_progress: &mut AHashSet<RowLink>,
) -> Option<PkValue> {
    if let Some(done) = resolved.get(link) {
        return done.clone();
    }
    if in_progress.contains(link) {
        return None;
    }

    let eligible = matches!(eligible_tables.get(&link.table), Some(true))
        && matches!(link.pk, PkValue::Int(_));
    if !eligible {
        resolved.insert(link.clone(), None);
        return None;
    }

    in_progress.insert(link.clone());

    let mut hasher = Sha256::new();
    hasher.update(link.table.as_bytes());

    if let Some(payload) = graph.payload.get(link) {
        for (name, value) in payload {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(cell_value_bytes(value));
            hasher.update([0u8]);
        }
    }

    let mut children: Vec<(String, RowLink)> =
        graph.fk_children.get(link).cloned().unwrap_or_default();
    children.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.to_string().cmp(&b.1.to_string())));

    for (column, child_link) in &children {
        hasher.update(column.as_bytes());
        hasher.update([0u8]);
        match resolve(child_link, eligible_tables, graph, resolved, in_progress) {
            Some(new_pk) => hasher.update(new_pk.as_canonical_string().as_bytes()),
            None => hasher.update(child_link.to_string().as_bytes()),
        }
        hasher.update([0u8]);
    }

    in_progress.remove(link);

    let digest = hasher.finalize();
    let n = u64::from_be_bytes(digest[0..8].try_into().unwrap());
    let new_pk = PkValue::Int((n & 0x7FFF_FFFF_FFFF_FFFF) as i64);

    resolved.insert(link.clone(), Some(new_pk.clone()));
    Some(new_pk)
}

fn cell_value_bytes(value: &CellValue) -> Vec<u8> {
    match value {
        CellValue::Null => b"null".to_vec(),
        CellValue::Bool(b) => vec![*b as u8],
        CellValue::Int(i) => i.to_be_bytes().to_vec(),
        CellValue::Float(f) => f.to_be_bytes().to_vec(),
        CellValue::Text(s) => s.as_bytes().to_vec(),
        CellValue::Date(d) => d.to_string().into_bytes(),
        CellValue::DateTime(dt) => dt.to_string().into_bytes(),
    }
}

/// Writes resolved canonical PKs back into the tree: each record's own
/// RowLink and PK cell, plus any local FK cell whose (single) target was
/// renumbered.
fn apply(record: &mut Record, resolved: &AHashMap<RowLink, Option<PkValue>>) {
    let original_link = record.row_link.clone();

    for cell in record.cells.iter_mut() {
        if cell.sub_rows.is_empty() {
            continue;
        }
        let is_own_pk = record
            .pk_column
            .as_deref()
            .is_some_and(|pk| pk.eq_ignore_ascii_case(&cell.name));

        if !is_own_pk {
            if let Some(target) = cell.sub_rows.values().flatten().next() {
                if let Some(Some(new_pk)) = resolved.get(&target.row_link) {
                    cell.value = row::pk_to_cell_value(new_pk);
                }
            }
        }
    }

    // recurse after reading (pre-canonicalization) links off children
    for cell in record.cells.iter_mut() {
        for children in cell.sub_rows.values_mut() {
            for child in children.iter_mut() {
                apply(child, resolved);
            }
        }
    }

    if let Some(Some(new_pk)) = resolved.get(&original_link) {
        if let Some(pk_col) = record.pk_column.clone() {
            if let Some(cell) = record.cell_mut(&pk_col) {
                cell.value = row::pk_to_cell_value(new_pk);
            }
        }
        record.row_link = RowLink::new(original_link.table.clone(), new_pk.clone());
    }
}

async fn collect_table_eligibility(
    record: &Record,
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    eligible: &mut AHashMap<String, bool>,
) -> Result<()> {
    if !eligible.contains_key(&record.row_link.table) {
        let pk_cols = cache
            .primary_keys(pool, dialect, &record.row_link.table)
            .await?;
        eligible.insert(record.row_link.table.clone(), pk_cols.len() == 1);
    }

    for cell in &record.cells {
        for children in cell.sub_rows.values() {
            for child in children {
                Box::pin(collect_table_eligibility(child, pool, dialect, cache, eligible)).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, Record, RowLink};

    fn leaf(table: &str, pk: i64, name: &str, value: &str) -> Record {
        let row_link = RowLink::new(table, PkValue::Int(pk));
        let cells = vec![
            Cell::new("id", CellValue::Int(pk), None),
            Cell::new(name, CellValue::Text(value.to_string()), None),
        ];
        Record::with_pk_column(row_link, cells, Some("id".to_string()))
    }

    #[test]
    fn identical_payload_hashes_identically() {
        let mut eligible = AHashMap::new();
        eligible.insert("author".to_string(), true);

        let a = leaf("author", 101, "name", "Ada");
        let b = leaf("author", 9001, "name", "Ada");

        let mut graph_a = RowLinkGraph::default();
        collect(&a, &mut graph_a);
        let mut graph_b = RowLinkGraph::default();
        collect(&b, &mut graph_b);

        let mut resolved_a = AHashMap::new();
        let mut in_progress_a = AHashSet::new();
        let pk_a = resolve(&a.row_link, &eligible, &graph_a, &mut resolved_a, &mut in_progress_a);

        let mut resolved_b = AHashMap::new();
        let mut in_progress_b = AHashSet::new();
        let pk_b = resolve(&b.row_link, &eligible, &graph_b, &mut resolved_b, &mut in_progress_b);

        assert_eq!(pk_a, pk_b);
    }

    #[test]
    fn ineligible_table_resolves_to_none() {
        let eligible = AHashMap::new();
        let a = leaf("weird", 1, "name", "x");
        let mut graph = RowLinkGraph::default();
        collect(&a, &mut graph);
        let mut resolved = AHashMap::new();
        let mut in_progress = AHashSet::new();
        assert_eq!(resolve(&a.row_link, &eligible, &graph, &mut resolved, &mut in_progress), None);
    }
}
