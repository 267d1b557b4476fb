//! Dependency Orderer (C6): given a root table, discovers every table
//! reachable from it via FK edges and returns an insertion order where
//! every parent precedes each of its children — the order a bulk loader
//! would need to satisfy FK constraints while inserting rows produced
//! by the walker.
//!
//! Grounded on [`crate::schema::graph::SchemaGraph::topo_sort`]'s
//! Kahn's-algorithm shape (in-degree counting, peel-the-zeros queue),
//! generalized from a precomputed, `TableId`-indexed schema graph to a
//! live-probed, table-name-keyed one discovered by BFS from one root.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::normalize_ident;
use crate::schema::MetadataCache;
use ahash::{AHashMap, AHashSet};
use sqlx::any::AnyPool;
use std::collections::VecDeque;
use tracing::warn;

/// Discovers the connected component reachable from `root_table` and
/// returns a parent-before-child insertion order. Ties among tables that
/// become ready in the same round are broken by name, so the order is
/// deterministic for a fixed schema.
///
/// When the discovered graph contains a cycle, the acyclic prefix is
/// still returned; `fail_on_cycles` decides whether the remainder is a
/// logged warning (partial order returned) or an [`Error::CyclicDependencies`].
pub async fn determine_insertion_order(
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    root_table: &str,
    fail_on_cycles: bool,
) -> Result<Vec<String>> {
    let root = normalize_ident(root_table);

    let mut tables: AHashSet<String> = AHashSet::new();
    let mut parents_of: AHashMap<String, AHashSet<String>> = AHashMap::new();
    let mut children_of: AHashMap<String, AHashSet<String>> = AHashMap::new();

    tables.insert(root.clone());
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(root);

    while let Some(table) = queue.pop_front() {
        let fks = cache.foreign_keys_of(pool, dialect, &table).await?;

        for fk in fks.iter() {
            let parent = fk.pk_table.clone();
            let child = fk.fk_table.clone();

            if parent == child {
                // self-referential FK: cannot be satisfied by ordering alone.
                continue;
            }

            children_of.entry(parent.clone()).or_default().insert(child.clone());
            parents_of.entry(child.clone()).or_default().insert(parent.clone());
            parents_of.entry(parent.clone()).or_default();
            children_of.entry(child.clone()).or_default();

            for t in [&parent, &child] {
                if tables.insert(t.clone()) {
                    queue.push_back(t.clone());
                }
            }
        }
    }

    let mut in_degree: AHashMap<String, usize> = tables
        .iter()
        .map(|t| (t.clone(), parents_of.get(t).map(|p| p.len()).unwrap_or(0)))
        .collect();

    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(t, _)| t.clone())
        .collect();
    ready.sort();

    let mut frontier: VecDeque<String> = ready.into_iter().collect();
    let mut order = Vec::with_capacity(tables.len());

    while let Some(table) = frontier.pop_front() {
        order.push(table.clone());

        if let Some(children) = children_of.get(&table) {
            let mut newly_ready: Vec<String> = Vec::new();
            for child in children {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(child.clone());
                    }
                }
            }
            newly_ready.sort();
            frontier.extend(newly_ready);
        }
    }

    if order.len() < tables.len() {
        let mut remaining: Vec<String> = tables
            .iter()
            .filter(|t| !order.contains(t))
            .cloned()
            .collect();
        remaining.sort();

        if fail_on_cycles {
            return Err(Error::CyclicDependencies(remaining));
        }
        warn!(tables = ?remaining, "cyclic dependencies among tables, returning partial order");
    }

    Ok(order)
}
