//! Graph Walker (C5): the core recursive traversal. Starting from one
//! `(rootTable, rootPk)`, follows every foreign-key edge reachable from
//! the root in either direction, attaching each discovered row under
//! the cell whose column drove the lookup, until the schema's FK graph
//! is exhausted or a stop-table boundary cuts a branch off.
//!
//! Grounded on the recursive parent/child expansion shape of
//! [`crate::schema::graph`]'s `SchemaGraph`, generalized from a static
//! schema-wide BFS into a row-level recursive walk driven by live data.

use crate::db::Cancellation;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{ExportContext, ExportResult, PkValue, Record, RowLink};
use crate::row;
use crate::schema::{probe, MetadataCache};
use ahash::AHashSet;
use sqlx::any::AnyPool;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, instrument};

/// Stop-table boundaries and the cooperative cancellation token for one
/// export call. Table names are matched case-insensitively; callers may
/// pass them in any casing.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub stop_tables_included: Option<AHashSet<String>>,
    pub stop_tables_excluded: Option<AHashSet<String>>,
    pub cancellation: Option<Cancellation>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_included(mut self, tables: impl IntoIterator<Item = String>) -> Self {
        self.stop_tables_included = Some(tables.into_iter().map(|t| t.to_lowercase()).collect());
        self
    }

    pub fn with_excluded(mut self, tables: impl IntoIterator<Item = String>) -> Self {
        self.stop_tables_excluded = Some(tables.into_iter().map(|t| t.to_lowercase()).collect());
        self
    }

    /// Excluded is checked before included, per the stop-table precedence
    /// rule: a table can be denied outright even if it would otherwise
    /// pass an allow-list.
    fn allows(&self, table: &str) -> bool {
        let table = table.to_lowercase();
        if let Some(excluded) = &self.stop_tables_excluded {
            if excluded.contains(&table) {
                return false;
            }
        }
        if let Some(included) = &self.stop_tables_included {
            if !included.contains(&table) {
                return false;
            }
        }
        true
    }
}

/// Exports the connected subgraph reachable from `(root_table, root_pk)`.
///
/// Asserts the root table exists, reads the root record by exact PK
/// match, then recursively expands every FK edge reachable from it,
/// honoring stop-table boundaries and terminating on rows already
/// visited in this export.
#[instrument(skip(pool, cache, opts), fields(root_table, root_pk = %root_pk))]
pub async fn export(
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    root_table: &str,
    root_pk: PkValue,
    opts: &ExportOptions,
) -> Result<ExportResult> {
    probe::assert_table_exists(pool, dialect, root_table).await?;

    let mut root = row::fetch_by_pk(pool, dialect, cache, root_table, &root_pk)
        .await?
        .ok_or_else(|| Error::TableNotFound(format!("{root_table}/{root_pk}")))?;

    let mut ctx = ExportContext::new();
    ctx.mark_visited(root.row_link.clone());

    expand(pool, dialect, cache, opts, &mut ctx, &mut root).await?;

    Ok(ExportResult { root, context: ctx })
}

/// Recursively extends `record` with subrows reached through its FK
/// edges. Async fn recursion needs an explicit boxed future since Rust
/// cannot size a self-referential `async fn` call graph.
fn expand<'a>(
    pool: &'a AnyPool,
    dialect: Dialect,
    cache: &'a MetadataCache,
    opts: &'a ExportOptions,
    ctx: &'a mut ExportContext,
    record: &'a mut Record,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if let Some(cancellation) = &opts.cancellation {
            cancellation.check()?;
        }

        let table = record.row_link.table.clone();
        let fks = cache.foreign_keys_of(pool, dialect, &table).await?;

        for fk in fks.iter() {
            ctx.record_fk(fk.clone());

            // inverted: this table holds the FK column itself, so the
            // driving value is our own fk_column; otherwise we are the
            // referenced side and drive off our own pk_column.
            let driving_column = if fk.inverted { &fk.fk_column } else { &fk.pk_column };
            let driving_value = match record.cell(driving_column) {
                Some(cell) if !cell.value.is_null() => cell.value.clone(),
                _ => continue,
            };

            let other_table = if fk.inverted { &fk.pk_table } else { &fk.fk_table };
            let other_column = if fk.inverted { &fk.pk_column } else { &fk.fk_column };

            if !opts.allows(other_table) {
                debug!(table = %other_table, "stop-table boundary, skipping edge");
                continue;
            }

            let probe_link = RowLink::new(other_table.clone(), row::cell_to_pk(&driving_value));
            if ctx.is_visited(&probe_link) {
                continue;
            }

            let mut sub_records = row::fetch_rows(
                pool,
                dialect,
                cache,
                other_table,
                other_column,
                &driving_value,
            )
            .await?;

            for sub in sub_records.iter_mut() {
                let first_visit = ctx.mark_visited(sub.row_link.clone());
                if first_visit {
                    expand(pool, dialect, cache, opts, ctx, sub).await?;
                }
            }

            if let Some(cell) = record.cell_mut(driving_column) {
                cell.sub_rows
                    .entry(other_table.clone())
                    .or_default()
                    .extend(sub_records);
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_table_excluded_wins_over_included() {
        let opts = ExportOptions::new()
            .with_included(["author".to_string(), "comment".to_string()])
            .with_excluded(["comment".to_string()]);
        assert!(opts.allows("author"));
        assert!(!opts.allows("comment"));
        assert!(!opts.allows("tag"));
    }

    #[test]
    fn no_stop_tables_allows_everything() {
        let opts = ExportOptions::new();
        assert!(opts.allows("anything"));
    }

    #[test]
    fn case_insensitive_stop_tables() {
        let opts = ExportOptions::new().with_excluded(["Comment".to_string()]);
        assert!(!opts.allows("COMMENT"));
    }
}
