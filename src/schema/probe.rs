//! Schema Probe (C1): resolves table existence, column metadata,
//! primary keys, and foreign-key edges from a live connection.
//!
//! Catalog shapes differ enough between dialects (SQLite has no
//! `information_schema`; MySQL's `key_column_usage` already carries the
//! referenced table/column that PostgreSQL only exposes through
//! `constraint_column_usage`) that each operation dispatches on
//! [`Dialect`] rather than pretending one ANSI query covers every
//! backend.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{normalize_ident, ColumnMetadata, ForeignKeyEdge};
use sqlx::any::AnyPool;
use sqlx::Row;

fn metadata_err(table: &str, message: impl Into<String>) -> Error {
    Error::MetadataError {
        table: table.to_string(),
        column: None,
        message: message.into(),
    }
}

pub async fn assert_table_exists(pool: &AnyPool, dialect: Dialect, table: &str) -> Result<()> {
    let adapted = dialect.adapt_table_name(table);
    let exists = match dialect {
        Dialect::Sqlite => {
            // identifiers are resolved case-insensitively everywhere else
            // in SQLite (PRAGMA table_info, FROM clauses); sqlite_master.name
            // is a plain text column though, so this lookup needs an
            // explicit NOCASE compare to match that behavior.
            sqlx::query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
            )
            .bind(&adapted)
            .fetch_optional(pool)
            .await
            .map_err(Error::Database)?
            .is_some()
        }
        Dialect::Postgres | Dialect::MySql => {
            sqlx::query("SELECT table_name FROM information_schema.tables WHERE table_name = ?")
                .bind(&adapted)
                .fetch_optional(pool)
                .await
                .map_err(Error::Database)?
                .is_some()
        }
        Dialect::H2 => return Err(Error::UnknownDialect("h2".to_string())),
    };

    if exists {
        Ok(())
    } else {
        Err(Error::TableNotFound(table.to_string()))
    }
}

/// Ordered (by `ordinal_position`) column metadata, names lowercased.
pub async fn column_metadata(
    pool: &AnyPool,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<ColumnMetadata>> {
    let adapted = dialect.adapt_table_name(table);

    let mut columns = match dialect {
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA table_info(\"{adapted}\")"))
                .fetch_all(pool)
                .await
                .map_err(Error::Database)?;

            rows.iter()
                .map(|row| {
                    let cid: i64 = row.try_get("cid").unwrap_or_default();
                    let name: String = row.try_get("name").unwrap_or_default();
                    let type_name: String = row.try_get("type").unwrap_or_default();
                    let notnull: i64 = row.try_get("notnull").unwrap_or_default();
                    let default_expr: Option<String> = row.try_get("dflt_value").ok();
                    ColumnMetadata {
                        name: normalize_ident(&name),
                        type_name,
                        type_code: None,
                        size: None,
                        default_expr,
                        ordinal_position: (cid + 1) as u32,
                        is_nullable: notnull == 0,
                    }
                })
                .collect::<Vec<_>>()
        }
        Dialect::Postgres | Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name, data_type, character_maximum_length, column_default, \
                 ordinal_position, is_nullable \
                 FROM information_schema.columns WHERE table_name = ? ORDER BY ordinal_position",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            rows.iter()
                .map(|row| {
                    let name: String = row.try_get("column_name").unwrap_or_default();
                    let type_name: String = row.try_get("data_type").unwrap_or_default();
                    let size: Option<i64> = row.try_get("character_maximum_length").ok();
                    let default_expr: Option<String> = row.try_get("column_default").ok();
                    let ordinal: i64 = row.try_get("ordinal_position").unwrap_or_default();
                    let nullable: String =
                        row.try_get("is_nullable").unwrap_or_else(|_| "YES".to_string());
                    ColumnMetadata {
                        name: normalize_ident(&name),
                        type_name,
                        type_code: None,
                        size: size.map(|s| s as u32),
                        default_expr,
                        ordinal_position: ordinal as u32,
                        is_nullable: nullable.eq_ignore_ascii_case("YES"),
                    }
                })
                .collect::<Vec<_>>()
        }
        Dialect::H2 => return Err(Error::UnknownDialect("h2".to_string())),
    };

    if columns.is_empty() {
        return Err(metadata_err(table, "no columns returned by catalog"));
    }

    columns.sort_by_key(|c| c.ordinal_position);
    Ok(columns)
}

/// Declared order from the catalog (composite-key safe; the walker
/// itself only ever uses the first element).
pub async fn primary_keys(pool: &AnyPool, dialect: Dialect, table: &str) -> Result<Vec<String>> {
    let adapted = dialect.adapt_table_name(table);

    let keys = match dialect {
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA table_info(\"{adapted}\")"))
                .fetch_all(pool)
                .await
                .map_err(Error::Database)?;

            let mut pk_cols: Vec<(i64, String)> = rows
                .iter()
                .filter_map(|row| {
                    let pk: i64 = row.try_get("pk").unwrap_or_default();
                    if pk > 0 {
                        let name: String = row.try_get("name").unwrap_or_default();
                        Some((pk, normalize_ident(&name)))
                    } else {
                        None
                    }
                })
                .collect();
            pk_cols.sort_by_key(|(pk, _)| *pk);
            pk_cols.into_iter().map(|(_, name)| name).collect()
        }
        Dialect::Postgres | Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_name = kcu.table_name \
                 WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = ? \
                 ORDER BY kcu.ordinal_position",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            rows.iter()
                .map(|row| {
                    let name: String = row.try_get("column_name").unwrap_or_default();
                    normalize_ident(&name)
                })
                .collect()
        }
        Dialect::H2 => return Err(Error::UnknownDialect("h2".to_string())),
    };

    Ok(keys)
}

/// Exported keys (`inverted = false`: this table is the referenced/PK
/// side; the edges found here point from some other table's FK column
/// back at this table's own column) concatenated with imported keys
/// (`inverted = true`: this table holds the FK column itself, pointing
/// out at some other table's PK). The walker reads the driving value off
/// whichever side belongs to the current table, which is exactly
/// `pk_column` for an exported edge and `fk_column` for an imported one.
pub async fn foreign_keys_of(
    pool: &AnyPool,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<ForeignKeyEdge>> {
    let mut edges = exported_keys(pool, dialect, table).await?;
    edges.extend(imported_keys(pool, dialect, table).await?);
    Ok(edges)
}

/// Other tables' FK columns that reference this table's own column
/// (this table is the PK side).
async fn exported_keys(
    pool: &AnyPool,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<ForeignKeyEdge>> {
    let adapted = dialect.adapt_table_name(table);

    match dialect {
        Dialect::Sqlite => {
            let tables = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(pool)
                .await
                .map_err(Error::Database)?;

            let mut edges = Vec::new();
            for t in tables {
                let other_table: String = t.try_get("name").unwrap_or_default();
                if other_table.eq_ignore_ascii_case(&adapted) {
                    continue;
                }
                let rows =
                    sqlx::query(&format!("PRAGMA foreign_key_list(\"{other_table}\")"))
                        .fetch_all(pool)
                        .await
                        .map_err(Error::Database)?;

                for row in rows {
                    let pk_table: String = row.try_get("table").unwrap_or_default();
                    if !pk_table.eq_ignore_ascii_case(&adapted) {
                        continue;
                    }
                    let fk_column: String = row.try_get("from").unwrap_or_default();
                    let pk_column: String = row.try_get("to").unwrap_or_default();
                    edges.push(ForeignKeyEdge {
                        pk_table: normalize_ident(table),
                        pk_column: normalize_ident(&pk_column),
                        fk_table: normalize_ident(&other_table),
                        fk_column: normalize_ident(&fk_column),
                        declared_type: None,
                        inverted: false,
                    });
                }
            }
            Ok(edges)
        }
        Dialect::Postgres => {
            let rows = sqlx::query(
                "SELECT kcu.column_name AS fk_column, kcu.table_name AS fk_table, \
                        ccu.column_name AS pk_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name \
                  AND tc.table_schema = ccu.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' AND ccu.table_name = ?",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            Ok(rows_to_exported_edges(&rows, table))
        }
        Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name AS fk_column, table_name AS fk_table, \
                        referenced_column_name AS pk_column \
                 FROM information_schema.key_column_usage \
                 WHERE referenced_table_name = ?",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            Ok(rows_to_exported_edges(&rows, table))
        }
        Dialect::H2 => Err(Error::UnknownDialect("h2".to_string())),
    }
}

fn rows_to_exported_edges(rows: &[sqlx::any::AnyRow], table: &str) -> Vec<ForeignKeyEdge> {
    rows.iter()
        .map(|row| {
            let fk_column: String = row.try_get("fk_column").unwrap_or_default();
            let fk_table: String = row.try_get("fk_table").unwrap_or_default();
            let pk_column: String = row.try_get("pk_column").unwrap_or_default();
            ForeignKeyEdge {
                pk_table: normalize_ident(table),
                pk_column: normalize_ident(&pk_column),
                fk_table: normalize_ident(&fk_table),
                fk_column: normalize_ident(&fk_column),
                declared_type: None,
                inverted: false,
            }
        })
        .collect()
}

/// This table's own FK columns, pointing out at some other table's PK.
async fn imported_keys(
    pool: &AnyPool,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<ForeignKeyEdge>> {
    let adapted = dialect.adapt_table_name(table);

    match dialect {
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA foreign_key_list(\"{adapted}\")"))
                .fetch_all(pool)
                .await
                .map_err(Error::Database)?;

            Ok(rows
                .iter()
                .map(|row| {
                    let fk_column: String = row.try_get("from").unwrap_or_default();
                    let pk_table: String = row.try_get("table").unwrap_or_default();
                    let pk_column: String = row.try_get("to").unwrap_or_default();
                    ForeignKeyEdge {
                        pk_table: normalize_ident(&pk_table),
                        pk_column: normalize_ident(&pk_column),
                        fk_table: normalize_ident(table),
                        fk_column: normalize_ident(&fk_column),
                        declared_type: None,
                        inverted: true,
                    }
                })
                .collect())
        }
        Dialect::Postgres => {
            let rows = sqlx::query(
                "SELECT kcu.column_name AS fk_column, ccu.table_name AS pk_table, \
                        ccu.column_name AS pk_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name \
                  AND tc.table_schema = ccu.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = ?",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            Ok(rows_to_imported_edges(&rows, table))
        }
        Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name AS fk_column, referenced_table_name AS pk_table, \
                        referenced_column_name AS pk_column \
                 FROM information_schema.key_column_usage \
                 WHERE table_name = ? AND referenced_table_name IS NOT NULL",
            )
            .bind(&adapted)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

            Ok(rows_to_imported_edges(&rows, table))
        }
        Dialect::H2 => Err(Error::UnknownDialect("h2".to_string())),
    }
}

fn rows_to_imported_edges(rows: &[sqlx::any::AnyRow], table: &str) -> Vec<ForeignKeyEdge> {
    rows.iter()
        .map(|row| {
            let fk_column: String = row.try_get("fk_column").unwrap_or_default();
            let pk_table: String = row.try_get("pk_table").unwrap_or_default();
            let pk_column: String = row.try_get("pk_column").unwrap_or_default();
            ForeignKeyEdge {
                pk_table: normalize_ident(&pk_table),
                pk_column: normalize_ident(&pk_column),
                fk_table: normalize_ident(table),
                fk_column: normalize_ident(&fk_column),
                declared_type: None,
                inverted: true,
            }
        })
        .collect()
}
