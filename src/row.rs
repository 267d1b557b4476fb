//! Row Reader (C4): executes a parameterized
//! `SELECT * FROM <table> WHERE <col> = ?` and materializes each
//! returned row as a [`Record`].

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{normalize_ident, Cell, CellValue, ColumnMetadata, PkValue, Record, RowLink};
use crate::schema::MetadataCache;
use crate::value;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::any::{AnyPool, AnyRow};
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;

/// Fetches every row of `table` whose `column` equals `driving_value`,
/// binding through the column's declared type, and materializes each
/// into a [`Record`]. The PK column's value is promoted into the
/// record's `row_link.pk`, after normalization.
pub async fn fetch_rows(
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    table: &str,
    column: &str,
    driving_value: &CellValue,
) -> Result<Vec<Record>> {
    let adapted_table = dialect.adapt_table_name(table);
    let columns = cache.column_metadata(pool, dialect, table).await?;
    let pk_cols = cache.primary_keys(pool, dialect, table).await?;
    let pk_col = pk_cols.first().cloned();

    let sql = format!("SELECT * FROM {adapted_table} WHERE {column} = ?");
    let query = sqlx::query(&sql);
    let query = bind_cell_value(query, driving_value);

    let rows = query.fetch_all(pool).await.map_err(|e| Error::QueryError {
        table: table.to_string(),
        message: e.to_string(),
    })?;

    rows.iter()
        .map(|row| materialize(table, row, &columns, pk_col.as_deref()))
        .collect()
}

/// Fetches the single row matching an exact PK value (the root-record
/// read in [`crate::walker::export`]).
pub async fn fetch_by_pk(
    pool: &AnyPool,
    dialect: Dialect,
    cache: &MetadataCache,
    table: &str,
    pk_value: &PkValue,
) -> Result<Option<Record>> {
    let pk_cols = cache.primary_keys(pool, dialect, table).await?;
    let pk_col = pk_cols
        .first()
        .ok_or_else(|| Error::PrimaryKeyMissing(table.to_string()))?
        .clone();
    if pk_cols.len() > 1 {
        return Err(Error::CompositePrimaryKey(table.to_string()));
    }

    let cell_value = match pk_value {
        PkValue::Int(i) => CellValue::Int(*i),
        PkValue::Text(s) => CellValue::Text(s.clone()),
    };

    let mut rows = fetch_rows(pool, dialect, cache, table, &pk_col, &cell_value).await?;
    Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
}

fn bind_cell_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &'q CellValue,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value {
        CellValue::Null => query.bind(None::<String>),
        CellValue::Bool(b) => query.bind(*b),
        CellValue::Int(i) => query.bind(*i),
        CellValue::Float(f) => query.bind(*f),
        CellValue::Text(s) => query.bind(s.as_str()),
        CellValue::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
        CellValue::DateTime(dt) => query.bind(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

fn materialize(
    table: &str,
    row: &AnyRow,
    columns: &[ColumnMetadata],
    pk_col: Option<&str>,
) -> Result<Record> {
    let mut cells = Vec::with_capacity(row.columns().len());
    let mut pk_value: Option<PkValue> = None;

    for (idx, col) in row.columns().iter().enumerate() {
        let name = normalize_ident(col.name());
        let metadata = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&name))
            .cloned();

        let declared_type = metadata
            .as_ref()
            .map(|m| m.type_name.clone())
            .unwrap_or_else(|| col.type_info().name().to_string());

        let raw = decode_as_text(row, idx);
        let value = match raw {
            None => CellValue::Null,
            Some(text) => value::coerce(table, &name, &declared_type, &text)?,
        };

        if pk_col.is_some_and(|pk| pk.eq_ignore_ascii_case(&name)) {
            pk_value = Some(cell_to_pk(&value));
        }

        cells.push(Cell::new(name, value, metadata));
    }

    let row_link = match pk_value {
        Some(pk) => RowLink::new(table, pk),
        None => RowLink::new(table, PkValue::Text(String::new())),
    };

    Ok(Record::with_pk_column(
        row_link,
        cells,
        pk_col.map(normalize_ident),
    ))
}

/// The inverse of [`cell_to_pk`]: renders a [`PkValue`] back as the cell
/// value it would have materialized from, used by the Canonicalizer
/// when writing a renumbered PK back into a cell.
pub fn pk_to_cell_value(pk: &PkValue) -> CellValue {
    match pk {
        PkValue::Int(i) => CellValue::Int(*i),
        PkValue::Text(s) => CellValue::Text(s.clone()),
    }
}

/// Normalizes a materialized cell value into the [`PkValue`] it would
/// represent if used to drive a lookup elsewhere — the same normalization
/// the walker needs when a non-PK FK cell's value must be compared
/// against the `visited` set or rebound as a parameter.
pub fn cell_to_pk(value: &CellValue) -> PkValue {
    match value {
        CellValue::Int(i) => PkValue::Int(*i),
        other => PkValue::from_sql_str(&cell_to_string(other)),
    }
}

fn cell_to_string(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Date(d) => d.to_string(),
        CellValue::DateTime(dt) => dt.to_string(),
    }
}

/// Reads a column's native value and renders it as text, the way a
/// generic JDBC-style `getString()` would, so [`value::coerce`] can
/// apply one uniform dispatch regardless of the driver's native
/// encoding. Tries the most specific decode first and falls back to
/// looser ones; a column that fails every decode is treated as NULL.
fn decode_as_text(row: &AnyRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|i| i.to_string());
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| i.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|f| f.to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(|b| b.to_string());
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v.map(|d| d.format("%Y-%m-%d").to_string());
    }
    None
}
