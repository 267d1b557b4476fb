//! Value Coercer (C3): maps a textual cell value plus a declared column
//! type into a correctly-typed [`CellValue`], the same representation
//! used for both binding a prepared-statement parameter and storing a
//! materialized cell. Pure — no I/O, no connection.

use crate::error::{Error, Result};
use crate::model::CellValue;
use chrono::{NaiveDate, NaiveDateTime};

/// Dispatches on the declared type family (case-insensitive), following
/// the same shape as a DuckDB-style type converter: strip any
/// `(precision, scale)` suffix, then match the base type name.
pub fn coerce(table: &str, column: &str, declared_type: &str, raw: &str) -> Result<CellValue> {
    if is_null_literal(raw) {
        return Ok(CellValue::Null);
    }

    let family = base_type(declared_type);

    match family.as_str() {
        "boolean" | "bool" => parse_bool(raw)
            .map(CellValue::Bool)
            .ok_or_else(|| coercion_err(table, column, declared_type, raw)),

        "serial" | "int" | "int2" | "int4" | "int8" | "integer" | "number" | "float4"
        | "float8" | "bigint" | "smallint" | "tinyint" | "mediumint" => raw
            .trim()
            .parse::<i64>()
            .map(CellValue::Int)
            .map_err(|_| coercion_err(table, column, declared_type, raw)),

        "numeric" | "decimal" => raw
            .trim()
            .parse::<f64>()
            .map(CellValue::Float)
            .map_err(|_| coercion_err(table, column, declared_type, raw)),

        "date" => parse_date(raw)
            .map(CellValue::Date)
            .ok_or_else(|| coercion_err(table, column, declared_type, raw)),

        "timestamp" | "datetime" => parse_timestamp(raw)
            .map(CellValue::DateTime)
            .ok_or_else(|| coercion_err(table, column, declared_type, raw)),

        _ => Ok(CellValue::Text(raw.to_string())),
    }
}

fn is_null_literal(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
}

fn base_type(declared_type: &str) -> String {
    declared_type
        .to_lowercase()
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Dates/timestamps from a driver sometimes arrive space-separated
/// (`YYYY-MM-DD HH:MM:SS`) rather than ISO-8601; normalize by replacing
/// the first space with `T` before parsing.
fn normalize_temporal(raw: &str) -> String {
    raw.trim().replacen(' ', "T", 1)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let normalized = normalize_temporal(raw);
    let date_part = normalized.split('T').next().unwrap_or(&normalized);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let normalized = normalize_temporal(raw);
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(raw).map(|d| d.and_hms_opt(0, 0, 0).unwrap()))
}

fn coercion_err(table: &str, column: &str, declared_type: &str, raw: &str) -> Error {
    Error::CoercionError {
        table: table.to_string(),
        column: column.to_string(),
        declared_type: declared_type.to_string(),
        message: format!("could not parse {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_literal_variants() {
        for raw in ["", "  ", "null", "NULL"] {
            assert_eq!(coerce("t", "c", "int", raw).unwrap(), CellValue::Null);
        }
    }

    #[test]
    fn integer_family() {
        assert_eq!(
            coerce("t", "c", "INT4", "42").unwrap(),
            CellValue::Int(42)
        );
        assert_eq!(
            coerce("t", "c", "BIGSERIAL", "42").unwrap(),
            CellValue::Int(42)
        );
    }

    #[test]
    fn decimal_family() {
        assert_eq!(
            coerce("t", "c", "NUMERIC(10,2)", "3.50").unwrap(),
            CellValue::Float(3.5)
        );
    }

    #[test]
    fn date_with_space_separator() {
        let v = coerce("t", "c", "DATE", "2024-01-02 00:00:00").unwrap();
        assert_eq!(v, CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
    }

    #[test]
    fn unknown_type_falls_back_to_text() {
        assert_eq!(
            coerce("t", "c", "JSONB", "{}").unwrap(),
            CellValue::Text("{}".to_string())
        );
    }
}
