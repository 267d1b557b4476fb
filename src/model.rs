//! Core data model shared by every component: identifiers, column and
//! foreign-key metadata, row identity, and the record tree an export
//! produces.

use ahash::AHashMap;
use std::fmt;

/// Lowercases a table or column name the way the engine expects it to be
/// stored internally. Original-case spelling is kept only at the edges
/// (issuing SQL, talking to a catalog) — see [`crate::dialect::Dialect::adapt_table_name`].
pub fn normalize_ident(name: &str) -> String {
    name.to_lowercase()
}

/// Column metadata as returned by the schema probe, ordered by
/// `ordinal_position`.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub name: String,
    pub type_name: String,
    /// Driver/JDBC-style type code, when the underlying driver exposes one.
    pub type_code: Option<i32>,
    pub size: Option<u32>,
    pub default_expr: Option<String>,
    /// 1-based position; determines statement parameter order.
    pub ordinal_position: u32,
    pub is_nullable: bool,
}

/// A foreign-key constraint between two tables, discovered from either
/// the exported-keys or imported-keys side of the catalog.
#[derive(Debug, Clone)]
pub struct ForeignKeyEdge {
    pub pk_table: String,
    pub pk_column: String,
    pub fk_table: String,
    pub fk_column: String,
    pub declared_type: Option<String>,
    /// `false` when discovered via exported keys (this table is the
    /// referenced/PK side; `pk_column` belongs to this table); `true` when
    /// discovered via imported keys (this table holds the FK column
    /// itself; `fk_column` belongs to this table). Ignored by equality —
    /// the same physical constraint surfaces from both sides and must
    /// still dedupe.
    pub inverted: bool,
}

impl PartialEq for ForeignKeyEdge {
    fn eq(&self, other: &Self) -> bool {
        self.pk_table == other.pk_table
            && self.pk_column == other.pk_column
            && self.fk_table == other.fk_table
            && self.fk_column == other.fk_column
    }
}
impl Eq for ForeignKeyEdge {}

impl fmt::Display for ForeignKeyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.fk_table, self.fk_column, self.pk_table, self.pk_column
        )
    }
}

/// The normalized form of a primary-key scalar: integral numeric types
/// collapse to `Int`, everything else keeps its textual form and
/// compares by that canonical string. Guarantees `(T, 7)` and `(T, 7i64)`
/// hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PkValue {
    Int(i64),
    Text(String),
}

impl PkValue {
    pub fn from_sql_str(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(i) => PkValue::Int(i),
            Err(_) => PkValue::Text(raw.to_string()),
        }
    }

    pub fn as_canonical_string(&self) -> String {
        match self {
            PkValue::Int(i) => i.to_string(),
            PkValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for PkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical_string())
    }
}

/// A `(table, normalized-pk)` identity used to deduplicate nodes in the
/// visited set. The short-form `"table/pk"` encoding is accepted for
/// reconstructing a RowLink from a serialized diagnostic; parsing is
/// best-effort and deterministic: an integer-shaped tail becomes an
/// integer, anything else stays a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowLink {
    pub table: String,
    pub pk: PkValue,
}

impl RowLink {
    pub fn new(table: impl Into<String>, pk: PkValue) -> Self {
        Self {
            table: normalize_ident(&table.into()),
            pk,
        }
    }

    /// Parses the `"table/pk"` short form. Returns `None` if there is no
    /// `/` separator.
    pub fn parse(expr: &str) -> Option<Self> {
        let (table, pk) = expr.split_once('/')?;
        Some(Self::new(table, PkValue::from_sql_str(pk)))
    }
}

impl fmt::Display for RowLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.pk)
    }
}

/// A single bound/typed value materialized from a result row. `Null`
/// is distinguished because both the coercer and the walker need to
/// special-case it (nullable FK columns short-circuit traversal).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(chrono::NaiveDate),
    DateTime(chrono::NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// One column value within a [`Record`], plus the nested rows reached by
/// traversing through it (only populated for columns that drove an FK
/// edge).
#[derive(Debug, Clone)]
pub struct Cell {
    pub name: String,
    pub value: CellValue,
    pub metadata: Option<ColumnMetadata>,
    /// child-table-name -> ordered child records, reached through this
    /// cell's FK edge.
    pub sub_rows: AHashMap<String, Vec<Record>>,
}

impl Cell {
    pub fn new(name: impl Into<String>, value: CellValue, metadata: Option<ColumnMetadata>) -> Self {
        Self {
            name: name.into(),
            value,
            metadata,
            sub_rows: AHashMap::new(),
        }
    }

    pub fn find_mut(cells: &mut [Cell], column: &str) -> Option<&mut Cell> {
        cells.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn find(cells: &[Cell], column: &str) -> Option<&Cell> {
        cells.iter().find(|c| c.name.eq_ignore_ascii_case(column))
    }
}

/// One row of one table, as attached to the export tree.
#[derive(Debug, Clone)]
pub struct Record {
    pub row_link: RowLink,
    pub cells: Vec<Cell>,
    /// Name of the column the Row Reader promoted into `row_link.pk`, if
    /// the table has a usable (non-composite) primary key. The
    /// Canonicalizer uses this to tell "this record's own identity
    /// column" apart from an FK column that merely happens to hold a
    /// matching value.
    pub pk_column: Option<String>,
}

impl Record {
    pub fn new(row_link: RowLink, cells: Vec<Cell>) -> Self {
        Self {
            row_link,
            cells,
            pk_column: None,
        }
    }

    pub fn with_pk_column(row_link: RowLink, cells: Vec<Cell>, pk_column: Option<String>) -> Self {
        Self {
            row_link,
            cells,
            pk_column,
        }
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        Cell::find(&self.cells, name)
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        Cell::find_mut(&mut self.cells, name)
    }
}

/// Owns the visited-node set and the diagnostic FK log for the duration
/// of one export call. Append-only within one export; never shared
/// across exports.
#[derive(Debug, Default)]
pub struct ExportContext {
    pub visited: AHashMap<RowLink, ()>,
    pub treated_fks: Vec<ForeignKeyEdge>,
}

impl ExportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_visited(&mut self, link: RowLink) -> bool {
        self.visited.insert(link, ()).is_none()
    }

    pub fn is_visited(&self, link: &RowLink) -> bool {
        self.visited.contains_key(link)
    }

    pub fn record_fk(&mut self, fk: ForeignKeyEdge) {
        self.treated_fks.push(fk);
    }
}

/// The result of one export: the root record plus the [`ExportContext`]
/// that drove it, returned alongside the record rather than stuffed into
/// a reserved metadata key.
#[derive(Debug)]
pub struct ExportResult {
    pub root: Record,
    pub context: ExportContext,
}
