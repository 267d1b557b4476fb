//! Dialect identification and the case-adaptation rule the schema probe
//! applies to table names before querying a driver's catalog.
//!
//! Column names returned from any catalog are always stored lowercased
//! inside the engine; only the *table* name passed into a catalog query
//! gets dialect-specific re-casing.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A short dialect code, as accepted by `-db`/`--dialect` and the driver
/// factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    H2,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Re-case a table name the way this dialect's catalog expects it.
    /// PostgreSQL lowercases, H2 uppercases, MySQL leaves it unchanged,
    /// and anything not explicitly known uppercases (see
    /// [`FromStr`] — unknown codes never reach here because the factory
    /// rejects them first).
    pub fn adapt_table_name(&self, name: &str) -> String {
        match self {
            Dialect::Postgres => name.to_lowercase(),
            Dialect::H2 => name.to_uppercase(),
            Dialect::MySql => name.to_string(),
            Dialect::Sqlite => name.to_string(),
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "h2" => Ok(Dialect::H2),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(Error::UnknownDialect(other.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::H2 => write!(f, "h2"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_adaptation_matches_dialect_table() {
        assert_eq!(Dialect::Postgres.adapt_table_name("BlogPost"), "blogpost");
        assert_eq!(Dialect::H2.adapt_table_name("BlogPost"), "BLOGPOST");
        assert_eq!(Dialect::MySql.adapt_table_name("BlogPost"), "BlogPost");
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(Error::UnknownDialect(_))
        ));
    }
}
