//! Driver interface: a pluggable connection factory keyed by a short
//! dialect code, plus the cooperative cancellation token threaded
//! through a single export.
//!
//! One export owns one [`sqlx::AnyPool`] for its duration; the walker
//! drives prepared-statement lifetimes explicitly through it (sqlx's
//! query builders already release statements/result sets as soon as a
//! row stream is dropped, so there is no separate "close" step to
//! forget).

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use sqlx::any::{install_default_drivers, AnyPool, AnyPoolOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connection parameters as accepted by the CLI / library entry point.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub dialect: Dialect,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Builds a live connection pool for a dialect. Dialects the underlying
/// driver set cannot reach (H2 has no Rust network driver) fail with
/// [`Error::UnknownDialect`] rather than a generic connection error, so
/// callers can tell "unsupported dialect" apart from "bad credentials".
pub async fn connect(params: &ConnectParams) -> Result<AnyPool> {
    install_default_drivers();

    let url = match params.dialect {
        Dialect::Postgres | Dialect::MySql | Dialect::Sqlite => {
            with_credentials(&params.url, params.user.as_deref(), params.password.as_deref())?
        }
        Dialect::H2 => return Err(Error::UnknownDialect("h2".to_string())),
    };

    AnyPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .map_err(Error::Database)
}

/// Injects `user`/`password` into a connection URL's authority section
/// when they are supplied separately from the URL (the common case for
/// a CLI that takes `--login`/`--password` rather than asking for a
/// fully-formed connection string).
fn with_credentials(raw_url: &str, user: Option<&str>, password: Option<&str>) -> Result<String> {
    if user.is_none() && password.is_none() {
        return Ok(raw_url.to_string());
    }

    let mut url = url::Url::parse(raw_url)
        .map_err(|e| Error::MetadataError {
            table: String::new(),
            column: None,
            message: format!("invalid connection url: {e}"),
        })?;

    if let Some(user) = user {
        url.set_username(user).ok();
    }
    if let Some(password) = password {
        url.set_password(Some(password)).ok();
    }

    Ok(url.into())
}

/// Cooperative cancellation flag for a single export. Checked between
/// suspension points (catalog queries, row reads); never interrupts
/// in-flight I/O, it only prevents the walker from starting the next
/// step once the runtime has asked it to stop.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_checks_clean() {
        let token = Cancellation::new();
        assert!(token.check().is_ok());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancelled_token_surfaces_as_error() {
        let token = Cancellation::new();
        token.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn clones_share_the_same_flag() {
        let token = Cancellation::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
