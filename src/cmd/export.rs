//! Export command: connects, walks the row graph from `--tableName`/`--pkValue`,
//! optionally canonicalizes it, and writes the JSON document.

use crate::canon;
use crate::cmd::Cli;
use crate::db::{self, Cancellation, ConnectParams};
use crate::dialect::Dialect;
use crate::json;
use crate::model::PkValue;
use crate::schema::MetadataCache;
use crate::walker::{self, ExportOptions};
use anyhow::Context;
use tracing::info;

pub async fn run(cli: &Cli, cancellation: Cancellation) -> anyhow::Result<()> {
    let dialect: Dialect = cli.dialect.parse().context("parsing --dialect")?;
    let pool = db::connect(&ConnectParams {
        dialect,
        url: cli.url.clone(),
        user: cli.login.clone(),
        password: cli.password.clone(),
    })
    .await
    .context("connecting to database")?;

    let cache = MetadataCache::new();

    let pk_value = cli
        .pk_value
        .as_deref()
        .context("--pkValue is required unless --order is given")?;
    let root_pk = PkValue::from_sql_str(pk_value);

    let mut opts = ExportOptions::new();
    if !cli.stop_tables_included.is_empty() {
        opts = opts.with_included(cli.stop_tables_included.clone());
    }
    if !cli.stop_tables_excluded.is_empty() {
        opts = opts.with_excluded(cli.stop_tables_excluded.clone());
    }
    opts.cancellation = Some(cancellation);

    let mut result = walker::export(&pool, dialect, &cache, &cli.table_name, root_pk, &opts)
        .await
        .context("exporting row graph")?;

    info!(
        tables_visited = result.context.visited.len(),
        fk_edges_considered = result.context.treated_fks.len(),
        "export complete"
    );

    if cli.canon {
        canon::canonicalize(&pool, dialect, &cache, &mut result)
            .await
            .context("canonicalizing export")?;
    }

    let document = if cli.pretty {
        json::to_string_pretty(&result.root)
    } else {
        json::to_string(&result.root)
    }
    .context("serializing export to JSON")?;

    match &cli.output {
        Some(path) => std::fs::write(path, document).context("writing output file")?,
        None => println!("{document}"),
    }

    Ok(())
}
