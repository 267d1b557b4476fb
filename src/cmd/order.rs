//! Order command: emits the topological insertion order for the subgraph
//! reachable from `--tableName`, the order a bulk loader would need to
//! satisfy FK constraints while inserting rows produced by an export.

use crate::cmd::Cli;
use crate::db::{self, ConnectParams};
use crate::dialect::Dialect;
use crate::orderer;
use crate::schema::MetadataCache;
use anyhow::Context;

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
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

    let order = orderer::determine_insertion_order(&pool, dialect, &cache, &cli.table_name, false)
        .await
        .context("determining insertion order")?;

    for (i, table) in order.iter().enumerate() {
        println!("{}. {}", i + 1, table);
    }

    Ok(())
}
