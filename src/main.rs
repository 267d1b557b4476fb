// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod canon;
mod cmd;
mod db;
mod dialect;
mod error;
mod json;
mod model;
mod orderer;
mod row;
mod schema;
mod value;
mod walker;

use clap::Parser;
use cmd::Cli;
use db::Cancellation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cancellation = Cancellation::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    if let Err(e) = cmd::run(cli, cancellation).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
