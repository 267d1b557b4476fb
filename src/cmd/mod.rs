//! CLI surface: connection/traversal flags in, a JSON document or a
//! topological table order out.

mod export;
mod order;

use crate::db::Cancellation;
use clap::Parser;
use std::path::PathBuf;

// Help heading constants, grouping flags by concern in --help output.
const CONNECTION: &str = "Connection";
const TRAVERSAL: &str = "Traversal";
const OUTPUT_FORMAT: &str = "Output";

#[derive(Parser)]
#[command(name = "rowgraph")]
#[command(author, version)]
#[command(
    about = "Exports a connected subgraph of relational-database rows into a nested JSON document"
)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m
  rowgraph --url postgres://localhost/blog --tableName blogpost --pkValue 1
  rowgraph --url postgres://localhost/blog --tableName blogpost --pkValue 1 --canon --pretty
  rowgraph --url postgres://localhost/blog --tableName blogpost --pkValue 1 --stopTablesExcluded comment
  rowgraph --url postgres://localhost/blog --tableName blogpost --order")]
pub struct Cli {
    /// Connection URL passed to the driver factory
    #[arg(long, help_heading = CONNECTION)]
    pub url: String,

    /// SQL dialect: postgres, h2, mysql, sqlite
    #[arg(short = 'd', long = "dialect", alias = "db", default_value = "postgres", help_heading = CONNECTION)]
    pub dialect: String,

    /// Username, if not already embedded in the URL
    #[arg(long, help_heading = CONNECTION)]
    pub login: Option<String>,

    /// Password, if not already embedded in the URL
    #[arg(long, help_heading = CONNECTION)]
    pub password: Option<String>,

    /// Root table the export starts from
    #[arg(long = "tableName", help_heading = TRAVERSAL)]
    pub table_name: String,

    /// Root row's primary key value
    #[arg(long = "pkValue", required_unless_present = "order", help_heading = TRAVERSAL)]
    pub pk_value: Option<String>,

    /// Deny-list of tables to stop traversal at (comma-separated), checked before the allow-list
    #[arg(long = "stopTablesExcluded", value_delimiter = ',', help_heading = TRAVERSAL)]
    pub stop_tables_excluded: Vec<String>,

    /// Allow-list of tables to stop traversal at (comma-separated); unset means unconstrained
    #[arg(long = "stopTablesIncluded", value_delimiter = ',', help_heading = TRAVERSAL)]
    pub stop_tables_included: Vec<String>,

    /// Renumber surrogate PKs to a content hash, making the export byte-identical across databases with equivalent data
    #[arg(long, help_heading = TRAVERSAL)]
    pub canon: bool,

    /// Emit the topological insertion order for the reachable subgraph and exit, instead of exporting rows
    #[arg(long, help_heading = TRAVERSAL)]
    pub order: bool,

    /// Pretty-print the JSON document
    #[arg(long, help_heading = OUTPUT_FORMAT)]
    pub pretty: bool,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath, help_heading = OUTPUT_FORMAT)]
    pub output: Option<PathBuf>,
}

pub async fn run(cli: Cli, cancellation: Cancellation) -> anyhow::Result<()> {
    if cli.order {
        order::run(&cli).await
    } else {
        export::run(&cli, cancellation).await
    }
}
