mod args;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sql_shim::prelude::*;
use tracing::Level;

use crate::args::{Args, BackendKind};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> CliResult<String> {
    if args.explain {
        let descriptor = args.mode.parse(&args.sql, &args.params)?;
        return Ok(serde_json::to_string_pretty(&descriptor)?);
    }

    let store = open_store(&args).await?;
    let options = ShimOptionsBuilder::new().parse_mode(args.mode).finish();
    let shim = SqlShim::from_arc(store).with_options(options);
    tracing::debug!(backend = ?args.backend, sql = %args.sql, "executing");

    let output = shim
        .prepare(&args.sql)
        .params(&args.params)
        .execute(args.cardinality)
        .await?;
    Ok(serde_json::to_string_pretty(&output)?)
}

async fn open_store(args: &Args) -> CliResult<Arc<dyn RowStore>> {
    match args.backend {
        BackendKind::Memory => {
            let store = MemoryRowStore::new();
            for table in &args.tables {
                store.create_table(table.name.clone(), table.columns.iter().cloned());
            }
            Ok(Arc::new(store))
        }
        BackendKind::Sqlite => open_sqlite(&args.db).await,
        BackendKind::Rest => open_rest(args.rest_url.as_deref(), args.rest_key.as_deref()),
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(db: &str) -> CliResult<Arc<dyn RowStore>> {
    let store = SqliteRowStore::builder(db.to_string()).build().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_db: &str) -> CliResult<Arc<dyn RowStore>> {
    Err(SqlShimError::ConfigError("built without the `sqlite` feature".into()).into())
}

#[cfg(feature = "rest")]
fn open_rest(url: Option<&str>, key: Option<&str>) -> CliResult<Arc<dyn RowStore>> {
    let (Some(url), Some(key)) = (url, key) else {
        return Err(SqlShimError::ConfigError(
            "the rest backend needs --rest-url and --rest-key".into(),
        )
        .into());
    };
    let store = RestRowStore::builder(url.to_string(), key.to_string()).build()?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rest"))]
fn open_rest(_url: Option<&str>, _key: Option<&str>) -> CliResult<Arc<dyn RowStore>> {
    Err(SqlShimError::ConfigError("built without the `rest` feature".into()).into())
}
