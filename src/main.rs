use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};

mod config;
mod database;
mod error;
mod formatter;
mod schema;
mod setup;

use crate::config::{Cli, Command, StorageSettings};
use crate::database::{memory::MemoryDatabase, mongo::MongoDatabase, Database};
use crate::error::{DatabaseError, DatabaseErrorKind};
use crate::formatter::{format_apply_report, format_schema, format_stats, format_verify_report};
use crate::schema::Schema;
use crate::setup::{apply_schema, verify_schema};

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the environment may already be set.
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_log(&cli.log_level);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        if let Some(hint) = e.downcast_ref::<DatabaseError>().and_then(error_hint) {
            error!("{hint}");
        }
        std::process::exit(1);
    }
}

fn error_hint(e: &DatabaseError) -> Option<&'static str> {
    if e.is_duplicate_key() {
        return Some("existing documents violate a unique index of the schema");
    }
    match e.kind() {
        DatabaseErrorKind::IndexConflict => {
            Some("an index with the same name but a different shape exists, drop it first")
        }
        DatabaseErrorKind::Connection => Some("check that MongoDB is running and reachable"),
        _ => None,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let schema = Schema::for_version(cli.schema);

    match cli.command {
        Command::Show => {
            print!("{}", format_schema(&schema));
        }
        Command::Apply { dry_run: true } => {
            info!("Dry run, nothing is written to the database");
            let mut database = MemoryDatabase::new();
            let report = apply_schema(&mut database, &schema).await?;
            print!("{}", format_apply_report(&report));
        }
        Command::Apply { dry_run: false } => {
            let mut database = connect(&cli.storage).await?;
            let report = apply_schema(&mut database, &schema).await?;
            print!("{}", format_apply_report(&report));
        }
        Command::Verify => {
            let database = connect(&cli.storage).await?;
            let report = verify_schema(&database, &schema).await?;
            print!("{}", format_verify_report(&report));
            if !report.is_ok() {
                bail!("schema {} does not match the database", schema.version);
            }
        }
        Command::Ping => {
            connect(&cli.storage).await?;
            println!("pong");
        }
        Command::Stats => {
            let database = connect(&cli.storage).await?;
            let existing = database.collection_names().await?;

            let mut stats = vec![];
            for collection in &schema.collections {
                if !existing.contains(&collection.name) {
                    warn!("Collection {} does not exist", collection.name);
                    continue;
                }
                stats.push(database.collection_stats(&collection.name).await?);
            }
            print!("{}", format_stats(&stats));
        }
    }

    Ok(())
}

/// Connect to MongoDB and make sure the server answers before doing anything else.
async fn connect(settings: &StorageSettings) -> anyhow::Result<MongoDatabase> {
    info!("Connecting to database...");
    let database = MongoDatabase::connect(settings)
        .await
        .context("cannot initialize database")?;
    database.ping().await.context("database is unreachable")?;
    Ok(database)
}

fn init_log(filters: &str) {
    pretty_env_logger::formatted_builder()
        .parse_filters(filters)
        .init();
}
