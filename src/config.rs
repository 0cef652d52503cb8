//! Command line and environment configuration.
//!
//! Every option can also be set through an environment variable, possibly from a
//! `.env` file in the working directory.

use clap::{Args, Parser, Subcommand};

use crate::schema::SchemaVersion;

#[derive(Parser, Debug)]
#[command(
    name = "tg_schema",
    version,
    about = "Create the collections and indexes of the chat tracking database"
)]
pub struct Cli {
    /// Schema variant to work on.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "FUN_SCHEMA",
        default_value_t = SchemaVersion::V2
    )]
    pub schema: SchemaVersion,

    /// Log filter, in env_logger syntax (e.g. `debug` or `tg_schema=trace`).
    #[arg(long, global = true, env = "FUN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub storage: StorageSettings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct StorageSettings {
    /// MongoDB connection string.
    #[arg(
        long,
        global = true,
        env = "FUN_STORAGE__MONGO_DB_URL",
        default_value = "mongodb://localhost:27017",
        hide_env_values = true
    )]
    pub mongo_db_url: String,

    /// Name of the database holding the collections.
    #[arg(long, global = true, env = "FUN_STORAGE__DATABASE", default_value = "db_main")]
    pub database: String,

    /// Seconds to wait for the server before giving up.
    #[arg(
        long,
        global = true,
        env = "FUN_STORAGE__TIMEOUT_SECS",
        default_value_t = 12
    )]
    pub timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the collections and indexes of the schema.
    Apply {
        /// Apply the schema to an empty in-memory database and show what would be created.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that the database has every collection and index of the schema.
    Verify,
    /// Print the collections and indexes of the schema.
    Show,
    /// Check that the database answers.
    Ping,
    /// Print document count and size of the collections of the schema.
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from(["tg_schema", "apply", "--dry-run", "--schema", "v1"]);
        assert_eq!(cli.command, Command::Apply { dry_run: true });
        assert_eq!(cli.schema, SchemaVersion::V1);
    }

    #[test]
    fn test_parse_storage() {
        let cli = Cli::parse_from([
            "tg_schema",
            "--mongo-db-url",
            "mongodb://mongo:27017",
            "--database",
            "tracking",
            "verify",
        ]);
        assert_eq!(cli.command, Command::Verify);
        assert_eq!(cli.storage.mongo_db_url, "mongodb://mongo:27017");
        assert_eq!(cli.storage.database, "tracking");
    }

    #[test]
    fn test_unknown_schema() {
        assert!(Cli::try_parse_from(["tg_schema", "show", "--schema", "v4"]).is_err());
    }
}
