//! oxide-relate CLI
//!
//! Diagnostic tool for the query and table layers: tokenize expressions,
//! run statements and print reconstructed trees.

use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::{debug, info, Level as LogLevel};
use tracing_subscriber::FmtSubscriber;

use oxide_query::tokenize;
use oxide_table::tree::{Level, Program};
use oxide_table::{Connection, SqliteDatabase};

/// Relational query composition over SQLite.
#[derive(Parser)]
#[command(name = "oxide-relate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database: String,

    /// Statement to run before the command; repeatable.
    #[arg(short, long)]
    setup: Vec<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of an SQL expression fragment.
    Tokenize {
        /// The expression.
        expression: String,
    },

    /// Execute statements and print the affected row counts.
    Exec {
        /// Statements, run in order.
        #[arg(required = true)]
        statements: Vec<String>,
    },

    /// Run a query and print its rows as JSON.
    Query {
        /// The query.
        sql: String,
    },

    /// Run a query and print its rows reconstructed into a tree.
    Structure {
        /// The query; rows must be sorted by the levels' fields.
        sql: String,

        /// Level as `name[@key]:field,field`, outermost first; repeatable.
        #[arg(short, long = "level", required = true)]
        levels: Vec<LevelArg>,
    },
}

/// A tree level given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LevelArg(Level);

impl FromStr for LevelArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, fields) = s.split_once(':').unwrap_or((s, ""));
        let fields: Vec<&str> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        let level = match head.split_once('@') {
            Some((name, key)) if !name.is_empty() && !key.is_empty() => {
                Level::keyed(name, key, fields)
            }
            None if !head.is_empty() => Level::listed(head, fields),
            _ => return Err(format!("invalid level `{s}`, expected name[@key]:field,field")),
        };
        if level.key.is_none() && level.fields.is_empty() {
            return Err(format!("level `{s}` needs a key or at least one field"));
        }
        Ok(Self(level))
    }
}

/// Renders one line per token: kind, then the token text.
fn describe_tokens(expression: &str) -> Vec<String> {
    tokenize(expression)
        .into_iter()
        .map(|token| format!("{:<12} {:?}", token.kind.as_str(), token.text))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        LogLevel::DEBUG
    } else {
        LogLevel::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Tokenize { expression } = &cli.command {
        for line in describe_tokens(expression) {
            println!("{line}");
        }
        return Ok(());
    }

    let db = SqliteDatabase::connect(&cli.database).await?;
    for statement in &cli.setup {
        let affected = db.execute(statement).await?;
        debug!(affected, "Setup statement executed");
    }

    match cli.command {
        Commands::Tokenize { .. } => {}

        Commands::Exec { statements } => {
            for statement in &statements {
                let affected = db.execute(statement).await?;
                info!(affected, "Statement executed");
                println!("{affected}");
            }
        }

        Commands::Query { sql } => {
            let rows = db.query(&sql).await?;
            info!(rows = rows.len(), "Query returned");
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Commands::Structure { sql, levels } => {
            let program = Program::new(levels.into_iter().map(|level| level.0).collect());
            let tree = db.query_structure(&program, &sql).await?;
            info!(entries = tree.len(), "Structure reconstructed");
            println!("{}", serde_json::to_string_pretty(&tree.to_json())?);
        }
    }

    Ok(())
}
