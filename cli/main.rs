use booru_search::prelude::*;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::{Pool, Sqlite, migrate::MigrateDatabase};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "booru-search")]
#[command(about = "Search users, posts and tags of a booru catalog", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./db/database.db",
        global = true
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args)]
pub struct SearchArgs {
    #[arg(help = "Search query, e.g. \"cat -tag:dog order:score,desc\"", default_value = "")]
    query: String,

    #[arg(short, long, default_value_t = 1, help = "1-based page number")]
    page: u32,

    #[arg(
        long,
        env = "SEARCH_PAGE_SIZE",
        help = "Results per page (defaults to the entity's page size)"
    )]
    page_size: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search user accounts
    Users(SearchArgs),
    /// Search posts
    Posts(SearchArgs),
    /// Search tags
    Tags(SearchArgs),
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to open database")]
    Connect(#[from] sqlx::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to render results")]
    Render(#[from] serde_json::Error),
}

fn print<E: Serialize>(result: &SearchResult<E>) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if !Sqlite::database_exists(&cli.database_url).await? {
        Sqlite::create_database(&cli.database_url).await?;
    }

    let db = Database::with_migration(Pool::connect(&cli.database_url).await?).await?;

    match cli.command {
        Commands::Users(args) => {
            let result = db
                .search(&UserSearchConfig, &args.query, args.page, args.page_size)
                .await?;
            print(&result)?;
        }
        Commands::Posts(args) => {
            let result = db
                .search(&PostSearchConfig, &args.query, args.page, args.page_size)
                .await?;
            print(&result)?;
        }
        Commands::Tags(args) => {
            let cache = MemoryCache::new();
            let config = match db.default_tag_category(&cache).await? {
                Some(name) => TagSearchConfig::new().with_default_category(name),
                None => TagSearchConfig::new(),
            };
            let result = db
                .search(&config, &args.query, args.page, args.page_size)
                .await?;
            print(&result)?;
        }
    }

    Ok(())
}
