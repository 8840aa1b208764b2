mod cache;
mod config;
mod context;
mod db;
mod error;
mod logging;
mod prompt;
mod session;
mod store;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use cache::{CacheLayer, ContextCache};
use config::Config;
use context::HttpFeeds;
use db::Database;
use prompt::{PromptAssembler, Role};
use store::{MovementKind, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "stocksight")]
#[command(about = "Inventory context and prompt builder for an AI assistant")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stocksight/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// SQLite database to use instead of the configured one
  #[arg(short, long, global = true)]
  database: Option<PathBuf>,

  /// Also log to stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Build both contexts and print the assembled prompt
  Prompt {
    #[arg(short, long, value_enum, default_value_t = Role::Manager)]
    role: Role,

    /// Question to focus the prompt on
    #[arg(short, long)]
    query: Option<String>,

    /// Include this user's recent activity
    #[arg(short, long)]
    user: Option<String>,
  },
  /// Print the inventory context as JSON
  Inventory,
  /// Print the external context as JSON
  External,
  /// Load the demo data set into an empty database
  Seed,
  /// Record a stock movement
  Movement {
    sku: String,

    #[arg(value_enum)]
    kind: MovementKind,

    quantity: i64,

    #[arg(long)]
    unit_price: Option<f64>,

    /// Acting user for the activity log
    #[arg(short, long, default_value = "cli")]
    user: String,
  },
  /// Interactive session over one shared cache
  Session {
    #[arg(short, long, value_enum, default_value_t = Role::Manager)]
    role: Role,

    #[arg(short, long)]
    user: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override database if specified on command line
  if let Some(path) = args.database {
    config.database.path = Some(path);
  }

  let _log_guard = logging::init(&config::data_dir()?.join("logs"), args.verbose)?;

  let db_path = config.database_path()?;
  let db = Database::open(&db_path)?;
  tracing::info!(path = %db_path.display(), "opened inventory database");

  let store = Arc::new(SqliteStore::new(db));
  let cache = Arc::new(ContextCache::new(config.cache.ttls()));
  let feeds = Arc::new(HttpFeeds::from_env(&config)?);
  let assembler = PromptAssembler::new(
    Arc::clone(&store),
    feeds,
    CacheLayer::new(Arc::clone(&cache)),
    &config,
  );

  match args.command {
    Command::Prompt { role, query, user } => {
      let prompt = match user {
        Some(user) => assembler.build_for_user(role, query.as_deref(), &user).await,
        None => {
          assembler
            .build_comprehensive_ai_context(role, query.as_deref())
            .await
        }
      };
      print!("{}", prompt);
    }
    Command::Inventory => print_json(&*assembler.inventory().build().await)?,
    Command::External => print_json(&*assembler.external().build().await)?,
    Command::Movement {
      sku,
      kind,
      quantity,
      unit_price,
      user,
    } => {
      let receipt = store
        .record_movement(&sku, kind, quantity, unit_price, &user, Utc::now())
        .await
        .map_err(|e| eyre!("Failed to record movement: {}", e))?;
      println!(
        "{} {} x{}: {} -> {}",
        kind.as_str(),
        receipt.product_name,
        quantity,
        receipt.previous_quantity,
        receipt.new_quantity
      );
    }
    Command::Session { role, user } => {
      let mut session = session::Session::new(assembler, store, cache, role, user);
      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      session.run(stdin, tokio::io::stdout()).await?;
    }
    Command::Seed => {
      let summary = store.seed_demo_data(Utc::now()).await?;
      println!(
        "Seeded {}: {} products in {} categories from {} vendors, {} movements, {} purchase orders",
        db_path.display(),
        summary.products,
        summary.categories,
        summary.vendors,
        summary.movements,
        summary.orders
      );
    }
  }

  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to serialize context: {}", e))?;
  println!("{}", json);
  Ok(())
}
