//! Interactive session: ask questions and run `:` commands against one
//! long-lived cache.

use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::cache::ContextCache;
use crate::context::ExternalFeeds;
use crate::prompt::{PromptAssembler, Role};
use crate::store::{MovementKind, SqliteStore};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All session commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "role",
    aliases: &["r"],
    usage: ":role <admin|manager|staff>",
    description: "Switch the role prompts are written for",
  },
  Command {
    name: "user",
    aliases: &["u", "whoami"],
    usage: ":user [id]",
    description: "Set the acting user, or clear it without an id",
  },
  Command {
    name: "move",
    aliases: &["m", "movement"],
    usage: ":move <sku> <in|out|sale|adjustment|return> <qty> [unit-price]",
    description: "Record a stock movement as the acting user",
  },
  Command {
    name: "refresh",
    aliases: &["rf", "reload"],
    usage: ":refresh [key-regex]",
    description: "Drop cached contexts, all of them without a pattern",
  },
  Command {
    name: "stats",
    aliases: &["st", "cache"],
    usage: ":stats",
    description: "Show cache hit/miss counters",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: ":help",
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: ":quit",
    description: "Leave the session",
  },
];

/// Get completion candidates for a partial command name, best first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| {
      let priority = if cmd.name == input_lower {
        0
      } else if cmd.aliases.contains(&input_lower.as_str()) {
        1
      } else if cmd.name.starts_with(&input_lower) {
        2
      } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
        3
      } else if cmd.name.contains(&input_lower) {
        4
      } else {
        return None;
      };
      Some((cmd, priority))
    })
    .collect();

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a typed command name. Fuzzy matches are never executed.
fn resolve(input: &str) -> Result<&'static Command, String> {
  let suggestions = get_suggestions(input);
  match suggestions.first() {
    Some(cmd)
      if cmd.name == input.to_lowercase()
        || cmd.aliases.contains(&input.to_lowercase().as_str())
        || cmd.name.starts_with(&input.to_lowercase()) =>
    {
      Ok(cmd)
    }
    Some(cmd) => Err(format!("Unknown command :{}. Did you mean :{}?", input, cmd.name)),
    None => Err(format!("Unknown command :{}. Try :help", input)),
  }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
  Ask(String),
  Role(Role),
  User(Option<String>),
  Move {
    sku: String,
    kind: MovementKind,
    quantity: i64,
    unit_price: Option<f64>,
  },
  Refresh(Option<String>),
  Stats,
  Help,
  Quit,
}

fn parse(line: &str) -> Result<Option<Action>, String> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }
  let Some(rest) = line.strip_prefix(':') else {
    return Ok(Some(Action::Ask(line.to_string())));
  };

  let mut words = rest.split_whitespace();
  let name = words.next().ok_or_else(|| "Empty command. Try :help".to_string())?;
  let args: Vec<&str> = words.collect();
  let command = resolve(name)?;
  let usage = || format!("Usage: {}", command.usage);

  let action = match (command.name, args.as_slice()) {
    ("role", [role]) => Action::Role(<Role as ValueEnum>::from_str(role, true)?),
    ("user", []) => Action::User(None),
    ("user", [id]) => Action::User(Some(id.to_string())),
    ("move", [sku, kind, quantity, price @ ..]) if price.len() <= 1 => Action::Move {
      sku: sku.to_uppercase(),
      kind: MovementKind::from_str(kind, true)?,
      quantity: quantity
        .parse()
        .map_err(|_| format!("Invalid quantity '{}'", quantity))?,
      unit_price: price
        .first()
        .map(|p| p.parse().map_err(|_| format!("Invalid unit price '{}'", p)))
        .transpose()?,
    },
    ("refresh", []) => Action::Refresh(None),
    ("refresh", [pattern]) => Action::Refresh(Some(pattern.to_string())),
    ("stats", []) => Action::Stats,
    ("help", _) => Action::Help,
    ("quit", _) => Action::Quit,
    _ => return Err(usage()),
  };
  Ok(Some(action))
}

fn help_text() -> String {
  let mut out = String::from("Type a question to build a prompt, or a command:\n");
  for cmd in COMMANDS {
    let _ = writeln!(out, "  {:<64} {}", cmd.usage, cmd.description);
  }
  out
}

pub struct Session<F> {
  assembler: PromptAssembler<SqliteStore, F>,
  store: Arc<SqliteStore>,
  cache: Arc<ContextCache>,
  role: Role,
  user: Option<String>,
}

impl<F: ExternalFeeds> Session<F> {
  pub fn new(
    assembler: PromptAssembler<SqliteStore, F>,
    store: Arc<SqliteStore>,
    cache: Arc<ContextCache>,
    role: Role,
    user: Option<String>,
  ) -> Self {
    Self {
      assembler,
      store,
      cache,
      role,
      user,
    }
  }

  /// Read lines until `:quit` or end of input.
  pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
  where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
  {
    let mut lines = input.lines();
    write_out(&mut output, &help_text()).await?;

    loop {
      write_out(&mut output, &format!("{}> ", self.role)).await?;
      let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| eyre!("Failed to read input: {}", e))?
      else {
        break;
      };

      let action = match parse(&line) {
        Ok(Some(action)) => action,
        Ok(None) => continue,
        Err(message) => {
          write_out(&mut output, &format!("{}\n", message)).await?;
          continue;
        }
      };
      if action == Action::Quit {
        break;
      }

      let reply = self.execute(action).await;
      write_out(&mut output, &reply).await?;
    }

    Ok(())
  }

  async fn execute(&mut self, action: Action) -> String {
    match action {
      Action::Ask(query) => match &self.user {
        Some(user) => {
          self
            .assembler
            .build_for_user(self.role, Some(&query), user)
            .await
        }
        None => {
          self
            .assembler
            .build_comprehensive_ai_context(self.role, Some(&query))
            .await
        }
      },
      Action::Role(role) => {
        self.role = role;
        format!("Role set to {}\n", role.title())
      }
      Action::User(user) => {
        let reply = match &user {
          Some(id) => format!("Acting as {}\n", id),
          None => "Acting user cleared\n".to_string(),
        };
        self.user = user;
        reply
      }
      Action::Move {
        sku,
        kind,
        quantity,
        unit_price,
      } => self.record_movement(&sku, kind, quantity, unit_price).await,
      Action::Refresh(None) => {
        self.cache.clear();
        "All cached contexts dropped\n".to_string()
      }
      Action::Refresh(Some(pattern)) => match self.cache.invalidate_matching(&pattern) {
        Ok(removed) => format!("Dropped {} cached context(s)\n", removed),
        Err(err) => format!("Invalid pattern: {}\n", err),
      },
      Action::Stats => {
        let stats = self.cache.stats();
        format!(
          "Cache: {} hits, {} misses ({:.0}% hit rate), {} entries\n",
          stats.hits,
          stats.misses,
          stats.hit_rate() * 100.0,
          stats.entries
        )
      }
      Action::Help => help_text(),
      Action::Quit => String::new(),
    }
  }

  async fn record_movement(
    &self,
    sku: &str,
    kind: MovementKind,
    quantity: i64,
    unit_price: Option<f64>,
  ) -> String {
    let Some(user) = self.user.as_deref() else {
      return "Set an acting user with :user <id> first\n".to_string();
    };

    let now = self.cache.clock().now();
    match self
      .store
      .record_movement(sku, kind, quantity, unit_price, user, now)
      .await
    {
      Ok(receipt) => {
        // System health counts activity, so the external context goes too.
        self.assembler.inventory().invalidate();
        self.assembler.external().invalidate();
        self.assembler.users().invalidate(user);
        format!(
          "{}: {} -> {}\n",
          receipt.product_name, receipt.previous_quantity, receipt.new_quantity
        )
      }
      Err(err) => {
        warn!(sku, error = %err, "movement rejected");
        format!("Movement not recorded: {}\n", err)
      }
    }
  }
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
  output
    .write_all(text.as_bytes())
    .await
    .map_err(|e| eyre!("Failed to write output: {}", e))?;
  output
    .flush()
    .await
    .map_err(|e| eyre!("Failed to write output: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, CacheTtls, Clock, ManualClock};
  use crate::config::Config;
  use crate::context::types::{EconomicSnapshot, WeatherSnapshot};
  use crate::db::{seed::seed_demo_data, Database};
  use crate::error::FetchError;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_alias_and_prefix_match() {
    assert_eq!(get_suggestions("role")[0].name, "role");
    assert_eq!(get_suggestions("q")[0].name, "quit");
    assert_eq!(get_suggestions("ref")[0].name, "refresh");
    assert_eq!(get_suggestions("movement")[0].name, "move");
  }

  #[test]
  fn test_fuzzy_match_is_only_suggested() {
    assert_eq!(get_suggestions("fresh")[0].name, "refresh");
    assert_eq!(
      parse(":fresh"),
      Err("Unknown command :fresh. Did you mean :refresh?".to_string())
    );
  }

  #[test]
  fn test_parse_lines() {
    assert_eq!(parse("   "), Ok(None));
    assert_eq!(
      parse("what is low?"),
      Ok(Some(Action::Ask("what is low?".to_string())))
    );
    assert_eq!(parse(":r Staff"), Ok(Some(Action::Role(Role::Staff))));
    assert_eq!(parse(":user"), Ok(Some(Action::User(None))));
    assert_eq!(
      parse(":m bev-001 sale 3 6.5"),
      Ok(Some(Action::Move {
        sku: "BEV-001".to_string(),
        kind: MovementKind::Sale,
        quantity: 3,
        unit_price: Some(6.5),
      }))
    );
    assert_eq!(parse(":role"), Err("Usage: :role <admin|manager|staff>".to_string()));
    assert!(parse(":move BEV-001 sale many").is_err());
    assert!(parse(":zzz").is_err());
  }

  struct NoFeeds;

  impl ExternalFeeds for NoFeeds {
    async fn weather(&self) -> Result<WeatherSnapshot, FetchError> {
      Err(FetchError::MissingApiKey("weather API"))
    }

    async fn economic(&self) -> Result<EconomicSnapshot, FetchError> {
      Err(FetchError::MissingApiKey("exchange-rate API"))
    }
  }

  fn session() -> Session<NoFeeds> {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(ContextCache::with_clock(CacheTtls::default(), clock.clone()));
    let db = Database::open_in_memory().unwrap();
    seed_demo_data(db.conn(), clock.now()).unwrap();
    let store = Arc::new(SqliteStore::new(db));

    let assembler = PromptAssembler::new(
      Arc::clone(&store),
      Arc::new(NoFeeds),
      CacheLayer::new(Arc::clone(&cache)),
      &Config::default(),
    );
    Session::new(assembler, store, cache, Role::Manager, None)
  }

  async fn run(session: &mut Session<NoFeeds>, input: &str) -> String {
    let mut output = Vec::new();
    session.run(input.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output).unwrap()
  }

  #[tokio::test]
  async fn test_session_question_then_quit() {
    let mut session = session();
    let output = run(&mut session, "which products are critical?\n:quit\nignored\n").await;

    assert!(output.contains("=== FOCUS ==="));
    assert!(output.contains("Speaking with: Inventory Manager"));
    assert_eq!(session.cache.stats().misses, 2);
  }

  #[tokio::test]
  async fn test_movement_requires_user() {
    let mut session = session();
    let output = run(&mut session, ":move BEV-001 sale 2\n").await;
    assert!(output.contains("Set an acting user"));
  }

  #[tokio::test]
  async fn test_movement_invalidates_inventory_context() {
    let mut session = session();
    let output = run(
      &mut session,
      "overview\n:user dave\n:move SNK-002 in 12\noverview\n",
    )
    .await;

    assert!(output.contains("Trail Mix: 0 -> 12"));
    assert!(output.contains("Out of stock: 1"));
    assert!(output.contains("Out of stock: 0"));
  }

  #[tokio::test]
  async fn test_movement_refreshes_system_activity() {
    let mut session = session();
    let output = run(
      &mut session,
      "overview\n:user dave\n:move BEV-001 sale 1\noverview\n",
    )
    .await;

    assert!(output.contains("3 actions in 24h, last activity 2024-06-01 10:00 UTC"));
    assert!(output.contains("4 actions in 24h, last activity 2024-06-01 12:00 UTC"));
  }

  #[tokio::test]
  async fn test_refresh_and_stats() {
    let mut session = session();
    let output = run(&mut session, "overview\noverview\n:stats\n:refresh\n:stats\n").await;

    assert!(output.contains("Cache: 2 hits, 2 misses (50% hit rate), 2 entries"));
    assert!(output.contains("All cached contexts dropped"));
    assert!(output.contains("Cache: 2 hits, 2 misses (50% hit rate), 0 entries"));
  }

  #[tokio::test]
  async fn test_refresh_by_pattern() {
    let mut session = session();
    let output = run(&mut session, "overview
:refresh ^external
:refresh (
:stats
").await;

    assert!(output.contains("Dropped 1 cached context(s)"));
    assert!(output.contains("Invalid pattern:"));
    assert!(output.contains("1 entries"));
  }

  #[tokio::test]
  async fn test_rejected_movement_is_reported() {
    let mut session = session();
    let output = run(&mut session, ":user dave\n:move SNK-002 sale 1\n").await;
    assert!(output.contains("Movement not recorded: write rejected"));
  }
}
