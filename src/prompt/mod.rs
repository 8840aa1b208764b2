//! Prompt assembly.
//!
//! Pulls the context snapshots through their caches and renders them into
//! one fixed-structure prompt. Given the same snapshots the output is
//! identical, so a fixed clock makes it fully deterministic.

pub mod hints;
mod render;
mod role;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

pub use role::Role;

use crate::cache::{CacheLayer, Clock};
use crate::config::Config;
use crate::context::{
  ExternalContext, ExternalContextBuilder, ExternalFeeds, InventoryContext,
  InventoryContextBuilder, UserContext, UserContextBuilder,
};
use crate::store::InventoryStore;

pub struct PromptAssembler<S, F> {
  clock: Arc<dyn Clock>,
  inventory: InventoryContextBuilder<S>,
  external: ExternalContextBuilder<S, F>,
  users: UserContextBuilder<S>,
}

impl<S: InventoryStore, F: ExternalFeeds> PromptAssembler<S, F> {
  pub fn new(store: Arc<S>, feeds: Arc<F>, cache: CacheLayer, config: &Config) -> Self {
    Self {
      clock: Arc::clone(cache.cache().clock()),
      inventory: InventoryContextBuilder::new(
        Arc::clone(&store),
        cache.clone(),
        config.inventory.clone(),
      ),
      external: ExternalContextBuilder::new(
        Arc::clone(&store),
        feeds,
        cache.clone(),
        config.external.http_timeout(),
      ),
      users: UserContextBuilder::new(store, cache, config.inventory.clone()),
    }
  }

  pub fn inventory(&self) -> &InventoryContextBuilder<S> {
    &self.inventory
  }

  pub fn external(&self) -> &ExternalContextBuilder<S, F> {
    &self.external
  }

  pub fn users(&self) -> &UserContextBuilder<S> {
    &self.users
  }

  /// Render the prompt for `role`, focused on `query` when one is given.
  pub async fn build_comprehensive_ai_context(&self, role: Role, query: Option<&str>) -> String {
    let (inventory, external) = futures::join!(self.inventory.build(), self.external.build());
    let now = self.clock.now();
    render_prompt(role, query, now, &inventory, &external, None)
  }

  /// Like [`build_comprehensive_ai_context`](Self::build_comprehensive_ai_context),
  /// with the user's own recent activity included.
  pub async fn build_for_user(&self, role: Role, query: Option<&str>, user_id: &str) -> String {
    let (inventory, external, user) = futures::join!(
      self.inventory.build(),
      self.external.build(),
      self.users.build(user_id),
    );
    let now = self.clock.now();
    render_prompt(role, query, now, &inventory, &external, Some(&user))
  }
}

fn render_prompt(
  role: Role,
  query: Option<&str>,
  now: DateTime<Utc>,
  inventory: &InventoryContext,
  external: &ExternalContext,
  user: Option<&UserContext>,
) -> String {
  let query = query.map(str::trim).filter(|q| !q.is_empty());
  let hints = query
    .map(|q| hints::render_hints(q, inventory, external))
    .unwrap_or_default();
  debug!(role = role.as_str(), hints = hints.len(), "rendering prompt");

  let mut out = String::new();
  render::preamble(&mut out, role, &now, &inventory.generated_at);
  render::focus(&mut out, &hints);
  render::overview(&mut out, inventory);
  render::stock_alerts(&mut out, inventory);
  render::expiring(&mut out, inventory);
  render::categories(&mut out, inventory);
  render::vendors(&mut out, inventory);
  render::predictions(&mut out, inventory);
  render::recent(&mut out, inventory);
  render::external(&mut out, external);
  if let Some(user) = user {
    render::user(&mut out, user);
  }
  render::data_quality(&mut out, inventory, external);
  render::role(&mut out, role);
  if let Some(query) = query {
    render::question(&mut out, query);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheTtls, ContextCache, ManualClock};
  use chrono::Duration;
  use crate::context::types::{EconomicSnapshot, WeatherSnapshot};
  use crate::db::{seed::seed_demo_data, Database};
  use crate::error::FetchError;
  use crate::store::SqliteStore;
  use std::collections::BTreeMap;

  struct OfflineFeeds;

  impl ExternalFeeds for OfflineFeeds {
    async fn weather(&self) -> Result<WeatherSnapshot, FetchError> {
      Err(FetchError::MissingApiKey("weather API"))
    }

    async fn economic(&self) -> Result<EconomicSnapshot, FetchError> {
      Ok(EconomicSnapshot {
        base_currency: "USD".to_string(),
        rates: BTreeMap::from([("EUR".to_string(), 0.92), ("GBP".to_string(), 0.79)]),
        updated_at: None,
      })
    }
  }

  fn assembler() -> PromptAssembler<SqliteStore, OfflineFeeds> {
    assembler_with_clock().1
  }

  fn assembler_with_clock() -> (Arc<ManualClock>, PromptAssembler<SqliteStore, OfflineFeeds>) {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(ContextCache::with_clock(CacheTtls::default(), clock.clone()));
    let db = Database::open_in_memory().unwrap();
    seed_demo_data(db.conn(), clock.now()).unwrap();

    let assembler = PromptAssembler::new(
      Arc::new(SqliteStore::new(db)),
      Arc::new(OfflineFeeds),
      CacheLayer::new(cache),
      &Config::default(),
    );
    (clock, assembler)
  }

  #[tokio::test]
  async fn test_critical_query_adds_focus() {
    let prompt = assembler()
      .build_comprehensive_ai_context(Role::Manager, Some("what is critical"))
      .await;

    let focus = prompt.find("=== FOCUS ===").unwrap();
    let overview = prompt.find("=== INVENTORY OVERVIEW ===").unwrap();
    assert!(focus < overview);
    assert!(prompt.contains("CRITICAL STOCK:"));
    assert!(prompt.contains("- Trail Mix (SNK-002): 0 units left"));
    assert!(!prompt.contains("VENDOR RELIABILITY:"));
    assert!(prompt.contains("=== QUESTION ===\nwhat is critical"));
  }

  #[tokio::test]
  async fn test_vendor_query_adds_vendor_hint() {
    let prompt = assembler()
      .build_comprehensive_ai_context(Role::Admin, Some("vendor reliability"))
      .await;

    assert!(prompt.contains("VENDOR RELIABILITY:"));
    assert!(prompt.contains("- CrunchTime Foods: 33% on time (1/3 orders)"));
    assert!(!prompt.contains("CRITICAL STOCK:"));
  }

  #[tokio::test]
  async fn test_unrelated_query_has_no_focus() {
    let prompt = assembler()
      .build_comprehensive_ai_context(Role::Staff, Some("tell me a joke"))
      .await;

    assert!(!prompt.contains("=== FOCUS ==="));
    assert!(prompt.contains(Role::Staff.capabilities()));
  }

  #[tokio::test]
  async fn test_prompt_embeds_context_and_missing_weather() {
    let prompt = assembler()
      .build_comprehensive_ai_context(Role::Manager, None)
      .await;

    assert!(prompt.contains("Current time: 2024-06-01 12:00 UTC"));
    assert!(prompt.contains("Inventory data as of: 2024-06-01 12:00 UTC"));
    assert!(prompt.contains("Health score: 60/100"));
    assert!(prompt.contains("Estimated inventory value: $1665.81"));
    assert!(prompt.contains("Beverages [CRITICAL]"));
    assert!(prompt.contains("Weather: Data unavailable."));
    assert!(prompt.contains("Exchange rates (base USD): EUR=0.9200, GBP=0.7900"));
    assert!(prompt.contains("Some data could not be loaded: weather."));
    assert!(!prompt.contains("=== QUESTION ==="));
  }

  #[tokio::test]
  async fn test_prompt_is_deterministic() {
    let assembler = assembler();
    let first = assembler
      .build_comprehensive_ai_context(Role::Manager, Some("forecast"))
      .await;
    let second = assembler
      .build_comprehensive_ai_context(Role::Manager, Some("forecast"))
      .await;

    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_cached_snapshot_keeps_its_build_time() {
    let (clock, assembler) = assembler_with_clock();
    assembler.build_comprehensive_ai_context(Role::Manager, None).await;

    clock.advance(Duration::minutes(3));
    let prompt = assembler
      .build_comprehensive_ai_context(Role::Manager, None)
      .await;

    assert!(prompt.contains("Current time: 2024-06-01 12:03 UTC"));
    assert!(prompt.contains("Inventory data as of: 2024-06-01 12:00 UTC"));
  }

  #[tokio::test]
  async fn test_user_prompt_includes_user_activity() {
    let prompt = assembler()
      .build_for_user(Role::Staff, Some("what should I restock"), "alice")
      .await;

    assert!(prompt.contains("=== YOUR RECENT ACTIVITY ===\nUser: alice"));
    assert!(prompt.contains("Adjusted Trail Mix quantity to 0"));
    assert!(prompt.contains("REORDER:"));
  }
}
