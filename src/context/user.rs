//! Per-user context: the user's own recent actions.

use std::sync::Arc;
use tracing::warn;

use super::types::UserContext;
use crate::cache::{CacheLayer, CacheResult};
use crate::config::InventoryConfig;
use crate::store::{InventoryStore, QueryParams};

pub fn user_context_key(user_id: &str) -> String {
  format!("user_context:{}", user_id)
}

pub struct UserContextBuilder<S> {
  store: Arc<S>,
  cache: CacheLayer,
  settings: InventoryConfig,
}

impl<S: InventoryStore> UserContextBuilder<S> {
  pub fn new(store: Arc<S>, cache: CacheLayer, settings: InventoryConfig) -> Self {
    Self {
      store,
      cache,
      settings,
    }
  }

  pub async fn build(&self, user_id: &str) -> Arc<UserContext> {
    self.fetch(user_id).await.data
  }

  pub async fn fetch(&self, user_id: &str) -> CacheResult<Arc<UserContext>> {
    self
      .cache
      .get_or_build(&user_context_key(user_id), || self.assemble(user_id))
      .await
  }

  pub fn invalidate(&self, user_id: &str) -> bool {
    self.cache.cache().invalidate(&user_context_key(user_id))
  }

  async fn assemble(&self, user_id: &str) -> UserContext {
    let params = QueryParams::new(self.cache.cache().clock().now(), &self.settings);

    match self.store.user_activity(user_id, &params).await {
      Ok(recent_actions) => UserContext {
        user_id: user_id.to_string(),
        recent_actions,
        available: true,
      },
      Err(err) => {
        warn!(user_id, error = %err, "user activity query failed");
        UserContext {
          user_id: user_id.to_string(),
          recent_actions: Vec::new(),
          available: false,
        }
      }
    }
  }
}
