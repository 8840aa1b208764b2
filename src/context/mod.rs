//! Context builders: inventory, external and per-user snapshots.
//!
//! Each builder reads through the shared [`CacheLayer`](crate::cache::CacheLayer)
//! and always produces a value. Failed sources are reported inside the
//! snapshot instead of failing the build.

mod api_types;
pub mod external;
pub mod feeds;
pub mod inventory;
pub mod stats;
pub mod types;
pub mod user;

pub use external::ExternalContextBuilder;
pub use feeds::{ExternalFeeds, HttpFeeds};
pub use inventory::InventoryContextBuilder;
pub use types::{ExternalContext, InventoryContext, UserContext};
pub use user::UserContextBuilder;
