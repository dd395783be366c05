// Configuration authority: one-shot fetches of schedule-block and target
// configuration, plus the live target feed used while a product observes.

mod client;
mod feed;
mod models;

pub use client::AuthorityClient;
pub use feed::{BackoffConfig, TargetFeed};
pub use models::{SubarrayConfig, TargetConfig};
