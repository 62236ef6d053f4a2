// Interest aggregation engine.
// Two-tier topic detection (keywords, then batched zero-shot), weighted
// attribution over post engagement trees, and periodic full recomputes.

pub mod aggregator;
pub mod attribution;
pub mod handlers;
pub mod keywords;
pub mod scheduler;
pub mod snapshot;
pub mod text;
pub mod topic;
pub mod zero_shot;
