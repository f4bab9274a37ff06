//! Pending burn rewards for one connected account
//!
//! - `types`: reward records and the published snapshot
//! - `reconcile`: merging subgraph and reader data, display order
//! - `engine`: `fetch_rewards`, session state and `refresh`
//! - `scheduler`: the periodic loop and its stop handle

pub mod engine;
pub mod reconcile;
pub mod scheduler;
pub mod types;

pub use engine::{EngineSettings, RewardsEngine};
pub use reconcile::{compare_rewards, RewardSet};
pub use scheduler::{start, RewardsWatchHandle, ScheduleSettings};
pub use types::{BurnReward, RewardSource, RewardsSnapshot, RewardsStatus};
