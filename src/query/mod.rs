//! Query engine
//!
//! Pure functions over a [`Snapshot`]. Nothing here holds state, so results
//! depend only on the inputs.
//!
//! Consumers compose them in a fixed order, search → filter → sort, which
//! [`apply`] does in one call:
//!
//! ```ignore
//! use issuechat::query::{self, FilterSpec, SortMode};
//!
//! let spec = FilterSpec::new().author("alice").tag("urgent");
//! let view = query::apply(&snapshot, "deploy", &spec, SortMode::Popular);
//! ```

mod filter;
mod sort;
pub mod stats;

pub use filter::{filter, search, DateRange, FilterSpec, HasComments};
pub use sort::{sort, SortMode};
pub use stats::{
    active_users, activity_summary, available_authors, available_tags, message_stats,
    user_stats, ActiveUser, ActivitySummary, MessageStats, UserStats,
};

use crate::chat::Snapshot;

/// Run the canonical search → filter → sort pipeline
pub fn apply(snapshot: &Snapshot, query: &str, spec: &FilterSpec, mode: SortMode) -> Snapshot {
    let found = search(snapshot, query);
    let kept = filter(&found, spec);
    sort(&kept, mode)
}
