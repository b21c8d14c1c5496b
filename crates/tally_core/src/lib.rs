//! # Tally Core
//!
//! Pure scoring logic over rating and daily-completion records:
//!
//! - [`aggregation`]: weekly / monthly / all-time sums and the leaderboard
//! - [`completion`]: the per-day visit reconciliation and penalty scheme
//! - [`complaint`]: administrative complaint marking
//!
//! Nothing in this crate performs I/O. Callers recompute whenever the record
//! set, the selected day or a visit override changes.

pub mod aggregation;
pub mod complaint;
pub mod completion;

pub use aggregation::{leaderboard, per_user, totals, LeaderboardEntry, UserTotal, Window, WindowTotals};
pub use complaint::mark_complaint;
pub use completion::{
    CompletionPlan, CompletionState, DailyTracker, RecordedDecision, TrackerSnapshot, UserSummary,
    VisitCount,
};
