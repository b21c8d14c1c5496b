//! Daily completion tracking
//!
//! For a selected calendar day, compares each user's expected visit count
//! with the ratings they actually submitted and turns the administrator's
//! Complete / Not Complete decision into a [`CompletionPlan`]. The plan is
//! executed against the persistence boundary by the sync layer; this module
//! performs no I/O.
//!
//! Per (email, day) the state moves `Unset -> PendingDecision -> Decided`.
//! `Decided` is terminal.

use crate::aggregation::{day_of, local_midnight};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tally_common::{
    DailyCompletion, NewDailyCompletion, NewRating, Rating, Result, Score, TallyError,
};

/// Points charged per missing visit
pub const PENALTY_POINTS: i64 = Score::VeryPoor as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CompletionState {
    Unset,
    PendingDecision,
    Decided { completed: bool },
}

/// Derived per-user row for the selected day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub email: String,
    pub name: String,
    /// Expected visits; never below `completed_ratings`
    pub visit_count: u32,
    /// Non-penalty ratings submitted that day
    pub completed_ratings: u32,
    /// Sum of the user's own ratings that day
    pub day_sum: i64,
    /// Penalty ratings stamped on that day
    ///
    /// The boundary stamps penalties when they are written, which may be
    /// after the day they were charged for.
    pub penalty_sum: i64,
    pub decision: Option<bool>,
    pub points: i64,
}

impl UserSummary {
    pub fn missing_visits(&self) -> u32 {
        self.visit_count.saturating_sub(self.completed_ratings)
    }

    pub fn state(&self) -> CompletionState {
        match self.decision {
            Some(completed) => CompletionState::Decided { completed },
            None => CompletionState::PendingDecision,
        }
    }
}

/// Outcome of a visit-count edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitCount {
    Accepted(u32),
    /// Requested value was below the completed-rating count
    Clamped { requested: u32, stored: u32 },
}

impl VisitCount {
    pub fn stored(&self) -> u32 {
        match *self {
            VisitCount::Accepted(n) => n,
            VisitCount::Clamped { stored, .. } => stored,
        }
    }

    /// User-facing warning for a clamped edit
    pub fn warning(&self) -> Option<String> {
        match *self {
            VisitCount::Accepted(_) => None,
            VisitCount::Clamped { requested, stored } => Some(format!(
                "Visit count cannot be less than completed ratings ({}); {} was reset to {}",
                stored, requested, stored
            )),
        }
    }
}

/// Remote writes needed to record one decision
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPlan {
    pub email: String,
    pub day: NaiveDate,
    /// One synthetic -2 rating per missing visit, written one by one
    pub penalties: Vec<NewRating>,
    pub record: NewDailyCompletion,
    pub points: i64,
}

/// Points fixed when a decision was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedDecision {
    pub email: String,
    pub day: NaiveDate,
    pub completed: bool,
    pub points: i64,
}

/// Persistable part of the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub visit_overrides: BTreeMap<String, u32>,
    /// Decisions made here, kept so later reloads report the same points
    #[serde(default)]
    pub decisions: Vec<RecordedDecision>,
}

pub struct DailyTracker<Tz: TimeZone> {
    tz: Tz,
    day: Option<NaiveDate>,
    visit_overrides: BTreeMap<String, u32>,
    /// Decisions made here, by (email, day): completed flag and points
    decisions: BTreeMap<(String, NaiveDate), (bool, i64)>,
    summaries: Vec<UserSummary>,
}

impl<Tz: TimeZone> DailyTracker<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            day: None,
            visit_overrides: BTreeMap::new(),
            decisions: BTreeMap::new(),
            summaries: Vec::new(),
        }
    }

    /// Rebuild from a snapshot; call [`select_day`](Self::select_day) next
    pub fn restore(tz: Tz, snapshot: TrackerSnapshot) -> Self {
        Self {
            tz,
            day: snapshot.day,
            visit_overrides: snapshot.visit_overrides,
            decisions: snapshot
                .decisions
                .into_iter()
                .map(|d| ((d.email, d.day), (d.completed, d.points)))
                .collect(),
            summaries: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            day: self.day,
            visit_overrides: self.visit_overrides.clone(),
            decisions: self
                .decisions
                .iter()
                .map(|((email, day), &(completed, points))| RecordedDecision {
                    email: email.clone(),
                    day: *day,
                    completed,
                    points,
                })
                .collect(),
        }
    }

    /// Drop a decision whose completion record never reached the boundary
    pub fn forget_decision(&mut self, email: &str, day: NaiveDate) {
        if self.decisions.remove(&(email.to_string(), day)).is_some() {
            if let Some(row) = self.summaries.iter_mut().find(|s| s.email == email) {
                if self.day == Some(day) {
                    row.decision = None;
                    row.points = row.day_sum;
                }
            }
        }
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn summaries(&self) -> &[UserSummary] {
        &self.summaries
    }

    pub fn summary(&self, email: &str) -> Option<&UserSummary> {
        self.summaries.iter().find(|s| s.email == email)
    }

    /// Select `day` and regenerate every summary
    ///
    /// Visit overrides survive only when the same day is reselected without
    /// `date_changed`. Decisions made here are kept for every day.
    pub fn select_day(
        &mut self,
        day: NaiveDate,
        date_changed: bool,
        ratings: &[Rating],
        completions: &[DailyCompletion],
    ) {
        if date_changed || self.day != Some(day) {
            tracing::debug!(%day, date_changed, "resetting visit overrides");
            self.visit_overrides.clear();
        }
        self.day = Some(day);
        self.summaries = self.build(day, ratings, completions);
    }

    fn build(
        &self,
        day: NaiveDate,
        ratings: &[Rating],
        completions: &[DailyCompletion],
    ) -> Vec<UserSummary> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<UserSummary> = Vec::new();

        for rating in ratings {
            let i = row_index(&mut index, &mut rows, &rating.email, &rating.name);
            if day_of(&rating.created_at, &self.tz) != day {
                continue;
            }
            let row = &mut rows[i];
            let score = i64::from(rating.score.value());
            if rating.is_penalty() {
                row.penalty_sum += score;
            } else {
                row.day_sum += score;
                row.completed_ratings += 1;
            }
        }

        for record in completions {
            if day_of(&record.created_at, &self.tz) == day {
                row_index(&mut index, &mut rows, &record.email, &record.name);
            }
        }

        for row in &mut rows {
            row.visit_count = self
                .visit_overrides
                .get(&row.email)
                .map_or(row.completed_ratings, |&v| v.max(row.completed_ratings));

            let recorded = find_decision(completions, &row.email, day, &self.tz);
            let decided = self.decisions.get(&(row.email.clone(), day));
            match (recorded, decided) {
                (Some(record), Some(&(_, points))) => {
                    row.decision = Some(record.completed);
                    row.points = points;
                }
                // Decided elsewhere: only penalties stamped on the day itself are known
                (Some(record), None) => {
                    row.decision = Some(record.completed);
                    row.points = if record.completed {
                        row.day_sum
                    } else {
                        row.day_sum + row.penalty_sum
                    };
                }
                (None, Some(&(completed, points))) => {
                    row.decision = Some(completed);
                    row.points = points;
                }
                (None, None) => {
                    row.decision = None;
                    row.points = row.day_sum;
                }
            }
        }

        rows
    }

    pub fn state(&self, email: &str) -> CompletionState {
        self.summary(email)
            .map_or(CompletionState::Unset, UserSummary::state)
    }

    /// Manually edit the expected visit count, clamping to the completed count
    pub fn set_visit_count(&mut self, email: &str, requested: u32) -> Result<VisitCount> {
        let day = self.require_day()?;
        let row = self.pending_row_mut(email, day)?;

        let outcome = if requested < row.completed_ratings {
            VisitCount::Clamped {
                requested,
                stored: row.completed_ratings,
            }
        } else {
            VisitCount::Accepted(requested)
        };
        row.visit_count = outcome.stored();
        self.visit_overrides
            .insert(email.to_string(), outcome.stored());

        if let Some(warning) = outcome.warning() {
            tracing::warn!("{}", warning);
        }
        Ok(outcome)
    }

    /// Decide "completed": only when no visit is missing
    pub fn complete(&mut self, email: &str) -> Result<CompletionPlan> {
        let day = self.require_day()?;
        let created_at = self.day_timestamp(day);
        let row = self.pending_row_mut(email, day)?;

        if row.visit_count != row.completed_ratings {
            return Err(TallyError::VisitsOutstanding {
                visits: row.visit_count,
                completed: row.completed_ratings,
            });
        }

        let points = row.day_sum;
        row.decision = Some(true);
        row.points = points;

        let plan = CompletionPlan {
            email: row.email.clone(),
            day,
            penalties: Vec::new(),
            record: NewDailyCompletion {
                name: row.name.clone(),
                email: row.email.clone(),
                completed: true,
                created_at,
            },
            points,
        };
        self.decisions.insert((email.to_string(), day), (true, points));
        Ok(plan)
    }

    /// Decide "not completed": one -2 penalty per missing visit
    pub fn not_complete(&mut self, email: &str) -> Result<CompletionPlan> {
        let day = self.require_day()?;
        let created_at = self.day_timestamp(day);
        let row = self.pending_row_mut(email, day)?;

        if row.visit_count == row.completed_ratings {
            return Err(TallyError::NoMissingVisits {
                visits: row.visit_count,
                completed: row.completed_ratings,
            });
        }

        let missing = row.missing_visits();
        let points = PENALTY_POINTS * i64::from(missing) + row.day_sum;
        row.decision = Some(false);
        row.points = points;

        let plan = CompletionPlan {
            email: row.email.clone(),
            day,
            penalties: (0..missing)
                .map(|_| NewRating::penalty(&row.name, &row.email))
                .collect(),
            record: NewDailyCompletion {
                name: row.name.clone(),
                email: row.email.clone(),
                completed: false,
                created_at,
            },
            points,
        };
        self.decisions.insert((email.to_string(), day), (false, points));
        Ok(plan)
    }

    fn require_day(&self) -> Result<NaiveDate> {
        self.day
            .ok_or_else(|| TallyError::ValidationError("no day selected".to_string()))
    }

    fn pending_row_mut(&mut self, email: &str, day: NaiveDate) -> Result<&mut UserSummary> {
        let row = self
            .summaries
            .iter_mut()
            .find(|s| s.email == email)
            .ok_or_else(|| TallyError::NotFound(format!("no summary for {} on {}", email, day)))?;

        if row.decision.is_some() {
            return Err(TallyError::AlreadyDecided {
                email: email.to_string(),
                day,
            });
        }
        Ok(row)
    }

    fn day_timestamp(&self, day: NaiveDate) -> chrono::DateTime<Utc> {
        local_midnight(&self.tz, day).with_timezone(&Utc)
    }
}

fn row_index(
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<UserSummary>,
    email: &str,
    name: &str,
) -> usize {
    if let Some(&i) = index.get(email) {
        return i;
    }
    rows.push(UserSummary {
        email: email.to_string(),
        name: name.to_string(),
        visit_count: 0,
        completed_ratings: 0,
        day_sum: 0,
        penalty_sum: 0,
        decision: None,
        points: 0,
    });
    index.insert(email.to_string(), rows.len() - 1);
    rows.len() - 1
}

/// Any completion record for `email` on `day`; duplicates are tolerated
pub fn find_decision<'a, Tz: TimeZone>(
    completions: &'a [DailyCompletion],
    email: &str,
    day: NaiveDate,
    tz: &Tz,
) -> Option<&'a DailyCompletion> {
    completions
        .iter()
        .find(|c| c.email == email && day_of(&c.created_at, tz) == day)
}
