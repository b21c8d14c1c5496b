//! Rating aggregation over time windows
//!
//! Every function here is a pure function of the rating slice and a
//! reference `now`. Window boundaries are computed in the time zone of
//! `now`, truncated to local midnight.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tally_common::{Rating, TallyError};

/// Decorative markers for leaderboard ranks 1 to 5
pub const RANK_MARKERS: [&str; 5] = ["🥇", "🥈", "🥉", "🏅", "🎖"];

/// Aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Window {
    /// From the most recent Saturday
    Weekly,
    /// From the first day of the current month
    Monthly,
    AllTime,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::AllTime, Window::Weekly, Window::Monthly];

    /// Inclusive lower bound of the window, `None` for all time
    pub fn start<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        match self {
            Window::Weekly => Some(week_start(now).with_timezone(&Utc)),
            Window::Monthly => Some(month_start(now).with_timezone(&Utc)),
            Window::AllTime => None,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
            Window::AllTime => "all-time",
        };
        f.write_str(s)
    }
}

impl FromStr for Window {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weekly" | "week" => Ok(Window::Weekly),
            "monthly" | "month" => Ok(Window::Monthly),
            "all-time" | "all" | "alltime" => Ok(Window::AllTime),
            other => Err(TallyError::ValidationError(format!(
                "unknown window '{}' (expected all-time, weekly or monthly)",
                other
            ))),
        }
    }
}

/// Midnight at the start of `day` in `tz`
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Tz> {
    let naive = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        // Midnight skipped by a DST jump
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Calendar day of an instant as seen in `tz`
pub fn day_of<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Local midnight of the most recent Saturday (today, if today is Saturday)
pub fn week_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let days_back = (now.weekday().num_days_from_sunday() + 1) % 7;
    let day = now.date_naive() - Duration::days(i64::from(days_back));
    local_midnight(&now.timezone(), day)
}

/// Local midnight of the first day of the current month
pub fn month_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    local_midnight(&now.timezone(), first)
}

/// Ratings falling inside `window`
pub fn in_window<'a, Tz: TimeZone>(
    ratings: &'a [Rating],
    window: Window,
    now: &DateTime<Tz>,
) -> impl Iterator<Item = &'a Rating> {
    let start = window.start(now);
    ratings
        .iter()
        .filter(move |r| start.map_or(true, |s| r.created_at >= s))
}

/// Sum of scores inside `window`
pub fn window_sum<Tz: TimeZone>(ratings: &[Rating], window: Window, now: &DateTime<Tz>) -> i64 {
    in_window(ratings, window, now)
        .map(|r| i64::from(r.score.value()))
        .sum()
}

/// The three window sums at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub weekly: i64,
    pub monthly: i64,
    pub all_time: i64,
}

impl WindowTotals {
    pub fn get(&self, window: Window) -> i64 {
        match window {
            Window::Weekly => self.weekly,
            Window::Monthly => self.monthly,
            Window::AllTime => self.all_time,
        }
    }
}

pub fn totals<Tz: TimeZone>(ratings: &[Rating], now: &DateTime<Tz>) -> WindowTotals {
    WindowTotals {
        weekly: window_sum(ratings, Window::Weekly, now),
        monthly: window_sum(ratings, Window::Monthly, now),
        all_time: window_sum(ratings, Window::AllTime, now),
    }
}

/// One submitter's aggregate inside a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTotal {
    pub email: String,
    /// Name from the first rating seen for this email
    pub name: String,
    pub total: i64,
    pub count: usize,
}

/// Group by submitter email, in order of first appearance
pub fn per_user<Tz: TimeZone>(
    ratings: &[Rating],
    window: Window,
    now: &DateTime<Tz>,
) -> Vec<UserTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut users: Vec<UserTotal> = Vec::new();

    for rating in in_window(ratings, window, now) {
        let slot = *index.entry(rating.email.as_str()).or_insert_with(|| {
            users.push(UserTotal {
                email: rating.email.clone(),
                name: rating.name.clone(),
                total: 0,
                count: 0,
            });
            users.len() - 1
        });
        users[slot].total += i64::from(rating.score.value());
        users[slot].count += 1;
    }

    users
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub email: String,
    pub name: String,
    pub total: i64,
    pub marker: Option<&'static str>,
}

/// Per-user totals ranked by descending score, ties broken by email
pub fn leaderboard<Tz: TimeZone>(
    ratings: &[Rating],
    window: Window,
    now: &DateTime<Tz>,
) -> Vec<LeaderboardEntry> {
    let mut users = per_user(ratings, window, now);
    users.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.email.cmp(&b.email)));

    users
        .into_iter()
        .enumerate()
        .map(|(i, user)| LeaderboardEntry {
            rank: i + 1,
            email: user.email,
            name: user.name,
            total: user.total,
            marker: RANK_MARKERS.get(i).copied(),
        })
        .collect()
}

/// Ratings created on `day` in `tz`
pub fn on_day<'a, Tz: TimeZone>(
    ratings: &'a [Rating],
    day: NaiveDate,
    tz: &'a Tz,
) -> impl Iterator<Item = &'a Rating> {
    ratings
        .iter()
        .filter(move |r| day_of(&r.created_at, tz) == day)
}

/// `YYYY-MM-DD HH:MM` in `tz`
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    at.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}
