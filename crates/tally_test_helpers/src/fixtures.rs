//! Record builders for tests

use chrono::{DateTime, TimeZone, Utc};
use tally_common::{DailyCompletion, Rating, Score, PENALTY_REFERENCE};

/// UTC instant on the hour
///
/// # Panics
/// On an invalid calendar date.
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A rating whose submitter name is derived from the email's local part
///
/// # Panics
/// When `score` is outside -2..=2.
pub fn rating(id: i64, email: &str, score: i32, created_at: DateTime<Utc>) -> Rating {
    let local = email.split('@').next().unwrap_or(email);
    rating_named(id, &format!("{} Tester", local), email, score, created_at)
}

pub fn rating_named(
    id: i64,
    name: &str,
    email: &str,
    score: i32,
    created_at: DateTime<Utc>,
) -> Rating {
    Rating {
        id,
        name: name.to_string(),
        email: email.to_string(),
        customer_number: format!("{}", 1000 + id),
        score: Score::try_from(score).expect("fixture score in range"),
        created_at,
    }
}

/// A synthetic -2 penalty rating
pub fn penalty(id: i64, email: &str, created_at: DateTime<Utc>) -> Rating {
    let mut r = rating(id, email, -2, created_at);
    r.customer_number = PENALTY_REFERENCE.to_string();
    r
}

pub fn completion(email: &str, completed: bool, created_at: DateTime<Utc>) -> DailyCompletion {
    let local = email.split('@').next().unwrap_or(email);
    DailyCompletion {
        id: None,
        name: format!("{} Tester", local),
        email: email.to_string(),
        completed,
        created_at,
    }
}
