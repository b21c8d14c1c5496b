use chrono::{FixedOffset, TimeZone, Utc};
use tally_core::aggregation::{
    leaderboard, per_user, totals, window_sum, Window, RANK_MARKERS,
};
use tally_test_helpers::prelude::*;

#[test]
fn test_monday_scenario() {
    // 2026-10-19 is a Monday
    let now = at(2026, 10, 19, 12);
    let ratings = vec![
        rating(1, "a@x.com", 2, at(2026, 10, 19, 8)),
        rating(2, "a@x.com", -1, at(2026, 9, 14, 8)),
    ];

    let sums = totals(&ratings, &now);
    assert_eq!(sums.weekly, 2);
    assert_eq!(sums.monthly, 2);
    assert_eq!(sums.all_time, 1);

    let weekly = per_user(&ratings, Window::Weekly, &now);
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].email, "a@x.com");
    assert_eq!(weekly[0].total, 2);
}

#[test]
fn test_saturday_boundary() {
    // Wednesday; the window opens Saturday 2026-10-17 00:00
    let now = at(2026, 10, 21, 10);
    let ratings = vec![
        rating_at_minute(1, 1, 2026, 10, 16, 23, 59), // Friday, excluded
        rating_at_minute(2, 2, 2026, 10, 17, 0, 0),   // Saturday midnight, included
        rating_at_minute(3, -1, 2026, 10, 18, 14, 0), // Sunday, included
        rating_at_minute(4, 2, 2026, 10, 10, 9, 0),   // previous week
    ];

    assert_eq!(window_sum(&ratings, Window::Weekly, &now), 1);
    assert_eq!(window_sum(&ratings, Window::AllTime, &now), 4);
}

fn rating_at_minute(
    id: i64,
    score: i32,
    y: i32,
    m: u32,
    d: u32,
    h: u32,
    min: u32,
) -> tally_common::Rating {
    rating(id, "w@x.com", score, Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
}

#[test]
fn test_windows_are_subsets_of_all_time() {
    let now = at(2026, 10, 19, 12);
    let ratings: Vec<_> = (0..40)
        .map(|i| {
            let score = (i % 5) as i32 - 2;
            rating(i, "s@x.com", score, at(2026, 10, 19, 11) - chrono::Duration::days(i))
        })
        .collect();

    let all: i64 = ratings.iter().map(|r| i64::from(r.score.value())).sum();
    assert_eq!(window_sum(&ratings, Window::AllTime, &now), all);

    for window in [Window::Weekly, Window::Monthly] {
        let start = window.start(&now).unwrap();
        let counted: Vec<_> = tally_core::aggregation::in_window(&ratings, window, &now).collect();
        assert!(counted.iter().all(|r| r.created_at >= start));
        assert!(counted.iter().all(|r| ratings.contains(r)));
        let expected: i64 = counted.iter().map(|r| i64::from(r.score.value())).sum();
        assert_eq!(window_sum(&ratings, window, &now), expected);
    }
}

#[test]
fn test_totals_match_every_window() {
    let now = at(2026, 10, 19, 12);
    let ratings = vec![
        rating(1, "a@x.com", 2, at(2026, 10, 19, 8)),
        rating(2, "a@x.com", 1, at(2026, 10, 2, 8)),
        rating(3, "a@x.com", -2, at(2026, 8, 30, 8)),
    ];

    let sums = totals(&ratings, &now);
    for window in Window::ALL {
        assert_eq!(sums.get(window), window_sum(&ratings, window, &now), "{window}");
    }
    let labels: Vec<String> = Window::ALL.iter().map(|w| w.to_string()).collect();
    assert_eq!(labels, ["all-time", "weekly", "monthly"]);
}

#[test]
fn test_local_time_zone_moves_boundary() {
    // 22:30 UTC Friday is already Saturday in UTC+3
    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    let now = at(2026, 10, 19, 12).with_timezone(&tz);
    let late_friday = Utc.with_ymd_and_hms(2026, 10, 16, 22, 30, 0).unwrap();
    let ratings = vec![rating(1, "tz@x.com", 2, late_friday)];

    assert_eq!(window_sum(&ratings, Window::Weekly, &now), 2);
    assert_eq!(window_sum(&ratings, Window::Weekly, &at(2026, 10, 19, 12)), 0);
}

#[test]
fn test_leaderboard_ranking() {
    let now = at(2026, 10, 19, 12);
    let day = at(2026, 10, 19, 9);
    let ratings = vec![
        rating(1, "c@x.com", 1, day),
        rating(2, "a@x.com", 2, day),
        rating(3, "b@x.com", 2, day),
        rating(4, "c@x.com", 2, day),
        rating(5, "d@x.com", -1, day),
        rating(6, "e@x.com", 0, day),
        rating(7, "f@x.com", -2, day),
    ];

    let board = leaderboard(&ratings, Window::AllTime, &now);
    let order: Vec<_> = board.iter().map(|e| e.email.as_str()).collect();
    // a and b tie on 2; email breaks the tie
    assert_eq!(order, ["c@x.com", "a@x.com", "b@x.com", "e@x.com", "d@x.com", "f@x.com"]);

    assert_eq!(board[0].total, 3);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].name, "c Tester");

    for (i, entry) in board.iter().take(5).enumerate() {
        assert_eq!(entry.marker, Some(RANK_MARKERS[i]));
    }
    assert_eq!(board[5].marker, None);
}

#[test]
fn test_leaderboard_respects_window() {
    let now = at(2026, 10, 19, 12);
    let ratings = vec![
        rating(1, "old@x.com", 2, at(2026, 9, 1, 9)),
        rating(2, "old@x.com", 2, at(2026, 9, 2, 9)),
        rating(3, "new@x.com", 1, at(2026, 10, 18, 9)),
    ];

    let monthly = leaderboard(&ratings, Window::Monthly, &now);
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].email, "new@x.com");

    let all = leaderboard(&ratings, Window::AllTime, &now);
    assert_eq!(all[0].email, "old@x.com");
    assert_eq!(all[0].total, 4);
}

#[test]
fn test_recomputation_is_idempotent() {
    let now = at(2026, 10, 19, 12);
    let ratings = vec![
        rating(1, "a@x.com", 2, at(2026, 10, 18, 9)),
        rating(2, "b@x.com", 1, at(2026, 10, 3, 9)),
    ];

    assert_eq!(totals(&ratings, &now), totals(&ratings, &now));
    assert_eq!(
        leaderboard(&ratings, Window::Weekly, &now),
        leaderboard(&ratings, Window::Weekly, &now)
    );
}

#[test]
fn test_empty_collection() {
    let now = at(2026, 10, 19, 12);
    let sums = totals(&[], &now);
    assert_eq!((sums.weekly, sums.monthly, sums.all_time), (0, 0, 0));
    assert!(leaderboard(&[], Window::Weekly, &now).is_empty());
}
