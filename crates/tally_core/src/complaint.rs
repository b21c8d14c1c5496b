//! Administrative complaint marking

use tally_common::{NewRating, Rating, Score};

/// Appended to the customer reference of a rating marked as a complaint
pub const COMPLAINT_SUFFIX: &str = " (complaint)";

pub fn is_complaint(rating: &Rating) -> bool {
    rating.customer_number.ends_with(COMPLAINT_SUFFIX)
}

/// Update body turning `rating` into a complaint
///
/// The suffix is appended once; the score is forced to -2.
pub fn mark_complaint(rating: &Rating) -> NewRating {
    let mut update = rating.to_new();
    if !is_complaint(rating) {
        update.customer_number.push_str(COMPLAINT_SUFFIX);
    }
    update.score = Score::VeryPoor;
    update
}
