//! Common types and errors for Tally
//!
//! This crate provides the records exchanged with the persistence boundary
//! and the error taxonomy shared by every Tally component.

pub mod sanitizer;
pub mod score;
pub mod telemetry;
pub mod validation;

pub use score::Score;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Customer reference reserved for synthetic penalty ratings
pub const PENALTY_REFERENCE: &str = "penalty";

/// Core error types for Tally operations
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Score out of range: {0} (expected -2..=2)")]
    InvalidScore(i32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Completion for {email} on {day} is already decided")]
    AlreadyDecided { email: String, day: NaiveDate },

    #[error("Cannot mark complete: {visits} visits but {completed} completed ratings")]
    VisitsOutstanding {
        visits: u32,
        completed: u32,
    },

    #[error("Cannot mark not complete: no missing visits ({completed} of {visits})")]
    NoMissingVisits {
        visits: u32,
        completed: u32,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// A submitted satisfaction rating as stored by the persistence boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Identifier assigned by the persistence boundary
    pub id: i64,

    /// Submitter display name
    pub name: String,

    /// Submitter email (identity key)
    pub email: String,

    /// Free-text customer reference
    pub customer_number: String,

    #[serde(rename = "rating")]
    pub score: Score,

    pub created_at: DateTime<Utc>,
}

impl Rating {
    /// Synthetic ratings inserted for missed visits
    pub fn is_penalty(&self) -> bool {
        self.customer_number == PENALTY_REFERENCE
    }

    /// The write payload that reproduces this rating
    pub fn to_new(&self) -> NewRating {
        NewRating {
            name: self.name.clone(),
            email: self.email.clone(),
            customer_number: self.customer_number.clone(),
            score: self.score,
        }
    }
}

/// Body of `POST /rating` and `PUT /rating`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub name: String,
    pub email: String,
    pub customer_number: String,
    #[serde(rename = "rating")]
    pub score: Score,
}

impl NewRating {
    /// A -2 rating standing in for one missed visit
    pub fn penalty(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            customer_number: PENALTY_REFERENCE.to_string(),
            score: Score::VeryPoor,
        }
    }
}

/// Administrative record of whether a user fulfilled a day's visits
///
/// Stored with a full timestamp; compare by calendar day only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCompletion {
    #[serde(default)]
    pub id: Option<i64>,

    pub name: String,

    pub email: String,

    #[serde(alias = "compleated")]
    pub completed: bool,

    pub created_at: DateTime<Utc>,
}

/// Body of `POST /day`
#[derive(Debug, Clone, PartialEq)]
pub struct NewDailyCompletion {
    pub name: String,
    pub email: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Serialize for NewDailyCompletion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut body = serializer.serialize_struct("NewDailyCompletion", 5)?;
        body.serialize_field("name", &self.name)?;
        body.serialize_field("email", &self.email)?;
        // The day handler only reads the misspelled key
        body.serialize_field("compleated", &self.completed)?;
        body.serialize_field("completed", &self.completed)?;
        body.serialize_field("createdAt", &self.created_at)?;
        body.end()
    }
}

/// The signed-in user as reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(default)]
    pub name: Option<String>,

    pub email: String,

    /// Avatar reference
    #[serde(default)]
    pub image: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
            image: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Profile record behind `/user`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,

    pub email: String,

    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// True when the stored name is missing a first or last part
    pub fn needs_full_name(&self) -> bool {
        !self
            .name
            .as_deref()
            .is_some_and(validation::is_full_name)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TallyError>;

/// Exit code for any failed command
pub const EXIT_ERROR: i32 = 1;
