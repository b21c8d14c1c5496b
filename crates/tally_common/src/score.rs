//! Rating scores

use crate::TallyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A satisfaction score in the closed range [-2, 2]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Score {
    VeryPoor = -2,
    Poor = -1,
    Fair = 0,
    Good = 1,
    Excellent = 2,
}

impl Score {
    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            Score::Excellent => "Excellent",
            Score::Good => "Good",
            Score::Fair => "Fair",
            Score::Poor => "Poor",
            Score::VeryPoor => "Very Poor",
        }
    }
}

impl TryFrom<i32> for Score {
    type Error = TallyError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -2 => Ok(Score::VeryPoor),
            -1 => Ok(Score::Poor),
            0 => Ok(Score::Fair),
            1 => Ok(Score::Good),
            2 => Ok(Score::Excellent),
            other => Err(TallyError::InvalidScore(other)),
        }
    }
}

impl From<Score> for i32 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+} ({})", self.value(), self.label())
    }
}
