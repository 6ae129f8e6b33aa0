use serde::{Deserialize, Serialize};

use super::{CardId, InvalidCode};

/// Answer given for a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    /// The button number, 1 to 4
    pub fn ease(self) -> u8 {
        match self {
            Grade::Again => 1,
            Grade::Hard => 2,
            Grade::Good => 3,
            Grade::Easy => 4,
        }
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> u8 {
        grade.ease()
    }
}

impl TryFrom<u8> for Grade {
    type Error = InvalidCode;

    fn try_from(ease: u8) -> Result<Self, Self::Error> {
        match ease {
            1 => Ok(Grade::Again),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            other => Err(InvalidCode { kind: "grade", code: i32::from(other) }),
        }
    }
}

/// Which phase a logged answer happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ReviewType {
    Learn,
    Review,
    Relearn,
    /// Answered in a filtered deck without rescheduling, or early
    Cram,
}

impl From<ReviewType> for i32 {
    fn from(kind: ReviewType) -> i32 {
        match kind {
            ReviewType::Learn => 0,
            ReviewType::Review => 1,
            ReviewType::Relearn => 2,
            ReviewType::Cram => 3,
        }
    }
}

impl TryFrom<i32> for ReviewType {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReviewType::Learn),
            1 => Ok(ReviewType::Review),
            2 => Ok(ReviewType::Relearn),
            3 => Ok(ReviewType::Cram),
            other => Err(InvalidCode { kind: "review type", code: other }),
        }
    }
}

/// One answered review
///
/// Intervals are in days when positive and in seconds when negative (learning
/// steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    /// Epoch milliseconds of the answer, unique per log
    pub id: i64,
    pub cid: CardId,
    pub usn: i32,
    pub ease: Grade,
    pub ivl: i64,
    pub last_ivl: i64,
    pub factor: i32,
    /// Answer time in milliseconds
    pub time: i64,
    #[serde(rename = "type")]
    pub review_type: ReviewType,
}
