//! Spaced repetition scheduling.

pub mod leitner;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of scheduling a card after review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingResult {
    pub box_number: u8,
    pub next_review_at: DateTime<Utc>,
}
