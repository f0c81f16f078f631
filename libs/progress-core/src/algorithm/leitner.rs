//! Leitner box scheduling.
//!
//! Cards live in one of eight boxes. A correct recall promotes a card one box,
//! an incorrect one demotes it one box; the box decides the next review date
//! through a fixed, strictly increasing interval table.

use super::SchedulingResult;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};

pub const MIN_BOX: u8 = 1;
pub const MAX_BOX: u8 = 8;

/// Review interval in days for boxes 1..=8.
pub const BOX_INTERVAL_DAYS: [i64; MAX_BOX as usize] = [1, 2, 4, 7, 14, 30, 60, 90];

/// Leitner scheduler over a fixed interval table.
#[derive(Debug, Clone)]
pub struct Leitner {
    interval_days: [i64; MAX_BOX as usize],
}

impl Default for Leitner {
    fn default() -> Self {
        Self {
            interval_days: BOX_INTERVAL_DAYS,
        }
    }
}

impl Leitner {
    /// Validate a stored box number.
    pub fn check_box(box_number: i32) -> Result<u8> {
        if (MIN_BOX as i32..=MAX_BOX as i32).contains(&box_number) {
            Ok(box_number as u8)
        } else {
            Err(CoreError::InvalidBox(box_number))
        }
    }

    /// Box a card moves to after a review.
    pub fn next_box(box_number: u8, is_correct: bool) -> u8 {
        let current = box_number.clamp(MIN_BOX, MAX_BOX);
        if is_correct {
            (current + 1).min(MAX_BOX)
        } else {
            current.saturating_sub(1).max(MIN_BOX)
        }
    }

    /// Review interval for a box.
    pub fn interval(&self, box_number: u8) -> Duration {
        let index = box_number.clamp(MIN_BOX, MAX_BOX) as usize - 1;
        Duration::days(self.interval_days[index])
    }

    /// Compute the new box and due time for a review outcome.
    pub fn schedule(&self, box_number: u8, is_correct: bool, now: DateTime<Utc>) -> SchedulingResult {
        let new_box = Self::next_box(box_number, is_correct);
        SchedulingResult {
            box_number: new_box,
            next_review_at: now + self.interval(new_box),
        }
    }

    /// Placement of a freshly created card: box 1, due immediately.
    pub fn initial(&self, now: DateTime<Utc>) -> SchedulingResult {
        SchedulingResult {
            box_number: MIN_BOX,
            next_review_at: now,
        }
    }
}
