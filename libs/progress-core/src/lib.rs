//! Core progress library shared by the backend and the client engine.
//!
//! Provides:
//! - Route classification (navigation path -> activity type)
//! - Leitner box scheduling for flashcard reviews
//! - The daily aggregation fold (activity events -> daily progress)
//! - Shared types (ActivityType, ActivityEvent, DailyProgress, FlashCard)

pub mod aggregation;
pub mod algorithm;
pub mod error;
pub mod route;
pub mod types;

pub use aggregation::{aggregate_events, ActivityThresholds, AggregationOutcome};
pub use algorithm::leitner::Leitner;
pub use algorithm::SchedulingResult;
pub use error::{CoreError, Result};
pub use route::{classify, classify_route, content_id_from_path, RouteMatch};
pub use types::{ActivityEvent, ActivityType, DailyProgress, FlashCard};
