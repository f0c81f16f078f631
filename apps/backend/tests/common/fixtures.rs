//! Test fixtures and factory functions for request bodies.

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

/// Create an owner register request body.
pub fn owner_register_request(name: Option<&str>) -> serde_json::Value {
    match name {
        Some(n) => json!({ "name": n }),
        None => json!({}),
    }
}

/// Create an activity track request body.
pub fn track_request(activity_type: &str, duration_seconds: i64, pathname: &str) -> serde_json::Value {
    json!({
        "activity_type": activity_type,
        "duration_seconds": duration_seconds,
        "pathname": pathname
    })
}

/// Create an activity track request body that names an owner.
pub fn track_request_for(owner_id: Uuid, activity_type: &str, duration_seconds: i64) -> serde_json::Value {
    json!({
        "owner_id": owner_id,
        "activity_type": activity_type,
        "duration_seconds": duration_seconds,
        "pathname": "/videos/v1",
        "content_id": "v1"
    })
}

/// Create a process-activities request body.
pub fn process_request(day: Option<NaiveDate>) -> serde_json::Value {
    match day {
        Some(d) => json!({ "day": d }),
        None => json!({}),
    }
}

/// Create a card creation request body.
pub fn create_card_request(front: &str, back: &str) -> serde_json::Value {
    json!({ "front": front, "back": back })
}

/// Create a review request body.
pub fn review_request(card_id: Uuid, is_correct: bool) -> serde_json::Value {
    json!({ "card_id": card_id, "is_correct": is_correct })
}

/// Create a bulk delete request body.
pub fn bulk_delete_request(card_ids: &[Uuid]) -> serde_json::Value {
    json!({ "card_ids": card_ids })
}
