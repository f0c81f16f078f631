pub mod activity;
pub mod auth;
pub mod cards;
pub mod owner;
pub mod planner;
pub mod progress;
