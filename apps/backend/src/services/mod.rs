pub mod aggregator;
pub mod owner_lock;
