//! Daily usage quota tracking.

pub mod tracker;

pub use tracker::QuotaTracker;
