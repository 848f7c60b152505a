//! Admission control: concurrency slots, FIFO queueing, stop, stale sweep.

pub mod controller;

pub use controller::{AdmissionController, AdmissionTicket};
