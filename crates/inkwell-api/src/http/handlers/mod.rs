//! API route handlers.

pub mod chat;
