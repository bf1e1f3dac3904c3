//! Token Reconciler - orphaned soft-token cleanup against the directory service.

pub mod config;
pub mod housekeeping;
pub mod models;
pub mod pipeline;
pub mod services;
