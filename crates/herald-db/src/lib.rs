//! PostgreSQL persistence for herald: plan and endpoint definitions, the
//! deployment log, and named deployment locks.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
