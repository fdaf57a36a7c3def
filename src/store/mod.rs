//! Progression storage
//!
//! Engine-owned tables live next to the host application's tables in one
//! SQLite file (`~/.progression/progression.db` by default).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Coordinator   │     │   Host tables   │
//! │ catalog/progress│     │  users, posts   │
//! └────────┬────────┘     └────────┬────────┘
//!          │ read/write            │ read-only (facts)
//!          └───────────┬───────────┘
//!                      ▼
//!             progression.db
//! ```

pub mod catalog;
mod db;
pub mod facts;
pub mod models;
pub mod progress;
mod queries;

pub use db::{ProgressionDb, SCHEMA_VERSION};
pub use facts::{FactProvider, SqliteFacts, StaticFacts, UserFact};
pub use queries::ProgressQuery;
