//! # xposed-store
//!
//! SQLite persistence for the xPosed threat registry.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`, runs migrations on open, and provides typed
//! operations for reports, appeals, watchlist entries and the local user
//! directory. Every multi-step write runs inside a single `BEGIN IMMEDIATE`
//! transaction so that derived report fields are never observed out of step
//! with the review list.

pub mod appeals;
pub mod database;
pub mod migrations;
pub mod models;
pub mod reports;
pub mod users;
pub mod watchlist;

mod error;
mod sql;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
