//! Persistence for the concept and progress collections.

pub mod migrations;
pub mod sqlite;

pub use sqlite::Database;
