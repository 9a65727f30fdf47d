//! Relational persistence adapter (assumed external collaborator per spec
//! §1; the relational store itself is out of scope, but a SQLite-backed
//! realization of the `*Store` traits is provided for integration tests,
//! following the teacher's `persistence` module split).

pub mod models;
pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
