//! Business core of a multi-provider LLM gateway: channel/model resolution,
//! dispatch, quota, cost, permissions, and channel probing.
//!
//! The relational store, upstream HTTP transport, and wire-format
//! translation are external collaborators represented only by traits
//! (`Transformer`, `HttpClient`, the `*Store` traits) — see `dispatch`,
//! `quota::store`, `probe::store`, and `store` for the SQLite-backed
//! realization used by integration tests.

pub mod apikey;
pub mod association;
pub mod cache;
pub mod config;
pub mod cost;
pub mod detach;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod permission;
pub mod probe;
pub mod quota;
pub mod store;
pub mod time;
pub mod txn;
pub mod version;

pub use error::{GatewayError, Result};
