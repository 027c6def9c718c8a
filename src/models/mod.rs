//! Data models for the share-backed document store.
//!
//! Records map to the `documents` table via `sqlx::FromRow` and serialize
//! as JSON via `serde`.

pub mod record;
