//! Placement engine and the flows built on top of it.
//!
//! Leaves first: `path_builder` (pure), `share_probe` and `share_selector`
//! (capacity-aware share choice), `provisioner` (directory chains),
//! `collision` (free names), `placement` (orchestration), `retrieval`
//! (record -> object handle), then `record_store` and `document_service`.

pub mod collision;
pub mod document_service;
pub mod error;
pub mod path_builder;
pub mod placement;
pub mod provisioner;
pub mod record_store;
pub mod retrieval;
pub mod share_probe;
pub mod share_selector;
