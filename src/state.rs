//! Shared state handed to every handler.

use crate::{
    services::{document_service::DocumentService, record_store::RecordStore},
    storage::SharedBackend,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentService,
    /// Metadata store, used directly only by readiness checks.
    pub records: Arc<dyn RecordStore>,
    /// Storage backend, used directly only by readiness checks.
    pub backend: SharedBackend,
}
