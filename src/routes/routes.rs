//! Defines routes for the document store.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz` - liveness
//!   - `GET    /readyz` - record store + backend readiness
//!
//! - **Documents**
//!   - `POST   /documents` - upload (multipart: `file`, `category`, `name`)
//!   - `GET    /documents` - list records (supports limit, offset)
//!   - `GET    /documents/{id}` - stream content
//!   - `GET    /documents/{id}/meta` - record only
//!   - `DELETE /documents/{id}` - delete object, then record

use crate::{
    handlers::{
        document_handlers::{
            delete_document, get_document, get_document_meta, list_documents, upload_document,
        },
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router carrying `AppState` to all handlers.
///
/// Uploads are buffered before placement, so their size is capped at
/// `max_upload_bytes`.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/documents",
            post(upload_document)
                .get(list_documents)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/documents/{id}",
            get(get_document).delete(delete_document),
        )
        .route("/documents/{id}/meta", get(get_document_meta))
}
