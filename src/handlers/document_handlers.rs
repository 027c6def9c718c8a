//! HTTP handlers for document upload, download, listing and deletion.
//! Downloads stream straight from the backend; placement and bookkeeping
//! are delegated to `DocumentService`.

use crate::{errors::AppError, models::record::StorageRecord, state::AppState};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// Query params accepted by `GET /documents`.
#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(format!("malformed multipart body: {}", err))
}

/// `POST /documents` - multipart with `file`, `category` and optional `name`.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut category: Option<String> = None;
    let mut name: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("category") => category = Some(field.text().await.map_err(multipart_error)?),
            Some("name") => name = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let original = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((original, data));
            }
            _ => {}
        }
    }

    let category = category.ok_or_else(|| AppError::bad_request("missing `category` field"))?;
    let (original_name, content) =
        file.ok_or_else(|| AppError::bad_request("missing `file` field"))?;

    let record = state
        .documents
        .upload(&category, name.as_deref(), &original_name, content)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /documents` - newest first, supports ?limit=&offset=
pub async fn list_documents(
    State(state): State<AppState>,
    Query(q): Query<ListDocumentsQuery>,
) -> Result<Json<Vec<StorageRecord>>, AppError> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);
    Ok(Json(state.documents.list(limit, offset).await?))
}

/// `GET /documents/{id}` - stream the document inline.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let opened = state.documents.open(id).await?;
    let body = Body::from_stream(ReaderStream::new(opened.reader));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_document_headers(response.headers_mut(), &opened.record);
    Ok(response)
}

/// `GET /documents/{id}/meta` - the stored record only.
pub async fn get_document_meta(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StorageRecord>, AppError> {
    Ok(Json(state.documents.fetch(id).await?))
}

/// `DELETE /documents/{id}` - remove the object, then its record.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let outcome = state.documents.delete(id).await?;
    if outcome.object_deleted {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok((
        StatusCode::OK,
        Json(json!({ "id": outcome.record.id, "deleted": false })),
    )
        .into_response())
}

fn set_document_headers(headers: &mut HeaderMap, record: &StorageRecord) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&record.file_name)),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&record.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&record.file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    if let Some(md5) = record.content_md5.as_deref() {
        if let Ok(value) = HeaderValue::from_str(md5) {
            headers.insert(CONTENT_MD5, value);
        }
    }

    let last_modified = record
        .created_at
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

fn content_disposition(file_name: &str) -> String {
    let escaped: String = file_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!("inline; filename=\"{}\"", escaped)
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "txt" | "log" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "html" | "htm" => "text/html; charset=utf-8",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
