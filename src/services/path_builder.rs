//! Maps an upload onto `category/year/month/day` and a safe base name.

use super::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};

/// Characters that are replaced with `_` in categories and base names.
const REPLACED: [char; 10] = [' ', '/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedPath {
    pub directory_path: String,
    pub base_name: String,
}

/// Replace separators and filesystem-hostile characters with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if REPLACED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

fn sanitize_component(field: &str, value: &str) -> StoreResult<String> {
    if value.is_empty() {
        return Err(StoreError::invalid(format!("{} must not be empty", field)));
    }
    let clean = sanitize(value);
    // "." and ".." would address the parent once joined into a path.
    if clean.chars().all(|c| c == '.') {
        return Err(StoreError::invalid(format!(
            "{} `{}` is not a usable name",
            field, value
        )));
    }
    Ok(clean)
}

/// Build the directory path and sanitized base name for an upload.
///
/// The date components come from the UTC calendar fields of `now`:
/// four-digit year, three-letter month, two-digit day.
pub fn build_path(category: &str, base_name: &str, now: DateTime<Utc>) -> StoreResult<PlannedPath> {
    let base_name = sanitize_component("base name", base_name)?;
    let category = sanitize_component("category", category)?;
    let directory_path = format!("{}/{}", category, now.format("%Y/%b/%d"));
    Ok(PlannedPath {
        directory_path,
        base_name,
    })
}

/// Split the final path component of an uploaded name into stem and
/// extension (the extension keeps its leading dot).
fn split_name(original_name: &str) -> (&str, &str) {
    let file_part = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    match file_part.rfind('.') {
        Some(0) | None => (file_part, ""),
        Some(pos) if pos + 1 == file_part.len() => (file_part, ""),
        Some(pos) => file_part.split_at(pos),
    }
}

/// Extension of the uploaded file including the leading dot, or "".
pub fn extension_of(original_name: &str) -> String {
    sanitize(split_name(original_name).1)
}

/// File name without its extension, used when no base name is supplied.
pub fn stem_of(original_name: &str) -> String {
    split_name(original_name).0.to_string()
}
