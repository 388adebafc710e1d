// ── Typed request payloads for listing commands ──
//
// Drafts are normalised and validated here, before any remote call.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Category, Condition, Dimensions, ListingStatus, UserId};

pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_PHOTOS: usize = 5;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_TAGS: usize = 5;

// ── ListingDraft ────────────────────────────────────────────────────

/// The editable fields of a listing, as a create or edit form holds them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub condition: Condition,
    /// Availability; new listings start out `PENDING`.
    pub status: ListingStatus,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_instructions: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl ListingDraft {
    /// Trim text fields; drop empty and duplicate tags, keeping order.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_owned();
        self.description = self.description.trim().to_owned();
        self.location = self.location.trim().to_owned();
        self.pickup_instructions = self
            .pickup_instructions
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_owned());
            }
        }
        self.tags = tags;
        self
    }

    /// Check the form fields. Expects a normalised draft.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.is_empty() {
            return Err(CoreError::validation("title", "is required"));
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(CoreError::validation(
                "title",
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }
        if self.description.is_empty() {
            return Err(CoreError::validation("description", "is required"));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(CoreError::validation(
                "description",
                format!("must be at most {MAX_DESCRIPTION_CHARS} characters"),
            ));
        }
        if self.category.is_none() {
            return Err(CoreError::validation("category", "is required"));
        }
        if self.location.is_empty() {
            return Err(CoreError::validation("location", "is required"));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(CoreError::validation(
                "tags",
                format!("at most {MAX_TAGS} tags are allowed"),
            ));
        }
        if let Some(ref d) = self.dimensions {
            if [d.length, d.width, d.height].iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(CoreError::validation(
                    "dimensions",
                    "must be non-negative numbers",
                ));
            }
        }
        Ok(())
    }
}

/// Check the photo set a listing would end up with.
pub fn validate_photos(kept: usize, new: &[PhotoUpload]) -> Result<(), CoreError> {
    if kept + new.len() > MAX_PHOTOS {
        return Err(CoreError::validation(
            "photos",
            format!("at most {MAX_PHOTOS} photos are allowed"),
        ));
    }
    for photo in new {
        if !photo.content_type.starts_with("image/") {
            return Err(CoreError::validation(
                "photos",
                format!("{} is not an image", photo.file_name),
            ));
        }
        if photo.bytes.len() > MAX_PHOTO_BYTES {
            return Err(CoreError::validation(
                "photos",
                format!("{} is larger than 5 MB", photo.file_name),
            ));
        }
    }
    Ok(())
}

// ── PhotoUpload ─────────────────────────────────────────────────────

/// A photo to upload alongside a create or edit.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl std::fmt::Debug for PhotoUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PhotoUpload {
    /// Content type inferred from the file extension.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        Self {
            content_type: content_type_for(&file_name).to_owned(),
            file_name,
            bytes: bytes.into(),
        }
    }

    /// Extension for the stored object.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| {
                self.content_type
                    .strip_prefix("image/")
                    .unwrap_or("bin")
                    .to_owned()
            })
    }

    /// `{user}/{random}.{ext}`; the owner folder keeps storage policies simple.
    pub(crate) fn object_path(&self, owner: &UserId) -> String {
        format!("{owner}/{}.{}", uuid::Uuid::new_v4(), self.extension())
    }
}

/// Map a file name to an image content type.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

// ── Row payloads ────────────────────────────────────────────────────

/// Column values written on insert (`user_id` set) or update
/// (`updated_at` set).
#[derive(Debug, Serialize)]
pub(crate) struct ListingRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a UserId>,
    pub title: &'a str,
    pub description: &'a str,
    pub category: Option<Category>,
    pub condition: Condition,
    pub status: ListingStatus,
    pub location: &'a str,
    pub photos: &'a [String],
    pub tags: &'a [String],
    pub dimensions: Option<&'a Dimensions>,
    pub pickup_instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl<'a> ListingRow<'a> {
    pub(crate) fn new(draft: &'a ListingDraft, photos: &'a [String]) -> Self {
        Self {
            user_id: None,
            title: &draft.title,
            description: &draft.description,
            category: draft.category,
            condition: draft.condition,
            status: draft.status,
            location: &draft.location,
            photos,
            tags: &draft.tags,
            dimensions: draft.dimensions.as_ref(),
            pickup_instructions: draft.pickup_instructions.as_deref(),
            updated_at: None,
        }
    }
}
