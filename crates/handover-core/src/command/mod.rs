// ── Command API ──
//
// All listing writes flow through a unified `Command` enum. The
// marketplace's processor task runs them one at a time, so multi-step
// writes (upload, then insert) never interleave.

pub mod requests;

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{Listing, ListingId};

pub use requests::{
    ListingDraft, MAX_DESCRIPTION_CHARS, MAX_PHOTO_BYTES, MAX_PHOTOS, MAX_TAGS, MAX_TITLE_CHARS,
    PhotoUpload, content_type_for, validate_photos,
};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub progress: Option<UploadProgress>,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against the listings table.
#[derive(Debug, Clone)]
pub enum Command {
    CreateListing {
        draft: ListingDraft,
        photos: Vec<PhotoUpload>,
    },
    UpdateListing {
        id: ListingId,
        draft: ListingDraft,
        /// Existing photo URLs to keep, in display order.
        keep_photos: Vec<String>,
        /// Uploaded and appended after `keep_photos`.
        new_photos: Vec<PhotoUpload>,
    },
    DeleteListing {
        id: ListingId,
    },
    ToggleFavorite {
        id: ListingId,
    },
}

impl Command {
    /// Number of photos this command uploads.
    pub fn upload_count(&self) -> usize {
        match self {
            Self::CreateListing { photos, .. } => photos.len(),
            Self::UpdateListing { new_photos, .. } => new_photos.len(),
            Self::DeleteListing { .. } | Self::ToggleFavorite { .. } => 0,
        }
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Created(Listing),
    Updated(Listing),
    Deleted {
        id: ListingId,
        /// Photo objects removed from storage after the row was deleted.
        photos_removed: usize,
    },
    /// Wishlist membership after the toggle.
    Favorite { id: ListingId, favorite: bool },
}

/// Upload progress callback, called with a percentage (0-100) that
/// never decreases.
#[derive(Clone)]
pub struct UploadProgress(Arc<dyn Fn(u8) + Send + Sync>);

impl UploadProgress {
    pub fn new(f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Report `done` of `total` uploads finished.
    pub(crate) fn report(&self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let pct = (done.min(total) * 100) / total;
        (self.0)(u8::try_from(pct).unwrap_or(100));
    }
}

impl std::fmt::Debug for UploadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UploadProgress(..)")
    }
}
