use serde::{Deserialize, Serialize};
use std::fmt;

/// Folder an image belongs to under the image root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Tours,
    Users,
}

impl ImageCategory {
    pub fn dir_name(self) -> &'static str {
        match self {
            ImageCategory::Tours => "tours",
            ImageCategory::Users => "users",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One file taken out of a multipart request, still in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Multipart field name (`imageCover` or `images`)
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image"))
    }

    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Filenames produced by a successful ingestion, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_cover: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl IngestedImages {
    pub fn is_empty(&self) -> bool {
        self.image_cover.is_none() && self.images.is_empty()
    }

    pub fn all_files(&self) -> impl Iterator<Item = &str> {
        self.image_cover
            .as_deref()
            .into_iter()
            .chain(self.images.iter().map(String::as_str))
    }
}

/// Result of removing a superseded image. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Missing,
    Rejected(String),
    Failed(String),
}
