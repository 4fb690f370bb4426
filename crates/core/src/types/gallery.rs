//! Gallery images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ImageId;

/// A stored gallery image.
///
/// `src` is a data URL or plain URL; the record never holds raw bytes.
/// Field names follow the legacy document (`uploadDate` in particular).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: ImageId,
    pub src: String,
    pub name: String,
    /// Source file size in bytes.
    pub size: u64,
    pub upload_date: DateTime<Utc>,
}

/// Input for adding a gallery image; the id and upload date are assigned
/// on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub src: String,
    pub name: String,
    pub size: u64,
}

/// The ordered image collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gallery(Vec<GalleryImage>);

impl Gallery {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, GalleryImage> {
        self.0.iter()
    }

    /// Append an image, assigning a fresh id and the current timestamp.
    /// Returns the id of the stored image.
    pub fn add(&mut self, image: NewImage) -> ImageId {
        let id = ImageId::generate();
        self.0.push(GalleryImage {
            id,
            src: image.src,
            name: image.name,
            size: image.size,
            upload_date: Utc::now(),
        });
        id
    }

    /// Remove the image with the given id, returning it if present.
    pub fn remove(&mut self, id: ImageId) -> Option<GalleryImage> {
        let position = self.0.iter().position(|image| image.id == id)?;
        Some(self.0.remove(position))
    }
}

impl From<Vec<GalleryImage>> for Gallery {
    fn from(images: Vec<GalleryImage>) -> Self {
        Self(images)
    }
}

impl<'a> IntoIterator for &'a Gallery {
    type Item = &'a GalleryImage;
    type IntoIter = std::slice::Iter<'a, GalleryImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
