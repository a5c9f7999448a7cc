//! Domain types shared by every stage of a cleanup run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which half of a gallog a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Posting,
    Comment,
}

impl ContentKind {
    /// Path segment the gallog uses for this kind.
    pub fn as_path(&self) -> &'static str {
        match self {
            ContentKind::Posting => "posting",
            ContentKind::Comment => "comment",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "posting" => Ok(ContentKind::Posting),
            "comment" => Ok(ContentKind::Comment),
            other => Err(format!("unknown post type: {other}")),
        }
    }
}

/// A gallery (board) the user has content in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gallery {
    pub id: String,
    pub name: String,
}

/// Scope of an enumeration: a single gallery or every gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryFilter {
    All,
    Only(String),
}

impl GalleryFilter {
    /// `None` and blank ids both mean "all galleries".
    pub fn from_option(gallery_id: Option<&str>) -> Self {
        match gallery_id.map(str::trim) {
            Some(id) if !id.is_empty() => GalleryFilter::Only(id.to_string()),
            _ => GalleryFilter::All,
        }
    }
}

/// What the delete endpoint needs to address one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub no: String,
    pub kind: ContentKind,
}

/// One post or comment owned by the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    /// `None` when the item came from the unfiltered listing.
    pub gallery_id: Option<String>,
    pub kind: ContentKind,
    pub locator: Locator,
}

impl ContentItem {
    pub fn new(no: impl Into<String>, gallery_id: Option<String>, kind: ContentKind) -> Self {
        let no = no.into();
        Self {
            id: no.clone(),
            gallery_id,
            kind,
            locator: Locator { no, kind },
        }
    }
}
