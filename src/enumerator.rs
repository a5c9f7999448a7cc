//! Discovery of the user's own content.
//!
//! [`Enumeration`] walks the paginated activity log lazily, one gallery at a
//! time, and yields each post number the first time it is seen. A failing
//! gallery is reported and skipped; a rejected session ends the walk.
//! [`Enumeration::drain`] collects the whole walk, ordered by the page on
//! which each number was last listed.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::error::EnumerationError;
use crate::model::{ContentItem, ContentKind, GalleryFilter};
use crate::remote::{Forum, RemoteError};
use crate::session::Session;

pub struct ContentEnumerator<'a, F> {
    forum: &'a F,
    max_pages: u32,
}

impl<'a, F: Forum> ContentEnumerator<'a, F> {
    pub fn new(forum: &'a F, max_pages: u32) -> Self {
        Self {
            forum,
            max_pages: max_pages.max(1),
        }
    }

    /// Starts a fresh walk. Nothing is fetched until the first item is pulled.
    pub fn enumerate(
        &self,
        session: &'a Session,
        kind: ContentKind,
        filter: GalleryFilter,
    ) -> Enumeration<'a, F> {
        Enumeration {
            forum: self.forum,
            session,
            kind,
            max_pages: self.max_pages,
            filter: Some(filter),
            targets: VecDeque::new(),
            current: None,
            page: 1,
            buffer: VecDeque::new(),
            last_seen: HashMap::new(),
            tick: 0,
            done: false,
        }
    }
}

/// A lazy, finite walk over the activity log.
pub struct Enumeration<'a, F> {
    forum: &'a F,
    session: &'a Session,
    kind: ContentKind,
    max_pages: u32,
    /// Pending until the galleries to walk have been decided.
    filter: Option<GalleryFilter>,
    targets: VecDeque<Option<String>>,
    /// Gallery being walked; the inner `None` is the unfiltered listing.
    current: Option<Option<String>>,
    page: u32,
    buffer: VecDeque<ContentItem>,
    /// Position of the latest sighting of each number.
    last_seen: HashMap<String, u64>,
    tick: u64,
    done: bool,
}

impl<'a, F: Forum> Enumeration<'a, F> {
    /// Next discovered item, a gallery failure, or `None` once exhausted.
    pub async fn next(&mut self) -> Option<Result<ContentItem, EnumerationError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            if let Some(filter) = self.filter.take() {
                if let Err(e) = self.plan(filter).await {
                    self.done = true;
                    return Some(Err(e));
                }
                continue;
            }

            let gallery = match &self.current {
                Some(gallery) => gallery.clone(),
                None => match self.targets.pop_front() {
                    Some(next) => {
                        self.current = Some(next.clone());
                        self.page = 1;
                        next
                    }
                    None => {
                        self.done = true;
                        return None;
                    }
                },
            };

            if self.page > self.max_pages {
                warn!(gallery = label(&gallery), max_pages = self.max_pages, "page limit reached");
                self.current = None;
                continue;
            }

            let listed = self
                .forum
                .list_content(self.session, self.kind, gallery.as_deref(), self.page)
                .await;
            match listed {
                Ok(ids) => self.absorb(gallery, ids),
                Err(RemoteError::AuthInvalid) => {
                    self.session.invalidate();
                    self.done = true;
                    return Some(Err(EnumerationError::SessionExpired));
                }
                Err(e) => {
                    warn!(gallery = label(&gallery), page = self.page, error = %e, "gallery listing failed");
                    self.current = None;
                    return Some(Err(EnumerationError::Gallery {
                        gallery: label(&gallery).to_string(),
                        message: e.to_string(),
                    }));
                }
            }
        }
    }

    /// Pulls the walk to the end, checking for cancellation between items.
    ///
    /// Numbers listed on more than one page keep the position of their last
    /// listing.
    pub async fn drain(mut self, cancel: &CancelHandle) -> Drained {
        let mut drained = Drained::default();
        loop {
            if cancel.is_cancelled() {
                drained.cancelled = true;
                break;
            }
            match self.next().await {
                None => break,
                Some(Ok(item)) => drained.items.push(item),
                Some(Err(e)) if e.is_fatal() => {
                    drained.fatal = Some(e);
                    break;
                }
                Some(Err(e)) => drained.gallery_failures.push(e),
            }
        }
        let last_seen = &self.last_seen;
        drained
            .items
            .sort_by_key(|item| last_seen.get(&item.id).copied().unwrap_or(u64::MAX));
        drained
    }

    async fn plan(&mut self, filter: GalleryFilter) -> Result<(), EnumerationError> {
        match filter {
            GalleryFilter::Only(id) => self.targets.push_back(Some(id)),
            GalleryFilter::All => match self.forum.list_galleries(self.session, self.kind).await {
                Ok(galleries) if galleries.is_empty() => {
                    debug!("no gallery picker, walking the unfiltered listing");
                    self.targets.push_back(None);
                }
                Ok(galleries) => {
                    info!(count = galleries.len(), "enumerating galleries");
                    self.targets.extend(galleries.into_iter().map(|g| Some(g.id)));
                }
                Err(RemoteError::AuthInvalid) => {
                    self.session.invalidate();
                    return Err(EnumerationError::SessionExpired);
                }
                Err(e) => {
                    return Err(EnumerationError::EnumerationFailed(format!(
                        "gallery list unavailable: {e}"
                    )));
                }
            },
        }
        Ok(())
    }

    fn absorb(&mut self, gallery: Option<String>, ids: Vec<String>) {
        if ids.is_empty() {
            self.current = None;
            return;
        }
        let before = self.buffer.len();
        for id in ids {
            let first_sight = self.last_seen.insert(id.clone(), self.tick).is_none();
            self.tick += 1;
            if first_sight {
                self.buffer
                    .push_back(ContentItem::new(id, gallery.clone(), self.kind));
            }
        }
        if self.buffer.len() == before {
            // Every id on the page was already seen: the listing is repeating itself.
            debug!(gallery = label(&gallery), page = self.page, "page repeats earlier items");
            self.current = None;
        } else {
            self.page += 1;
        }
    }
}

fn label(gallery: &Option<String>) -> &str {
    gallery.as_deref().unwrap_or("*")
}

/// Everything an enumeration produced.
#[derive(Debug, Default)]
pub struct Drained {
    pub items: Vec<ContentItem>,
    /// Non-fatal per-gallery failures.
    pub gallery_failures: Vec<EnumerationError>,
    /// Set when the walk ended on a fatal error.
    pub fatal: Option<EnumerationError>,
    pub cancelled: bool,
}
