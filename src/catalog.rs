//! Gallery list for the picker. Always fetched fresh.

use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::model::{ContentKind, Gallery};
use crate::remote::{Forum, RemoteError};
use crate::session::Session;

pub struct GalleryCatalog<'a, F> {
    forum: &'a F,
}

impl<'a, F: Forum> GalleryCatalog<'a, F> {
    pub fn new(forum: &'a F) -> Self {
        Self { forum }
    }

    /// Galleries holding the user's content of `kind`, in the order the site lists them.
    pub async fn list_galleries(
        &self,
        session: &Session,
        kind: ContentKind,
    ) -> Result<Vec<Gallery>, CatalogError> {
        match self.forum.list_galleries(session, kind).await {
            Ok(galleries) => {
                debug!(%kind, count = galleries.len(), "galleries listed");
                Ok(galleries)
            }
            Err(RemoteError::AuthInvalid) => {
                session.invalidate();
                Err(CatalogError::SessionExpired)
            }
            Err(e) => {
                warn!(%kind, error = %e, "gallery list unavailable");
                Err(CatalogError::CatalogUnavailable(e.to_string()))
            }
        }
    }
}
