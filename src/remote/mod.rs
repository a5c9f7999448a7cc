//! Access to the gallog over HTTP.
//!
//! [`Forum`] is the seam the engine talks through; [`GallogClient`] is the
//! real implementation on top of `reqwest` and `scraper`.

pub mod client;
pub mod error;
pub mod html;
pub mod types;

pub use client::GallogClient;
pub use error::RemoteError;
pub use types::{DeleteResponse, classify_delete};

use crate::challenge::{Challenge, ChallengeTicket};
use crate::model::{ContentItem, ContentKind, Gallery};
use crate::session::Session;

/// Operations the cleanup engine needs from the remote service.
#[allow(async_fn_in_trait)]
pub trait Forum {
    /// Runs the login handshake. `Ok(None)` means the server refused the credentials.
    async fn open_session(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<Option<Session>, RemoteError>;

    async fn list_galleries(
        &self,
        session: &Session,
        kind: ContentKind,
    ) -> Result<Vec<Gallery>, RemoteError>;

    /// Post numbers on one page of the activity log. Pages start at 1.
    async fn list_content(
        &self,
        session: &Session,
        kind: ContentKind,
        gallery: Option<&str>,
        page: u32,
    ) -> Result<Vec<String>, RemoteError>;

    async fn delete(
        &self,
        session: &Session,
        item: &ContentItem,
        ticket: Option<&ChallengeTicket>,
    ) -> Result<DeleteResponse, RemoteError>;

    /// The challenge a delete of `item` has to answer.
    fn challenge_for(&self, session: &Session, item: &ContentItem) -> Challenge;
}
