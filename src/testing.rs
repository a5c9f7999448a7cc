//! In-memory doubles for the remote service and captcha solvers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use reqwest::cookie::Jar;

use crate::cancel::CancelHandle;
use crate::challenge::{Challenge, ChallengeSolver, ChallengeTicket};
use crate::error::ChallengeError;
use crate::model::{ContentItem, ContentKind, Gallery};
use crate::remote::{DeleteResponse, Forum, RemoteError};
use crate::session::Session;

pub fn test_session(user: &str) -> Session {
    Session::new(user, Client::new(), Arc::new(Jar::default()))
}

#[derive(Debug, Clone, Copy)]
enum LoginScript {
    Accept,
    Reject,
    Unreachable,
}

/// One scripted answer of the listing endpoint.
#[derive(Debug, Clone)]
pub enum PageScript {
    Ids(Vec<&'static str>),
    Fail(u16),
    Expired,
}

/// One scripted answer of the delete endpoint.
#[derive(Debug, Clone, Copy)]
pub enum DeleteScript {
    Deleted,
    NotFound,
    Challenge,
    RateLimited,
    Expired,
    Rejected(u16),
    Garbled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub item_id: String,
    pub ticket: Option<String>,
}

/// A `Forum` whose every answer is scripted up front.
///
/// Pages are keyed by gallery (`None` for the unfiltered listing) and served
/// in order; once a gallery's script runs out it answers with an empty page.
/// Deletes default to success unless a script is queued for the item.
pub struct ScriptedForum {
    login: LoginScript,
    login_attempts: AtomicUsize,
    galleries: Result<Vec<Gallery>, u16>,
    pages: Mutex<HashMap<Option<String>, VecDeque<PageScript>>>,
    page_requests: Mutex<Vec<(Option<String>, u32)>>,
    deletes: Mutex<HashMap<String, VecDeque<DeleteScript>>>,
    delete_calls: Mutex<Vec<DeleteCall>>,
    delete_started: Mutex<Vec<Instant>>,
    cancel_on: Mutex<Option<(String, CancelHandle)>>,
    delete_latency: Duration,
}

impl ScriptedForum {
    pub fn new() -> Self {
        Self {
            login: LoginScript::Accept,
            login_attempts: AtomicUsize::new(0),
            galleries: Ok(Vec::new()),
            pages: Mutex::new(HashMap::new()),
            page_requests: Mutex::new(Vec::new()),
            deletes: Mutex::new(HashMap::new()),
            delete_calls: Mutex::new(Vec::new()),
            delete_started: Mutex::new(Vec::new()),
            cancel_on: Mutex::new(None),
            delete_latency: Duration::ZERO,
        }
    }

    pub fn reject_login(mut self) -> Self {
        self.login = LoginScript::Reject;
        self
    }

    pub fn unreachable_login(mut self) -> Self {
        self.login = LoginScript::Unreachable;
        self
    }

    pub fn with_galleries(mut self, ids: &[&str]) -> Self {
        self.galleries = Ok(ids
            .iter()
            .map(|id| Gallery {
                id: id.to_string(),
                name: format!("{id} gallery"),
            })
            .collect());
        self
    }

    pub fn failing_galleries(mut self, status: u16) -> Self {
        self.galleries = Err(status);
        self
    }

    pub fn with_pages(self, gallery: Option<&str>, pages: Vec<PageScript>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(gallery.map(str::to_string), pages.into());
        self
    }

    /// Convenience: a single unfiltered listing made of the given pages.
    pub fn with_listing(self, pages: &[&[&'static str]]) -> Self {
        let scripts = pages.iter().map(|ids| PageScript::Ids(ids.to_vec())).collect();
        self.with_pages(None, scripts)
    }

    pub fn with_delete(self, item_id: &str, answers: &[DeleteScript]) -> Self {
        self.deletes
            .lock()
            .unwrap()
            .insert(item_id.to_string(), answers.iter().copied().collect());
        self
    }

    pub fn with_delete_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    /// Requests cancellation when the delete of `item_id` starts.
    pub fn cancel_when_deleting(self, item_id: &str, handle: CancelHandle) -> Self {
        *self.cancel_on.lock().unwrap() = Some((item_id.to_string(), handle));
        self
    }

    pub fn login_attempts(&self) -> usize {
        self.login_attempts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        self.delete_calls.lock().unwrap().clone()
    }

    /// When each delete request started, in call order.
    pub fn delete_start_times(&self) -> Vec<Instant> {
        self.delete_started.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for call in self.delete_calls() {
            if !ids.contains(&call.item_id) {
                ids.push(call.item_id);
            }
        }
        ids
    }

    pub fn page_requests(&self) -> Vec<(Option<String>, u32)> {
        self.page_requests.lock().unwrap().clone()
    }
}

impl Forum for ScriptedForum {
    async fn open_session(
        &self,
        identity: &str,
        _secret: &str,
    ) -> Result<Option<Session>, RemoteError> {
        self.login_attempts.fetch_add(1, Ordering::SeqCst);
        match self.login {
            LoginScript::Accept => Ok(Some(test_session(&identity.to_lowercase()))),
            LoginScript::Reject => Ok(None),
            LoginScript::Unreachable => Err(RemoteError::Status {
                status: 503,
                message: "unavailable".into(),
            }),
        }
    }

    async fn list_galleries(
        &self,
        _session: &Session,
        _kind: ContentKind,
    ) -> Result<Vec<Gallery>, RemoteError> {
        match &self.galleries {
            Ok(list) => Ok(list.clone()),
            Err(401) => Err(RemoteError::AuthInvalid),
            Err(status) => Err(RemoteError::Status {
                status: *status,
                message: "scripted".into(),
            }),
        }
    }

    async fn list_content(
        &self,
        _session: &Session,
        _kind: ContentKind,
        gallery: Option<&str>,
        page: u32,
    ) -> Result<Vec<String>, RemoteError> {
        let key = gallery.map(str::to_string);
        self.page_requests.lock().unwrap().push((key.clone(), page));
        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match next {
            None => Ok(Vec::new()),
            Some(PageScript::Ids(ids)) => Ok(ids.into_iter().map(str::to_string).collect()),
            Some(PageScript::Fail(status)) => Err(RemoteError::Status {
                status,
                message: "scripted".into(),
            }),
            Some(PageScript::Expired) => Err(RemoteError::AuthInvalid),
        }
    }

    async fn delete(
        &self,
        _session: &Session,
        item: &ContentItem,
        ticket: Option<&ChallengeTicket>,
    ) -> Result<DeleteResponse, RemoteError> {
        self.delete_started.lock().unwrap().push(Instant::now());
        self.delete_calls.lock().unwrap().push(DeleteCall {
            item_id: item.id.clone(),
            ticket: ticket.map(|t| t.answer.clone()),
        });
        let cancel = self
            .cancel_on
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(id, _)| *id == item.id)
            .map(|(_, handle)| handle.clone());
        if let Some(handle) = cancel {
            handle.cancel();
        }
        if !self.delete_latency.is_zero() {
            tokio::time::sleep(self.delete_latency).await;
        }

        let answer = self
            .deletes
            .lock()
            .unwrap()
            .get_mut(&item.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(DeleteScript::Deleted);
        match answer {
            DeleteScript::Deleted => Ok(DeleteResponse::Deleted),
            DeleteScript::NotFound => Ok(DeleteResponse::NotFound),
            DeleteScript::Challenge => Ok(DeleteResponse::ChallengeRequired),
            DeleteScript::RateLimited => Err(RemoteError::RateLimited { retry_after_ms: 0 }),
            DeleteScript::Expired => Err(RemoteError::AuthInvalid),
            DeleteScript::Garbled => Err(RemoteError::Parse("unreadable delete reply".into())),
            DeleteScript::Rejected(status) => Ok(DeleteResponse::Rejected {
                status,
                message: "scripted".into(),
            }),
        }
    }

    fn challenge_for(&self, session: &Session, item: &ContentItem) -> Challenge {
        Challenge {
            site_key: "test-site-key".into(),
            page_url: format!("https://gallog.test/{}/{}", session.user_id(), item.kind),
        }
    }
}

/// A solver that replays scripted answers; the last one repeats forever.
#[derive(Clone)]
pub struct ScriptedSolver {
    answers: Arc<Mutex<VecDeque<Result<String, &'static str>>>>,
    calls: Arc<AtomicUsize>,
}

const TIMEOUT: &str = "<timeout>";

impl ScriptedSolver {
    fn scripted(answers: Vec<Result<String, &'static str>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn answering(token: &str) -> Self {
        Self::scripted(vec![Ok(token.to_string())])
    }

    pub fn timing_out() -> Self {
        Self::scripted(vec![Err(TIMEOUT)])
    }

    pub fn timing_out_then(token: &str) -> Self {
        Self::scripted(vec![Err(TIMEOUT), Ok(token.to_string())])
    }

    pub fn rejecting(message: &'static str) -> Self {
        Self::scripted(vec![Err(message)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChallengeSolver for ScriptedSolver {
    async fn solve(&self, _challenge: &Challenge) -> Result<String, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().cloned()
            }
        };
        match answer {
            Some(Ok(token)) => Ok(token),
            Some(Err(TIMEOUT)) => Err(ChallengeError::ChallengeTimeout),
            Some(Err(message)) => Err(ChallengeError::Rejected(message.to_string())),
            None => Err(ChallengeError::Rejected("no script".into())),
        }
    }
}
