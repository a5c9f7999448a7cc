use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ORIGIN, REFERER, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::debug;

use super::error::RemoteError;
use super::types::{DeleteResponse, classify_delete};
use super::{Forum, html};
use crate::challenge::{Challenge, ChallengeTicket};
use crate::config::CleanerConfig;
use crate::model::{ContentItem, ContentKind, Gallery};
use crate::session::Session;

const CSRF_COOKIE: &str = "ci_c";
const XHR: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// HTTP client for the DCInside login server and gallog.
pub struct GallogClient {
    main_url: String,
    sign_url: String,
    gallog_url: String,
    user_agent: String,
    timeout: Duration,
    site_key: String,
}

impl GallogClient {
    pub fn new(config: &CleanerConfig) -> Self {
        Self {
            main_url: config.main_url.trim_end_matches('/').to_string(),
            sign_url: config.sign_url.trim_end_matches('/').to_string(),
            gallog_url: config.gallog_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            site_key: config.captcha.site_key.clone(),
        }
    }

    fn build_http(&self, jar: Arc<Jar>) -> Result<Client, RemoteError> {
        Ok(Client::builder()
            .cookie_provider(jar)
            .user_agent(&self.user_agent)
            .connect_timeout(Duration::from_secs(10))
            .timeout(self.timeout)
            .build()?)
    }

    fn home(&self) -> String {
        format!("{}/", self.main_url)
    }

    fn gallog_page(&self, user_id: &str, kind: ContentKind) -> String {
        format!("{}/{}/{}", self.gallog_url, user_id, kind.as_path())
    }

    async fn fetch_home(&self, http: &Client) -> Result<String, RemoteError> {
        let response = http
            .get(self.home())
            .header(REFERER, self.home())
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }

    /// CSRF token for the delete form: the `ci_c` cookie set by the gallog page.
    fn csrf_token(&self, page: &Response, jar: &Jar, page_url: &str) -> Option<String> {
        if let Some(cookie) = page.cookies().find(|c| c.name() == CSRF_COOKIE) {
            return Some(cookie.value().to_string());
        }
        let url = Url::parse(page_url).ok()?;
        let header = jar.cookies(&url)?;
        header.to_str().ok()?.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == CSRF_COOKIE).then(|| value.to_string())
        })
    }
}

/// Maps HTTP-level failures onto [`RemoteError`], passing successes through.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(1000);
        return Err(RemoteError::RateLimited { retry_after_ms });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::AuthInvalid);
    }
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

impl Forum for GallogClient {
    async fn open_session(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<Option<Session>, RemoteError> {
        let jar = Arc::new(Jar::default());
        let http = self.build_http(jar.clone())?;
        let user_id = identity.to_lowercase();

        let landing = self.fetch_home(&http).await?;
        let mut form = html::login_form_inputs(&landing)?;
        form.retain(|(name, _)| name != "user_id" && name != "pw");
        form.push(("user_id".to_string(), user_id.clone()));
        form.push(("pw".to_string(), secret.to_string()));

        let response = http
            .post(format!("{}/login/member_check", self.sign_url))
            .header(XHR.0, XHR.1)
            .header(REFERER, self.home())
            .form(&form)
            .send()
            .await?;
        check_status(response).await?;

        let after = self.fetch_home(&http).await?;
        if !html::is_logged_in(&after)? {
            return Ok(None);
        }
        Ok(Some(Session::new(user_id, http, jar)))
    }

    async fn list_galleries(
        &self,
        session: &Session,
        kind: ContentKind,
    ) -> Result<Vec<Gallery>, RemoteError> {
        let url = self.gallog_page(session.user_id(), kind);
        let response = session.http().get(&url).send().await?;
        let body = check_status(response).await?.text().await?;
        html::galleries(&body)
    }

    async fn list_content(
        &self,
        session: &Session,
        kind: ContentKind,
        gallery: Option<&str>,
        page: u32,
    ) -> Result<Vec<String>, RemoteError> {
        let url = format!("{}/index", self.gallog_page(session.user_id(), kind));
        let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
        if let Some(cno) = gallery {
            query.push(("cno", cno.to_string()));
        }
        query.push(("p", page.to_string()));

        debug!(%kind, gallery = gallery.unwrap_or("*"), page, "fetching listing page");
        let response = session.http().get(&url).query(&query).send().await?;
        let body = check_status(response).await?.text().await?;
        html::content_ids(&body)
    }

    async fn delete(
        &self,
        session: &Session,
        item: &ContentItem,
        ticket: Option<&ChallengeTicket>,
    ) -> Result<DeleteResponse, RemoteError> {
        let page_url = self.gallog_page(session.user_id(), item.locator.kind);
        let page = session.http().get(&page_url).send().await?;
        let page = check_status(page).await?;
        let token = self
            .csrf_token(&page, session.jar(), &page_url)
            .unwrap_or_default();

        let mut form = vec![
            ("ci_t", token),
            ("no", item.locator.no.clone()),
            ("service_code", "undefined".to_string()),
        ];
        if let Some(ticket) = ticket {
            form.push(("g-recaptcha-response", ticket.answer.clone()));
        }

        let response = session
            .http()
            .post(format!(
                "{}/{}/ajax/log_list_ajax/delete",
                self.gallog_url,
                session.user_id()
            ))
            .header(ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header(ORIGIN, self.gallog_url.as_str())
            .header(REFERER, page_url.as_str())
            .header(XHR.0, XHR.1)
            .form(&form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await?;
        classify_delete(status, retry_after, &body)
    }

    fn challenge_for(&self, session: &Session, item: &ContentItem) -> Challenge {
        Challenge {
            site_key: self.site_key.clone(),
            page_url: self.gallog_page(session.user_id(), item.locator.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GallogClient {
        let config = CleanerConfig {
            main_url: server.uri(),
            sign_url: server.uri(),
            gallog_url: server.uri(),
            ..CleanerConfig::default()
        };
        GallogClient::new(&config)
    }

    fn session_for(client: &GallogClient, user: &str) -> Session {
        let jar = Arc::new(Jar::default());
        let http = client.build_http(jar.clone()).unwrap();
        Session::new(user, http, jar)
    }

    const LOGIN_PAGE: &str = r#"<form id="login_process">
        <input type="hidden" name="s_url" value="/">
        <input type="hidden" name="ssl" value="Y">
    </form>"#;

    #[tokio::test]
    async fn login_handshake_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/member_check"))
            .and(body_string_contains("user_id=alice"))
            .and(body_string_contains("ssl=Y"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "PHPSESSID=abc; Path=/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a class="logout">x</a>"#))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = client.open_session("Alice", "pw").await.unwrap().unwrap();
        assert_eq!(session.user_id(), "alice");
    }

    #[tokio::test]
    async fn login_without_logout_marker_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/member_check"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.open_session("alice", "wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_galleries_for_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/comment"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="option_sort gallog"><div><ul>
                    <li data-value="">전체</li>
                    <li data-value="stock">주식</li>
                </ul></div></div>"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = session_for(&client, "alice");
        let galleries = client
            .list_galleries(&session, ContentKind::Comment)
            .await
            .unwrap();
        assert_eq!(
            galleries,
            vec![Gallery {
                id: "stock".into(),
                name: "주식".into()
            }]
        );
    }

    #[tokio::test]
    async fn listing_passes_gallery_and_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/posting/index"))
            .and(query_param("cno", "stock"))
            .and(query_param("p", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ul class="cont_listbox"><li data-no="10"></li><li data-no="9"></li></ul>"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = session_for(&client, "alice");
        let ids = client
            .list_content(&session, ContentKind::Posting, Some("stock"), 2)
            .await
            .unwrap();
        assert_eq!(ids, vec!["10", "9"]);
    }

    #[tokio::test]
    async fn listing_rate_limit_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/posting/index"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = session_for(&client, "alice");
        let err = client
            .list_content(&session, ContentKind::Posting, None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::RateLimited { retry_after_ms: 3000 }));
    }

    #[tokio::test]
    async fn delete_replays_csrf_cookie_and_ticket() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/posting"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "ci_c=csrf123; Path=/"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/ajax/log_list_ajax/delete"))
            .and(body_string_contains("ci_t=csrf123"))
            .and(body_string_contains("no=55"))
            .and(body_string_contains("g-recaptcha-response=solved"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"result":"success"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = session_for(&client, "alice");
        let item = ContentItem::new("55", None, ContentKind::Posting);
        let ticket = ChallengeTicket {
            challenge: client.challenge_for(&session, &item),
            answer: "solved".into(),
        };
        let response = client.delete(&session, &item, Some(&ticket)).await.unwrap();
        assert_eq!(response, DeleteResponse::Deleted);
    }

    #[tokio::test]
    async fn delete_detects_captcha_demand() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/comment"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/ajax/log_list_ajax/delete"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"result":"fail","cause":"captcha"}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = session_for(&client, "alice");
        let item = ContentItem::new("7", Some("stock".into()), ContentKind::Comment);
        let response = client.delete(&session, &item, None).await.unwrap();
        assert_eq!(response, DeleteResponse::ChallengeRequired);
    }

    #[test]
    fn challenge_points_at_gallog_page() {
        let config = CleanerConfig::default();
        let client = GallogClient::new(&config);
        let jar = Arc::new(Jar::default());
        let session = Session::new("alice", Client::new(), jar);
        let item = ContentItem::new("1", None, ContentKind::Comment);
        let challenge = client.challenge_for(&session, &item);
        assert_eq!(challenge.page_url, "https://gallog.dcinside.com/alice/comment");
        assert_eq!(challenge.site_key, config.captcha.site_key);
    }
}
