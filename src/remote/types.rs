//! Wire-level response shapes and their classification.

use serde::Deserialize;

use super::error::RemoteError;

/// Reply of the delete endpoint once HTTP-level failures are filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResponse {
    Deleted,
    /// The post is already gone.
    NotFound,
    /// The server wants a reCAPTCHA token before it deletes anything.
    ChallengeRequired,
    /// Any other refusal.
    Rejected { status: u16, message: String },
}

/// JSON body returned by `ajax/log_list_ajax/delete`.
#[derive(Debug, Deserialize)]
struct DeleteBody {
    #[serde(default)]
    result: String,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

const NOT_FOUND_MARKERS: &[&str] = &["not_found", "notfound", "already", "없는", "삭제된"];
const MAX_MESSAGE_CHARS: usize = 200;

/// Classifies a delete reply from its status code, `Retry-After` seconds and body.
pub fn classify_delete(
    status: u16,
    retry_after_secs: Option<u64>,
    body: &str,
) -> Result<DeleteResponse, RemoteError> {
    match status {
        429 => {
            return Err(RemoteError::RateLimited {
                retry_after_ms: retry_after_secs.map(|s| s * 1000).unwrap_or(1000),
            });
        }
        401 | 403 => return Err(RemoteError::AuthInvalid),
        404 => return Ok(DeleteResponse::NotFound),
        s if s >= 500 => {
            return Err(RemoteError::Status {
                status: s,
                message: truncate(body),
            });
        }
        _ => {}
    }

    let (haystack, structured) = match serde_json::from_str::<DeleteBody>(body) {
        Ok(parsed) => {
            if parsed.result.eq_ignore_ascii_case("success") {
                return Ok(DeleteResponse::Deleted);
            }
            let text = format!(
                "{} {} {}",
                parsed.result,
                parsed.cause.unwrap_or_default(),
                parsed.msg.unwrap_or_default()
            );
            (text.to_lowercase(), true)
        }
        Err(_) => {
            if body.trim().eq_ignore_ascii_case("success") {
                return Ok(DeleteResponse::Deleted);
            }
            (body.to_lowercase(), false)
        }
    };
    // Raw HTML only counts as logged out when it redirects to the login page.
    let logged_out = if structured {
        haystack.contains("login")
    } else {
        is_login_redirect(&haystack)
    };

    if haystack.contains("captcha") {
        Ok(DeleteResponse::ChallengeRequired)
    } else if logged_out {
        Err(RemoteError::AuthInvalid)
    } else if NOT_FOUND_MARKERS.iter().any(|m| haystack.contains(m)) {
        Ok(DeleteResponse::NotFound)
    } else {
        Ok(DeleteResponse::Rejected {
            status,
            message: truncate(body),
        })
    }
}

fn is_login_redirect(lower: &str) -> bool {
    ["location.href", "location.replace", "http-equiv=\"refresh\""]
        .iter()
        .any(|redirect| lower.contains(redirect))
        && lower.contains("/login")
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_MESSAGE_CHARS {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(MAX_MESSAGE_CHARS).collect();
        out.push('…');
        out
    }
}
