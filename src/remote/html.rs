//! Scrapes the gallog HTML pages with `scraper`.

use scraper::{Html, Selector};

use super::error::RemoteError;
use crate::model::Gallery;

const LOGIN_FORM_INPUTS: &str = "#login_process > input";
const LOGOUT_MARKER: &str = ".logout";
const GALLERY_OPTIONS: &str = "div.option_sort.gallog > div > ul > li";
const CONTENT_ROWS: &str = ".cont_listbox > li";

fn selector(css: &str) -> Result<Selector, RemoteError> {
    Selector::parse(css).map_err(|e| RemoteError::Parse(format!("selector {css}: {e}")))
}

/// Name/value pairs of the hidden inputs the login form posts along.
pub fn login_form_inputs(html: &str) -> Result<Vec<(String, String)>, RemoteError> {
    let document = Html::parse_document(html);
    let sel = selector(LOGIN_FORM_INPUTS)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| {
            let name = el.value().attr("name")?;
            let value = el.value().attr("value")?;
            Some((name.to_string(), value.to_string()))
        })
        .collect())
}

/// A logged-in main page carries a logout control.
pub fn is_logged_in(html: &str) -> Result<bool, RemoteError> {
    let document = Html::parse_document(html);
    let sel = selector(LOGOUT_MARKER)?;
    Ok(document.select(&sel).next().is_some())
}

pub fn galleries(html: &str) -> Result<Vec<Gallery>, RemoteError> {
    let document = Html::parse_document(html);
    let sel = selector(GALLERY_OPTIONS)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| {
            let id = el.value().attr("data-value")?.trim();
            if id.is_empty() {
                return None;
            }
            let name = el.text().collect::<String>();
            Some(Gallery {
                id: id.to_string(),
                name: name.trim().to_string(),
            })
        })
        .collect())
}

/// Post numbers listed on one page of the user's activity log, in page order.
pub fn content_ids(html: &str) -> Result<Vec<String>, RemoteError> {
    let document = Html::parse_document(html);
    let sel = selector(CONTENT_ROWS)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| el.value().attr("data-no"))
        .map(|no| no.trim().to_string())
        .filter(|no| !no.is_empty())
        .collect())
}
