//! Built-in resolution strategies.

use super::session::Session;
use crate::error::ResolveError;
use regex::Regex;
use std::collections::BTreeMap;
use url::Url;

/// Turns lookup parameters into a download URL using the run's session.
pub trait Strategy: Send + Sync {
    fn resolve(
        &self,
        session: &mut dyn Session,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError>;
}

fn required<'a>(
    strategy: &str,
    params: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, ResolveError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ResolveError::MissingParam {
            strategy: strategy.to_string(),
            param: name.to_string(),
        })
}

/// `url`: returned unchanged, no navigation.
pub struct Direct;

impl Strategy for Direct {
    fn resolve(
        &self,
        _session: &mut dyn Session,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError> {
        required("direct", params, "url").map(str::to_string)
    }
}

/// `page` + `pattern`: open the page and return the first link whose target
/// matches the regex, made absolute against the page URL.
///
/// Candidate targets are `href` and `data-href` attribute values.
pub struct PageLink;

impl Strategy for PageLink {
    fn resolve(
        &self,
        session: &mut dyn Session,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError> {
        let page_url = required("page-link", params, "page")?;
        let pattern = required("page-link", params, "pattern")?;
        let matcher = Regex::new(pattern).map_err(|e| ResolveError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let page = session.navigate(page_url)?;
        let target = link_targets(&page.body)
            .into_iter()
            .find(|href| matcher.is_match(href))
            .ok_or_else(|| ResolveError::NoMatch {
                page: page.url.clone(),
                pattern: pattern.to_string(),
            })?;

        absolutize(&page.url, &target)
    }
}

/// `page`: open the page and return where it ended up after redirects.
/// Suits "latest download" links that bounce to a mirror.
pub struct Redirect;

impl Strategy for Redirect {
    fn resolve(
        &self,
        session: &mut dyn Session,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError> {
        let page_url = required("redirect", params, "page")?;
        session.final_url(page_url)
    }
}

/// Attribute values of `href=` and `data-href=` in document order.
fn link_targets(body: &str) -> Vec<String> {
    static ATTR: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let attr = ATTR.get_or_init(|| {
        Regex::new(r#"(?i)(?:data-)?href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    });
    attr.captures_iter(body)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .collect()
}

fn absolutize(base: &str, target: &str) -> Result<String, ResolveError> {
    let base = Url::parse(base).map_err(|_| ResolveError::InvalidUrl(base.to_string()))?;
    base.join(target)
        .map(|u| u.to_string())
        .map_err(|_| ResolveError::InvalidUrl(target.to_string()))
}
