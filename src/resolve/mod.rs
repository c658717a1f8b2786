//! URL resolution
//!
//! Each catalog item either carries a literal URL or names a strategy that
//! finds the URL with the run's browser session. Strategies are looked up by
//! name in a [`Resolvers`] registry, so new vendor logic is a new
//! [`Strategy`] rather than a new item type.
//!
//! ## Built-in strategies
//!
//! - **direct**: `url` is the download URL
//! - **page-link**: first `href` on `page` matching the regex `pattern`
//! - **redirect**: final URL after following redirects from `page`

pub mod session;
pub mod strategy;

pub use session::{HttpSession, HttpSessionProvider, Page, Session, SessionProvider};
pub use strategy::{Direct, PageLink, Redirect, Strategy};

use crate::catalog::UrlSource;
use crate::error::ResolveError;
use std::collections::HashMap;

/// Registry of named strategies.
pub struct Resolvers {
    strategies: HashMap<String, Box<dyn Strategy>>,
}

impl Default for Resolvers {
    fn default() -> Self {
        let mut resolvers = Self::empty();
        resolvers.register("direct", Direct);
        resolvers.register("page-link", PageLink);
        resolvers.register("redirect", Redirect);
        resolvers
    }
}

impl Resolvers {
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Add or replace a strategy.
    pub fn register(&mut self, name: &str, strategy: impl Strategy + 'static) {
        self.strategies.insert(name.to_string(), Box::new(strategy));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Produce the download URL for `source`.
    pub fn resolve(
        &self,
        source: &UrlSource,
        session: &mut dyn Session,
    ) -> Result<String, ResolveError> {
        let url = match source {
            UrlSource::Direct(url) => url.clone(),
            UrlSource::Lookup(lookup) => {
                let strategy = self
                    .strategies
                    .get(&lookup.strategy)
                    .ok_or_else(|| ResolveError::UnknownStrategy(lookup.strategy.clone()))?;
                strategy.resolve(session, &lookup.params)?
            }
        };
        validate_download_url(&url)?;
        Ok(url)
    }
}

fn validate_download_url(url: &str) -> Result<(), ResolveError> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(ResolveError::InvalidUrl(url.to_string()))
    }
}
