//! Common test utilities for end-to-end pipeline tests.

#![allow(dead_code)]

mod fixtures;

pub use fixtures::*;

use driverclaw::error::ResolveError;
use driverclaw::resolve::{Page, Session, SessionProvider, Strategy};
use driverclaw::{CancelToken, Orchestrator, Resolvers, Settings};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `body` at `route` with the given content type.
pub async fn serve(server: &MockServer, route: &str, body: Vec<u8>, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .mount(server)
        .await;
}

/// Answer `route` with a bare status code.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Paths requested from the mock server, in order.
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

/// Every file below `root` with its contents, relative paths with `/`.
pub fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

/// Names of the direct children of `dir`, sorted.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Session that never navigates; counts how often a run opens one.
#[derive(Clone, Default)]
pub struct CountingSessions {
    opened: Arc<AtomicUsize>,
}

impl CountingSessions {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct NullSession;

impl Session for NullSession {
    fn navigate(&mut self, url: &str) -> Result<Page, ResolveError> {
        Err(ResolveError::Navigation {
            url: url.to_string(),
            reason: "navigation disabled in tests".into(),
        })
    }
}

impl SessionProvider for CountingSessions {
    fn open(&self) -> Result<Box<dyn Session>, ResolveError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(NullSession))
    }
}

/// Strategy `scripted`: returns its `url` param and records each call.
#[derive(Clone, Default)]
pub struct ScriptedStrategy {
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStrategy {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Strategy for ScriptedStrategy {
    fn resolve(
        &self,
        _session: &mut dyn Session,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError> {
        let url = params
            .get("url")
            .cloned()
            .ok_or_else(|| ResolveError::MissingParam {
                strategy: "scripted".into(),
                param: "url".into(),
            })?;
        self.calls.lock().unwrap().push(url.clone());
        Ok(url)
    }
}

/// Orchestrator with default settings and the HTTP session.
pub fn orchestrator(root: &Path) -> Orchestrator {
    Orchestrator::new(root, &Settings::default(), CancelToken::new())
}

/// Orchestrator wired to a scripted strategy and a counting session provider.
pub fn scripted_orchestrator(
    root: &Path,
    cancel: CancelToken,
) -> (Orchestrator, ScriptedStrategy, CountingSessions) {
    let strategy = ScriptedStrategy::default();
    let sessions = CountingSessions::default();
    let mut resolvers = Resolvers::default();
    resolvers.register("scripted", strategy.clone());

    let orchestrator = Orchestrator::new(root, &Settings::default(), cancel)
        .with_resolvers(resolvers)
        .with_session_provider(sessions.clone());
    (orchestrator, strategy, sessions)
}
