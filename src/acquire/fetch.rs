//! Streaming downloads
//!
//! The response body is copied chunk by chunk into a hidden temp file inside
//! the staging directory, so the payload is never held in memory and a
//! later move into place is a same-filesystem rename. The temp file deletes
//! itself unless the organizer persists it.

use super::filename::{filename_from_disposition, filename_from_url};
use crate::config::Settings;
use crate::core::CancelToken;
use crate::core::progress::{self, ProgressGuard};
use crate::error::ItemError;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempPath;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// Name prefix of in-progress downloads.
pub const PART_PREFIX: &str = ".part-";

/// A finished download waiting to be organized.
#[derive(Debug)]
pub struct DownloadResult {
    /// Closed temp file; removed on drop unless persisted.
    pub file: TempPath,
    /// Declared length, 0 when the server did not say.
    pub content_length: u64,
    /// URL after redirects.
    pub final_url: String,
    /// Name from `Content-Disposition`, if the server sent one.
    pub suggested_name: Option<String>,
}

impl DownloadResult {
    /// Name the payload should be stored under before any rename.
    pub fn filename(&self) -> String {
        self.suggested_name
            .clone()
            .unwrap_or_else(|| filename_from_url(&self.final_url))
    }
}

/// Blocking HTTP fetcher shared by every item of a run.
pub struct Fetcher {
    agent: ureq::Agent,
    user_agent: String,
    referer_exempt_hosts: Vec<String>,
    cancel: CancelToken,
}

impl Fetcher {
    pub fn new(settings: &Settings, cancel: CancelToken) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(settings.http_timeout)
            .timeout_read(settings.http_timeout)
            .build();
        Self {
            agent,
            user_agent: settings.user_agent.clone(),
            referer_exempt_hosts: settings.referer_exempt_hosts.clone(),
            cancel,
        }
    }

    /// Headers sent with a download of `url`.
    ///
    /// Some vendor CDNs answer 403 when they see a foreign referer, so exempt
    /// hosts get a bare request.
    pub fn request_headers(&self, url: &str) -> Vec<(&'static str, String)> {
        let Ok(parsed) = Url::parse(url) else {
            return Vec::new();
        };
        let Some(host) = parsed.host_str() else {
            return Vec::new();
        };
        let host_lower = host.to_ascii_lowercase();
        if self
            .referer_exempt_hosts
            .iter()
            .any(|exempt| host_lower.contains(&exempt.to_ascii_lowercase()))
        {
            return Vec::new();
        }

        let origin = match parsed.port() {
            Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
            None => format!("{}://{}/", parsed.scheme(), host),
        };
        vec![("User-Agent", self.user_agent.clone()), ("Referer", origin)]
    }

    /// Download `url` into a temp file under `staging`.
    pub fn fetch(&self, url: &str, staging: &Path) -> Result<DownloadResult, ItemError> {
        if self.cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        let headers = self.request_headers(url);
        tracing::debug!(%url, headers = ?headers, "requesting");

        let mut request = self.agent.get(url);
        for (name, value) in &headers {
            request = request.set(name, value);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(ItemError::transport(url, format!("HTTP {}", code)));
            }
            Err(e) => return Err(ItemError::transport(url, e)),
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(ItemError::transport(url, format!("HTTP {}", status)));
        }

        let content_type = response.header("content-type").unwrap_or("").to_string();
        if content_type.to_ascii_lowercase().contains("html") {
            return Err(ItemError::UnexpectedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let content_length = response
            .header("content-length")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let final_url = response.get_url().to_string();
        let suggested_name = response
            .header("content-disposition")
            .and_then(filename_from_disposition);
        tracing::debug!(%final_url, content_length, ?suggested_name, "response accepted");

        let label = suggested_name
            .clone()
            .unwrap_or_else(|| filename_from_url(&final_url));
        let file = self.stream_to_temp(
            url,
            response.into_reader(),
            staging,
            &label,
            content_length,
        )?;

        Ok(DownloadResult {
            file,
            content_length,
            final_url,
            suggested_name,
        })
    }

    /// Copy `reader` chunk by chunk into a new temp file under `staging`.
    ///
    /// The cancel token is checked before every chunk; on any error the temp
    /// file is dropped and removed.
    fn stream_to_temp(
        &self,
        url: &str,
        mut reader: impl Read,
        staging: &Path,
        label: &str,
        content_length: u64,
    ) -> Result<TempPath, ItemError> {
        let mut temp = tempfile::Builder::new()
            .prefix(PART_PREFIX)
            .tempfile_in(staging)?;

        let pb = progress::create_download_progress(label, content_length);
        let _guard = ProgressGuard::new(&pb);

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total_bytes = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(%url, total_bytes, "download cancelled");
                return Err(ItemError::Cancelled);
            }

            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| ItemError::transport(url, format!("read error: {}", e)))?;
            if bytes_read == 0 {
                break;
            }

            temp.write_all(&buffer[..bytes_read])?;
            total_bytes += bytes_read as u64;
            pb.set_position(total_bytes);
        }

        temp.flush()?;
        tracing::debug!(%url, total_bytes, "download complete");
        Ok(temp.into_temp_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(&Settings::default(), CancelToken::new())
    }

    fn staged_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_headers_carry_referer_of_own_host() {
        let headers = fetcher().request_headers("https://drivers.amd.com:8443/a/b.exe");
        assert!(headers.contains(&("Referer", "https://drivers.amd.com:8443/".to_string())));
        assert!(headers.iter().any(|(name, _)| *name == "User-Agent"));
    }

    #[test]
    fn test_exempt_host_gets_bare_request() {
        assert!(
            fetcher()
                .request_headers("https://downloads.sourceforge.net/project/x.zip")
                .is_empty()
        );
        assert!(
            fetcher()
                .request_headers("https://www.Geeks3D.com/dl/furmark.zip")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_fetch_streams_body_to_temp_file() {
        let mock_server = MockServer::start().await;
        let body = vec![7u8; 200_000];

        Mock::given(method("GET"))
            .and(path("/files/setup.exe"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.clone(), "application/octet-stream")
                    .insert_header("Content-Disposition", "attachment; filename=\"Setup 1.0.exe\""),
            )
            .mount(&mock_server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let url = format!("{}/files/setup.exe", mock_server.uri());
        let result = fetcher().fetch(&url, staging.path()).unwrap();

        assert_eq!(result.content_length, 200_000);
        assert_eq!(result.final_url, url);
        assert_eq!(result.filename(), "Setup 1.0.exe");
        assert_eq!(std::fs::read(&result.file).unwrap(), body);
        assert!(result.file.starts_with(staging.path()));

        let temp = result.file.to_path_buf();
        drop(result);
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_fetch_records_final_url_after_redirect() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/mirror/tool-2.0.zip", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror/tool-2.0.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"PK".to_vec(), "application/zip"))
            .mount(&mock_server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let result = fetcher()
            .fetch(&format!("{}/latest", mock_server.uri()), staging.path())
            .unwrap();

        assert_eq!(result.filename(), "tool-2.0.zip");
        assert!(result.final_url.ends_with("/mirror/tool-2.0.zip"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_html_even_with_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"<html>login</html>".to_vec(), "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let err = fetcher()
            .fetch(&format!("{}/driver.exe", mock_server.uri()), staging.path())
            .unwrap_err();

        assert!(matches!(err, ItemError::UnexpectedContent { .. }));
        assert!(staged_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let err = fetcher()
            .fetch(&format!("{}/gone.zip", mock_server.uri()), staging.path())
            .unwrap_err();

        assert!(matches!(err, ItemError::Transport(_)));
        assert!(err.to_string().contains("404"));
        assert!(staged_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_sends_referer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"x".to_vec(), "application/zip"))
            .mount(&mock_server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        fetcher()
            .fetch(&format!("{}/a.zip", mock_server.uri()), staging.path())
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let referer = requests[0].headers.get("referer").unwrap().to_str().unwrap();
        assert_eq!(referer, format!("{}/", mock_server.uri()));
    }

    #[test]
    fn test_cancelled_fetch_creates_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let fetcher = Fetcher::new(&Settings::default(), cancel);
        let staging = tempfile::tempdir().unwrap();

        let err = fetcher
            .fetch("http://127.0.0.1:9/never.zip", staging.path())
            .unwrap_err();

        assert!(matches!(err, ItemError::Cancelled));
        assert!(staged_files(staging.path()).is_empty());
    }

    /// Body that trips the cancel token once the first chunk has been read.
    struct CancelAfterFirstChunk {
        cancel: CancelToken,
        chunks_left: usize,
    }

    impl Read for CancelAfterFirstChunk {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks_left == 0 {
                return Ok(0);
            }
            self.chunks_left -= 1;
            self.cancel.cancel();
            buf.fill(0xAB);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_cancel_mid_body_removes_partial_file() {
        let cancel = CancelToken::new();
        let fetcher = Fetcher::new(&Settings::default(), cancel.clone());
        let staging = tempfile::tempdir().unwrap();
        let body = CancelAfterFirstChunk {
            cancel: cancel.clone(),
            chunks_left: 16,
        };

        let err = fetcher
            .stream_to_temp("https://cdn.example/big.zip", body, staging.path(), "big.zip", 0)
            .unwrap_err();

        assert!(matches!(err, ItemError::Cancelled));
        assert!(staged_files(staging.path()).is_empty());
    }

    #[test]
    fn test_stream_to_temp_writes_every_chunk() {
        let staging = tempfile::tempdir().unwrap();
        let body = std::io::Cursor::new(vec![3u8; CHUNK_SIZE * 2 + 10]);

        let file = fetcher()
            .stream_to_temp("https://cdn.example/a.zip", body, staging.path(), "a.zip", 0)
            .unwrap();

        assert_eq!(std::fs::metadata(&file).unwrap().len(), (CHUNK_SIZE * 2 + 10) as u64);
        assert!(file.file_name().unwrap().to_string_lossy().starts_with(PART_PREFIX));
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let staging = tempfile::tempdir().unwrap();
        let err = fetcher()
            .fetch("http://127.0.0.1:9/nothing.zip", staging.path())
            .unwrap_err();
        assert!(matches!(err, ItemError::Transport(_)));
    }
}
