//! Retrieval of pack resources: the manifest (always fresh) and columnar files.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::source::InputSource;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("server returned {status} {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, refused, timeout, ...).
    #[error("{0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reads pack resources from their location.
///
/// Implementations must not serve the manifest from any cache: every
/// `fetch_text` call reflects the current contents.
pub trait Fetcher: Send + Sync {
    /// Read a small text resource (the manifest).
    fn fetch_text(&self, source: &InputSource) -> Result<String, FetchError>;

    /// Download `url` into `dest`, replacing it atomically.
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;

    /// Token identifying the current version of `url`, used to revalidate a
    /// cached download. `None` means no usable token, so the file is always
    /// downloaded again.
    fn validator(&self, url: &str) -> Result<Option<String>, FetchError> {
        let _ = url;
        Ok(None)
    }
}

/// Fetcher backed by the filesystem and `ureq`.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    timeout: Duration,
}

impl DefaultFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch_text(&self, source: &InputSource) -> Result<String, FetchError> {
        match source {
            InputSource::Local(path) => Ok(fs::read_to_string(path)?),
            InputSource::Http(url) => self.get_text(url),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&dir)?;
        self.copy_body(url, &mut temp)?;
        temp.persist(dest).map_err(|e| FetchError::Io(e.error))?;
        Ok(())
    }

    fn validator(&self, url: &str) -> Result<Option<String>, FetchError> {
        self.head_validator(url)
    }
}

#[cfg(feature = "http")]
impl DefaultFetcher {
    fn send(&self, request: ureq::Request) -> Result<ureq::Response, FetchError> {
        request
            .timeout(self.timeout)
            .set("Cache-Control", "no-cache")
            .set("Pragma", "no-cache")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => FetchError::Status {
                    status,
                    message: response.status_text().to_string(),
                },
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })
    }

    fn request(&self, url: &str) -> Result<ureq::Response, FetchError> {
        self.send(ureq::get(url))
    }

    fn head_validator(&self, url: &str) -> Result<Option<String>, FetchError> {
        let response = self.send(ureq::head(url))?;
        Ok(response_validator(
            response.header("ETag"),
            response.header("Last-Modified"),
            response.header("Content-Length"),
        ))
    }

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.request(url)?;
        Ok(response.into_string()?)
    }

    fn copy_body(&self, url: &str, out: &mut impl io::Write) -> Result<(), FetchError> {
        let response = self.request(url)?;
        io::copy(&mut response.into_reader(), out)?;
        Ok(())
    }
}

#[cfg(not(feature = "http"))]
impl DefaultFetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let _ = self.timeout;
        Err(FetchError::Transport(format!(
            "cannot fetch {}: built without HTTP support (enable the \"http\" feature)",
            url
        )))
    }

    fn copy_body(&self, url: &str, _out: &mut impl io::Write) -> Result<(), FetchError> {
        self.get_text(url).map(|_| ())
    }

    fn head_validator(&self, _url: &str) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

/// Version token from response headers: the ETag when present, otherwise
/// Last-Modified paired with Content-Length.
pub fn response_validator(
    etag: Option<&str>,
    last_modified: Option<&str>,
    content_length: Option<&str>,
) -> Option<String> {
    if let Some(etag) = etag.map(str::trim).filter(|e| !e.is_empty()) {
        return Some(format!("etag:{}", etag));
    }
    match (last_modified, content_length) {
        (Some(modified), Some(length)) => Some(format!(
            "modified:{};length:{}",
            modified.trim(),
            length.trim()
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_text_local_rereads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, r#"{"pack_name":"a"}"#).unwrap();
        let fetcher = DefaultFetcher::default();
        let source = InputSource::Local(path.clone());
        assert!(fetcher.fetch_text(&source).unwrap().contains("\"a\""));
        fs::write(&path, r#"{"pack_name":"b"}"#).unwrap();
        assert!(fetcher.fetch_text(&source).unwrap().contains("\"b\""));
    }

    #[test]
    fn test_response_validator_prefers_etag() {
        assert_eq!(
            response_validator(Some("\"v2\""), Some("Mon"), Some("10")).as_deref(),
            Some("etag:\"v2\"")
        );
        assert_eq!(
            response_validator(None, Some("Mon"), Some("10")).as_deref(),
            Some("modified:Mon;length:10")
        );
        assert_eq!(response_validator(None, Some("Mon"), None), None);
        assert_eq!(response_validator(Some(" "), None, Some("10")), None);
    }

    #[test]
    fn test_fetch_text_local_missing_is_io_error() {
        let fetcher = DefaultFetcher::default();
        let err = fetcher
            .fetch_text(&InputSource::Local("/nonexistent/m.json".into()))
            .unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
        assert_eq!(err.status(), None);
    }
}
